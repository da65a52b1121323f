//! Command interpreter for inline script commands
//!
//! Commands never fail: malformed arguments and unknown keywords are
//! ignored so a script written for a newer engine still plays.

use crate::expr;
use crate::types::output::SideEffect;
use crate::types::value::{Value, Variables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter that is clamped by default
pub const SECRETS_COUNTER: &str = "secretsFound";

/// Inclusive maxima for named counters, enforced after `add`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterLimits(BTreeMap<String, f64>);

impl CounterLimits {
    /// No limits at all
    pub fn none() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, max: f64) {
        self.0.insert(name.into(), max);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, f64)>) {
        self.0.extend(other);
    }

    fn clamp(&self, name: &str, value: f64) -> f64 {
        match self.get(name) {
            Some(max) => value.min(max),
            None => value,
        }
    }
}

impl Default for CounterLimits {
    fn default() -> Self {
        let mut limits = Self::none();
        limits.insert(SECRETS_COUNTER, 3.0);
        limits
    }
}

/// Result of executing one command
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Variables after the command
    pub variables: Variables,
    /// Effects for the engine and the presentation layer
    pub effects: Vec<SideEffect>,
    /// Whether any variable changed
    pub changed: bool,
}

impl Execution {
    fn unchanged(variables: &Variables) -> Self {
        Self {
            variables: variables.clone(),
            effects: Vec::new(),
            changed: false,
        }
    }

    fn effect(variables: &Variables, effect: SideEffect) -> Self {
        Self {
            variables: variables.clone(),
            effects: vec![effect],
            changed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Execute a single command line such as `set hp = 10` or `add secretsFound 1`
pub fn execute(command: &str, variables: &Variables, limits: &CounterLimits) -> Execution {
    let command = command.trim();
    let (keyword, rest) = match command.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (command, ""),
    };

    match keyword {
        "set" => set(rest, variables),
        "add" => modify(Operation::Add, rest, variables, limits),
        "sub" => modify(Operation::Subtract, rest, variables, limits),
        "mul" => modify(Operation::Multiply, rest, variables, limits),
        "div" => modify(Operation::Divide, rest, variables, limits),
        "log" => Execution::effect(
            variables,
            SideEffect::Log {
                text: expr::interpolate(rest, variables),
            },
        ),
        "clear" => Execution::effect(variables, SideEffect::Clear),
        "vfx" => {
            let mut parts = rest.split_whitespace();
            match parts.next() {
                Some(name) => Execution::effect(
                    variables,
                    SideEffect::Vfx {
                        name: name.to_string(),
                        args: parts.map(str::to_string).collect(),
                    },
                ),
                None => {
                    log::debug!("vfx command without an effect name ignored");
                    Execution::unchanged(variables)
                }
            }
        }
        // Timing is handled by the playback engine
        "wait" => Execution::unchanged(variables),
        other => {
            log::debug!("unknown command '{}' ignored", other);
            Execution::unchanged(variables)
        }
    }
}

fn set(rest: &str, variables: &Variables) -> Execution {
    let Some((name, raw)) = rest.split_once('=') else {
        log::debug!("malformed set command '{}' ignored", rest);
        return Execution::unchanged(variables);
    };
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        log::debug!("set command with invalid variable name '{}' ignored", name);
        return Execution::unchanged(variables);
    }

    let value = parse_value(raw.trim());
    let changed = variables.get(name) != Some(&value);
    let mut updated = variables.clone();
    updated.insert(name.to_string(), value);

    Execution {
        variables: updated,
        effects: Vec::new(),
        changed,
    }
}

/// JSON scalar if possible, otherwise the literal text without wrapping quotes
fn parse_value(raw: &str) -> Value {
    if let Some(value) = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(Value::from_json)
    {
        return value;
    }

    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::Str(raw[1..raw.len() - 1].to_string());
        }
    }
    Value::Str(raw.to_string())
}

fn modify(op: Operation, rest: &str, variables: &Variables, limits: &CounterLimits) -> Execution {
    let Some((name, operand)) = rest.split_once(char::is_whitespace) else {
        log::debug!("{:?} command without operand ignored", op);
        return Execution::unchanged(variables);
    };

    let operand = match expr::evaluate_arithmetic(operand.trim(), variables) {
        Ok(operand) => operand,
        Err(err) => {
            log::warn!("operand '{}' for '{}' rejected: {}", operand.trim(), name, err);
            return Execution::unchanged(variables);
        }
    };

    // Unset or non-numeric values count as zero
    let current = variables
        .get(name)
        .and_then(Value::as_number)
        .unwrap_or(0.0);

    let result = match op {
        Operation::Add => limits.clamp(name, current + operand),
        Operation::Subtract => current - operand,
        Operation::Multiply => current * operand,
        Operation::Divide => {
            if operand == 0.0 {
                log::warn!("division of '{}' by zero ignored", name);
                return Execution::unchanged(variables);
            }
            current / operand
        }
    };

    let value = Value::Num(result);
    let changed = variables.get(name) != Some(&value);
    let mut updated = variables.clone();
    updated.insert(name.to_string(), value);

    Execution {
        variables: updated,
        effects: Vec::new(),
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(command: &str, variables: &Variables) -> Execution {
        execute(command, variables, &CounterLimits::default())
    }

    #[test]
    fn set_parses_json_scalars() {
        let vars = Variables::new();
        let exec = run("set hp = 10", &vars);
        assert_eq!(exec.variables.get("hp"), Some(&Value::Num(10.0)));
        assert!(exec.changed);

        let exec = run("set awake = true", &vars);
        assert_eq!(exec.variables.get("awake"), Some(&Value::Bool(true)));

        let exec = run(r#"set name = "Vessel""#, &vars);
        assert_eq!(exec.variables.get("name"), Some(&Value::from("Vessel")));
    }

    #[test]
    fn set_falls_back_to_literal_text() {
        let vars = Variables::new();
        let exec = run("set mood = quietly afraid", &vars);
        assert_eq!(exec.variables.get("mood"), Some(&Value::from("quietly afraid")));

        let exec = run("set door = 'locked'", &vars);
        assert_eq!(exec.variables.get("door"), Some(&Value::from("locked")));

        let exec = run("set list = [1, 2]", &vars);
        assert_eq!(exec.variables.get("list"), Some(&Value::from("[1, 2]")));
    }

    #[test]
    fn set_same_value_is_not_a_change() {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));
        assert!(!run("set hp = 10", &vars).changed);
    }

    #[test]
    fn arithmetic_commands_update_numbers() {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));

        let vars = run("add hp 5", &vars).variables;
        assert_eq!(vars.get("hp"), Some(&Value::Num(15.0)));
        let vars = run("sub hp 3", &vars).variables;
        assert_eq!(vars.get("hp"), Some(&Value::Num(12.0)));
        let vars = run("mul hp 2", &vars).variables;
        assert_eq!(vars.get("hp"), Some(&Value::Num(24.0)));
        let vars = run("div hp 8", &vars).variables;
        assert_eq!(vars.get("hp"), Some(&Value::Num(3.0)));
    }

    #[test]
    fn arithmetic_on_unset_or_text_starts_from_zero() {
        let mut vars = Variables::new();
        vars.insert("mood".to_string(), Value::from("grim"));

        let exec = run("add mood 2", &vars);
        assert_eq!(exec.variables.get("mood"), Some(&Value::Num(2.0)));

        let exec = run("sub debt 4", &vars);
        assert_eq!(exec.variables.get("debt"), Some(&Value::Num(-4.0)));
    }

    #[test]
    fn operand_may_reference_variables() {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));
        vars.insert("bonus".to_string(), Value::Num(3.0));

        let exec = run("add hp $bonus * 2", &vars);
        assert_eq!(exec.variables.get("hp"), Some(&Value::Num(16.0)));
    }

    #[test]
    fn bad_operands_and_division_by_zero_are_no_ops() {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));

        for command in ["div hp 0", "add hp ghost", "add hp $ghost", "add hp", "mul hp 2; x"] {
            let exec = run(command, &vars);
            assert_eq!(exec.variables, vars, "{command}");
            assert!(!exec.changed);
        }
    }

    #[test]
    fn add_clamps_declared_counters() {
        let mut vars = Variables::new();
        for _ in 0..10 {
            vars = run("add secretsFound 1", &vars).variables;
            let value = vars.get(SECRETS_COUNTER).and_then(Value::as_number).unwrap();
            assert!(value <= 3.0);
        }
        assert_eq!(vars.get(SECRETS_COUNTER), Some(&Value::Num(3.0)));

        // Starting above the limit is pulled back on the next increment
        vars.insert(SECRETS_COUNTER.to_string(), Value::Num(7.0));
        let vars = run("add secretsFound 1", &vars).variables;
        assert_eq!(vars.get(SECRETS_COUNTER), Some(&Value::Num(3.0)));
    }

    #[test]
    fn custom_limits_apply_to_other_counters() {
        let mut limits = CounterLimits::none();
        limits.insert("keys", 2.0);

        let mut vars = Variables::new();
        for _ in 0..5 {
            vars = execute("add keys 1", &vars, &limits).variables;
        }
        assert_eq!(vars.get("keys"), Some(&Value::Num(2.0)));

        for _ in 0..5 {
            vars = execute("add secretsFound 1", &vars, &limits).variables;
        }
        assert_eq!(vars.get(SECRETS_COUNTER), Some(&Value::Num(5.0)));
    }

    #[test]
    fn log_clear_and_vfx_emit_effects() {
        let mut vars = Variables::new();
        vars.insert("name".to_string(), Value::from("Ash"));

        let exec = run("log SIGNAL LOST: {name}", &vars);
        assert_eq!(
            exec.effects,
            vec![SideEffect::Log {
                text: "SIGNAL LOST: Ash".to_string()
            }]
        );
        assert!(!exec.changed);

        assert_eq!(run("clear", &vars).effects, vec![SideEffect::Clear]);

        assert_eq!(
            run("vfx glitch 3 red", &vars).effects,
            vec![SideEffect::Vfx {
                name: "glitch".to_string(),
                args: vec!["3".to_string(), "red".to_string()],
            }]
        );
    }

    #[test]
    fn unknown_and_wait_commands_are_no_ops() {
        let vars = Variables::new();
        for command in ["teleport moon", "wait 2", "SET hp = 1", "vfx"] {
            let exec = run(command, &vars);
            assert!(exec.effects.is_empty(), "{command}");
            assert!(exec.variables.is_empty(), "{command}");
        }
    }
}
