//! Dynamically typed script variables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Variable mapping shared by the evaluator, the interpreter and the engine
pub type Variables = BTreeMap<String, Value>;

/// A script variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    /// Convert a JSON scalar. Arrays, objects and null are not script values.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Num),
            serde_json::Value::String(s) => Some(Self::Str(s)),
            _ => None,
        }
    }

    /// Numeric view of the value; numeric text counts, booleans do not
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Num(_) => "number",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            // Whole numbers print without a fractional part
            Self::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(Value::Num(10.0).to_string(), "10");
        assert_eq!(Value::Num(-3.0).to_string(), "-3");
        assert_eq!(Value::Num(1.5).to_string(), "1.5");
    }

    #[test]
    fn numeric_text_is_a_number() {
        assert_eq!(Value::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(Value::from("forty").as_number(), None);
        assert_eq!(Value::Bool(true).as_number(), None);
    }

    #[test]
    fn truthiness_follows_value_kind() {
        assert!(Value::Num(2.0).is_truthy());
        assert!(!Value::Num(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("no").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn json_round_trip_keeps_scalars_plain() {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));
        vars.insert("name".to_string(), Value::from("Vessel"));
        vars.insert("awake".to_string(), Value::Bool(true));

        let json = serde_json::to_string(&vars).unwrap();
        assert_eq!(json, r#"{"awake":true,"hp":10.0,"name":"Vessel"}"#);

        let restored: Variables = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vars);
    }

    #[test]
    fn from_json_rejects_compound_values() {
        assert_eq!(Value::from_json(serde_json::json!([1, 2])), None);
        assert_eq!(Value::from_json(serde_json::Value::Null), None);
        assert_eq!(
            Value::from_json(serde_json::json!("x")),
            Some(Value::from("x"))
        );
    }
}
