//! Static validation for parsed scripts
//!
//! Everything reported here is a warning: the script still plays.

use crate::expr;
use crate::types::script::{Line, Script, START_NODE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// A problem found by [`check`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Node the problem was found in
    pub node: String,
    pub message: String,
}

/// Result of script validation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckResult {
    pub warnings: Vec<Warning>,
}

impl CheckResult {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, node: &str, message: String) {
        self.warnings.push(Warning {
            node: node.to_string(),
            message,
        });
    }
}

/// Perform static validation on a script
///
/// This function checks for:
/// - Nodes that no jump or choice ever reaches
/// - `after` gates naming options that do not exist
/// - Conditions the expression grammar cannot parse
pub fn check(script: &Script) -> CheckResult {
    let mut result = CheckResult::default();

    let reachable = reachable_nodes(script);
    for node in script.nodes() {
        if !reachable.contains(node.id.as_str()) {
            result.warn(&node.id, format!("Node '{}' is unreachable from start", node.id));
        }
    }

    let option_ids: BTreeSet<String> = script
        .nodes()
        .iter()
        .flat_map(|node| node.lines.iter())
        .filter_map(|line| match line {
            Line::Choice { options } => Some(options.iter().map(|o| o.id())),
            _ => None,
        })
        .flatten()
        .collect();

    for node in script.nodes() {
        for line in &node.lines {
            if let Some(condition) = line.condition() {
                check_condition(&mut result, &node.id, condition);
            }
            let Line::Choice { options } = line else {
                continue;
            };
            for option in options {
                if let Some(condition) = &option.condition {
                    check_condition(&mut result, &node.id, condition);
                }
                for gate in &option.visible_after {
                    if !option_ids.contains(gate) {
                        result.warn(
                            &node.id,
                            format!(
                                "Option '{}' waits for unknown option '{}'",
                                option.text, gate
                            ),
                        );
                    }
                }
            }
        }
    }

    result
}

fn check_condition(result: &mut CheckResult, node: &str, condition: &str) {
    if let Err(err) = expr::compile(condition) {
        result.warn(node, format!("Condition '{condition}' cannot be parsed: {err}"));
    }
}

/// Breadth-first walk over jumps and choice targets
fn reachable_nodes(script: &Script) -> BTreeSet<&str> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([START_NODE]);

    while let Some(id) = queue.pop_front() {
        let Some(node) = script.node(id) else {
            continue;
        };
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        if let Some(jump) = &node.jump {
            queue.push_back(jump.as_str());
        }
        for line in &node.lines {
            if let Line::Choice { options } = line {
                queue.extend(options.iter().filter_map(|o| o.target.as_deref()));
            }
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn check_unreachable_node_warning() {
        let script = parse(":: start\nHello\n:: orphan\nNobody comes here").unwrap();
        let result = check(&script);

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].node, "orphan");
        assert!(result.warnings[0].message.contains("unreachable"));
    }

    #[test]
    fn check_unknown_gate_warning() {
        let source = r#"
:: start
* Look
* Listen [after look | smell]
"#;
        let script = parse(source).unwrap();
        let result = check(&script);

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("smell"));
    }

    #[test]
    fn check_unparsable_condition_warning() {
        let script = parse(":: start\n[if hp >] Hello").unwrap();
        let result = check(&script);

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("hp >"));
    }

    #[test]
    fn check_valid_script_no_warnings() {
        let source = r#"
:: start
[if secretsFound >= 3] You know everything.
* Descend -> cellar [if hasKey]
* Stay
-> end

:: cellar
Dark.
-> end

:: end
Fin.
"#;
        let script = parse(source).unwrap();
        assert!(check(&script).is_clean());
    }
}
