//! `check` and `nodes` commands

use crate::parser::{self, check};
use crate::types::script::Script;
use anyhow::Context;
use std::fmt::Write;
use std::path::Path;

fn load(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file {}", path.display()))
}

/// Parse a script and report checker warnings.
/// Returns the report and whether the script parsed.
pub fn run_check(path: &Path) -> anyhow::Result<(String, bool)> {
    let source = load(path)?;
    Ok(check_report(&source))
}

pub fn check_report(source: &str) -> (String, bool) {
    let script = match parser::parse(source) {
        Ok(script) => script,
        Err(err) => return (format!("error: {err}\n"), false),
    };

    let result = check::check(&script);
    let mut report = String::new();
    for warning in &result.warnings {
        let _ = writeln!(report, "warning [{}]: {}", warning.node, warning.message);
    }
    let _ = writeln!(
        report,
        "{} nodes, {} warnings",
        script.len(),
        result.warnings.len()
    );
    (report, true)
}

/// List node ids with their line counts and jumps
pub fn run_nodes(path: &Path) -> anyhow::Result<String> {
    let source = load(path)?;
    let script = parser::parse(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(node_listing(&script))
}

pub fn node_listing(script: &Script) -> String {
    let mut listing = String::new();
    for node in script.nodes() {
        let lines = node.lines.len();
        let _ = match &node.jump {
            Some(target) => writeln!(listing, "{:20} {:3} lines -> {}", node.id, lines, target),
            None => writeln!(listing, "{:20} {:3} lines", node.id, lines),
        };
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_warnings() {
        let (report, ok) = check_report(":: start\nHi.\n:: orphan\nNobody comes here.\n");
        assert!(ok);
        assert!(report.contains("warning [orphan]"));
        assert!(report.ends_with("2 nodes, 1 warnings\n"));
    }

    #[test]
    fn report_shows_parse_error() {
        let (report, ok) = check_report(":: intro\nHi.\n");
        assert!(!ok);
        assert!(report.starts_with("error: "));
    }

    #[test]
    fn listing_shows_jumps() {
        let script = parser::parse(":: start\nOne.\nTwo.\n-> end\n:: end\nBye.\n").unwrap();
        let listing = node_listing(&script);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("start"));
        assert!(lines[0].ends_with("2 lines -> end"));
        assert!(lines[1].ends_with("1 lines"));
    }
}
