//! Script parser for terminal-vn dialogue scripts
//!
//! Converts the line-oriented script markup into an immutable [`Script`].
//!
//! ```text
//! ---
//! autoClear: true
//! ---
//! :: start
//! @set name = "Vessel"
//! Hello {name}
//! [if hp > 3] Doctor: You look well.
//! ? Name? {playerName}
//! * Open the door -> hallway
//! * Stay [if brave]
//! -> end
//! ```

use crate::error::{ScriptError, ScriptErrorKind};
use crate::types::script::{
    ChoiceOption, Line, MetaValue, Node, START_NODE, Script, normalize_option,
};
use std::collections::{BTreeMap, HashSet};

pub mod check;


const MAX_SPEAKER_LEN: usize = 32;

/// Parse script source into a node graph
pub fn parse(source: &str) -> Result<Script, ScriptError> {
    ScriptParser::new(source).parse()
}

struct ScriptParser<'a> {
    lines: Vec<&'a str>,
    current_line: usize,
    metadata: BTreeMap<String, MetaValue>,
    nodes: Vec<Node>,
    node_ids: HashSet<String>,
    pending_options: Vec<ChoiceOption>,
    /// Jump and option targets with the line that referenced them
    references: Vec<(String, usize)>,
}

impl<'a> ScriptParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
            current_line: 0,
            metadata: BTreeMap::new(),
            nodes: Vec::new(),
            node_ids: HashSet::new(),
            pending_options: Vec::new(),
            references: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Script, ScriptError> {
        self.parse_metadata()?;

        while self.current_line < self.lines.len() {
            let line = self.lines[self.current_line].trim();
            self.parse_line(line)?;
            self.current_line += 1;
        }
        self.flush_choice();

        self.validate()?;

        Ok(Script::new(self.metadata, self.nodes))
    }

    fn error(&self, kind: ScriptErrorKind) -> ScriptError {
        ScriptError::new(self.current_line + 1, kind)
    }

    fn parse_metadata(&mut self) -> Result<(), ScriptError> {
        let Some(open) = self.lines.iter().position(|l| !l.trim().is_empty()) else {
            return Ok(());
        };
        if self.lines[open].trim() != "---" {
            return Ok(());
        }

        self.current_line = open + 1;
        while self.current_line < self.lines.len() {
            let line = self.lines[self.current_line].trim();
            if line == "---" {
                self.current_line += 1;
                return Ok(());
            }
            if !line.is_empty() && !line.starts_with('#') {
                let (key, value) = line.split_once(':').ok_or_else(|| {
                    self.error(ScriptErrorKind::MalformedMetadata {
                        entry: line.to_string(),
                    })
                })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(self.error(ScriptErrorKind::MalformedMetadata {
                        entry: line.to_string(),
                    }));
                }
                let value = match value.trim() {
                    "true" => MetaValue::Bool(true),
                    "false" => MetaValue::Bool(false),
                    other => MetaValue::Text(other.to_string()),
                };
                self.metadata.insert(key.to_string(), value);
            }
            self.current_line += 1;
        }

        Err(ScriptError::new(open + 1, ScriptErrorKind::UnterminatedMetadata))
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ScriptError> {
        // Blank lines close a choice block, comments do not
        if line.is_empty() {
            self.flush_choice();
            return Ok(());
        }
        if line.starts_with('#') {
            return Ok(());
        }

        if let Some(name) = line.strip_prefix("::") {
            self.flush_choice();
            return self.start_node(name.trim());
        }

        let Some(node) = self.nodes.last() else {
            return Err(self.error(ScriptErrorKind::OutsideNode {
                content: line.to_string(),
            }));
        };
        if node.jump.is_some() {
            return Err(self.error(ScriptErrorKind::StatementAfterJump {
                node: node.id.clone(),
            }));
        }

        if let Some(target) = line.strip_prefix("->") {
            self.flush_choice();
            let target = target.trim().to_string();
            self.references.push((target.clone(), self.current_line + 1));
            if let Some(node) = self.nodes.last_mut() {
                node.jump = Some(target);
            }
            return Ok(());
        }

        if let Some(option) = line.strip_prefix('*') {
            let option = self.parse_option(option)?;
            self.pending_options.push(option);
            return Ok(());
        }

        self.flush_choice();
        let (condition, rest) = self.split_condition(line)?;
        let parsed = self.parse_statement(condition, rest)?;
        if let Some(node) = self.nodes.last_mut() {
            node.lines.push(parsed);
        }
        Ok(())
    }

    fn start_node(&mut self, name: &str) -> Result<(), ScriptError> {
        if name.is_empty() {
            return Err(self.error(ScriptErrorKind::EmptyNodeName));
        }
        if !self.node_ids.insert(name.to_string()) {
            return Err(self.error(ScriptErrorKind::DuplicateNode {
                node: name.to_string(),
            }));
        }
        self.nodes.push(Node::new(name));
        Ok(())
    }

    fn flush_choice(&mut self) {
        if self.pending_options.is_empty() {
            return;
        }
        let options = std::mem::take(&mut self.pending_options);
        if let Some(node) = self.nodes.last_mut() {
            node.lines.push(Line::Choice { options });
        }
    }

    /// Split a leading `[if EXPR]` annotation from the rest of the line
    fn split_condition<'l>(&self, line: &'l str) -> Result<(Option<String>, &'l str), ScriptError> {
        if !line.starts_with("[if ") && !line.starts_with("[if]") {
            return Ok((None, line));
        }
        let close = line
            .find(']')
            .ok_or_else(|| self.error(ScriptErrorKind::UnterminatedAnnotation))?;
        let expr = line[3..close].trim();
        if expr.is_empty() {
            return Err(self.error(ScriptErrorKind::UnknownAnnotation {
                annotation: line[1..close].to_string(),
            }));
        }
        Ok((Some(expr.to_string()), line[close + 1..].trim_start()))
    }

    fn parse_statement(&self, condition: Option<String>, rest: &str) -> Result<Line, ScriptError> {
        if let Some(command) = rest.strip_prefix('@') {
            let content = command.trim();
            if content.is_empty() {
                return Err(self.error(ScriptErrorKind::EmptyCommand));
            }
            return Ok(Line::Command {
                content: content.to_string(),
                condition,
            });
        }

        if let Some(prompt) = rest.strip_prefix('?') {
            if condition.is_some() {
                return Err(self.error(ScriptErrorKind::ConditionNotAllowed { construct: "input" }));
            }
            return Ok(Line::Input {
                content: prompt.trim().to_string(),
            });
        }

        if condition.is_some() {
            if rest.starts_with('*') {
                return Err(self.error(ScriptErrorKind::ConditionNotAllowed {
                    construct: "choice",
                }));
            }
            if rest.starts_with("->") {
                return Err(self.error(ScriptErrorKind::ConditionNotAllowed { construct: "jump" }));
            }
        }

        let (speaker, content) = split_speaker(rest);
        Ok(Line::Dialogue {
            speaker,
            content,
            condition,
        })
    }

    /// Parse `text [-> target] [if EXPR] [after a | b]`; annotations may come in any order
    fn parse_option(&mut self, raw: &str) -> Result<ChoiceOption, ScriptError> {
        let mut rest = raw.trim();
        let mut target = None;
        let mut condition = None;
        let mut visible_after = Vec::new();

        loop {
            // Other trailing brackets such as `[REDACTED]` belong to the option text
            if rest.ends_with(']')
                && let Some(open) = rest.rfind('[')
            {
                let annotation = rest[open + 1..rest.len() - 1].trim_start();
                if let Some(expr) = annotation.strip_prefix("if ") {
                    condition = Some(expr.trim().to_string());
                    rest = rest[..open].trim_end();
                    continue;
                }
                if let Some(ids) = annotation.strip_prefix("after ") {
                    visible_after = ids
                        .split('|')
                        .map(normalize_option)
                        .filter(|id| !id.is_empty())
                        .collect();
                    rest = rest[..open].trim_end();
                    continue;
                }
            }

            if target.is_none()
                && let Some(arrow) = rest.rfind("->")
            {
                let candidate = rest[arrow + 2..].trim();
                if !candidate.contains(char::is_whitespace) && !candidate.contains('[') {
                    target = Some(candidate.to_string());
                    rest = rest[..arrow].trim_end();
                    continue;
                }
            }
            break;
        }

        if rest.contains("[if ") || rest.contains("[after ") {
            return Err(self.error(ScriptErrorKind::UnterminatedAnnotation));
        }
        if rest.is_empty() {
            return Err(self.error(ScriptErrorKind::EmptyChoice));
        }
        if let Some(target) = &target {
            self.references.push((target.clone(), self.current_line + 1));
        }

        Ok(ChoiceOption {
            text: rest.to_string(),
            target,
            condition,
            visible_after,
        })
    }

    fn validate(&self) -> Result<(), ScriptError> {
        if !self.node_ids.contains(START_NODE) {
            return Err(ScriptError::new(0, ScriptErrorKind::MissingStart));
        }

        for (target, line) in &self.references {
            if !self.node_ids.contains(target) {
                return Err(ScriptError::new(
                    *line,
                    ScriptErrorKind::UndefinedNode {
                        target: target.clone(),
                    },
                ));
            }
        }

        Ok(())
    }
}

/// Split `Speaker: text` into its parts; anything else is narration.
/// A leading backslash forces narration.
fn split_speaker(text: &str) -> (Option<String>, String) {
    if let Some(narration) = text.strip_prefix('\\') {
        return (None, narration.trim_start().to_string());
    }

    if let Some((prefix, content)) = text.split_once(':') {
        let speaker = prefix.trim();
        let content_ok = content.is_empty() || content.starts_with(char::is_whitespace);
        let speaker_ok = !speaker.is_empty()
            && speaker.chars().count() <= MAX_SPEAKER_LEN
            && speaker
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '\'' | '.'));
        let content = content.trim();
        if content_ok && speaker_ok && !content.is_empty() {
            return (Some(speaker.to_string()), content.to_string());
        }
    }

    (None, text.to_string())
}
