//! Parsed script representation: a graph of named nodes

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identifier of the entry node every script must define
pub const START_NODE: &str = "start";

/// Metadata key that wipes the transcript whenever playback changes node
pub const AUTO_CLEAR_KEY: &str = "autoClear";

/// Metadata keys with this prefix declare counter limits, e.g. `max.secretsFound: 3`
pub const COUNTER_LIMIT_PREFIX: &str = "max.";

/// Immutable parsed program
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    metadata: BTreeMap<String, MetaValue>,
    nodes: Vec<Node>,
    /// Node id to index mapping for jumps
    index: HashMap<String, usize>,
}

impl Script {
    pub fn new(metadata: BTreeMap<String, MetaValue>, nodes: Vec<Node>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        Self {
            metadata,
            nodes,
            index,
        }
    }

    /// Configuration values from the metadata block
    pub fn metadata(&self) -> &BTreeMap<String, MetaValue> {
        &self.metadata
    }

    /// Nodes in source order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    /// Boolean metadata flag; missing or non-boolean values are false
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.metadata.get(key), Some(MetaValue::Bool(true)))
    }

    /// Counter limits declared through `max.<name>` metadata entries
    pub fn counter_limits(&self) -> BTreeMap<String, f64> {
        self.metadata
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(COUNTER_LIMIT_PREFIX)?;
                match value {
                    MetaValue::Text(text) => text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .map(|max| (name.to_string(), max)),
                    MetaValue::Bool(_) => None,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Metadata value: either a boolean flag or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Text(String),
}

/// One named branch of the dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub lines: Vec<Line>,
    /// Node to continue with once every line has been consumed
    pub jump: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lines: Vec::new(),
            jump: None,
        }
    }
}

/// A single instruction within a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Line {
    /// Text revealed through the typewriter
    Dialogue {
        speaker: Option<String>,
        content: String,
        condition: Option<String>,
    },
    /// Interpreter command such as `set hp = 10`
    Command {
        content: String,
        condition: Option<String>,
    },
    /// Branching menu
    Choice { options: Vec<ChoiceOption> },
    /// Free-text prompt, optionally capturing into a `{variable}`
    Input { content: String },
}

impl Line {
    pub fn condition(&self) -> Option<&str> {
        match self {
            Self::Dialogue { condition, .. } | Self::Command { condition, .. } => {
                condition.as_deref()
            }
            Self::Choice { .. } | Self::Input { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dialogue { .. } => "dialogue",
            Self::Command { .. } => "command",
            Self::Choice { .. } => "choice",
            Self::Input { .. } => "input",
        }
    }
}

/// One branch of a choice line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    /// Node to jump to when selected; `None` continues in the current node
    pub target: Option<String>,
    pub condition: Option<String>,
    /// Option ids that must all have been selected before this one is shown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_after: Vec<String>,
}

impl ChoiceOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: None,
            condition: None,
            visible_after: Vec::new(),
        }
    }

    /// Normalized identifier recorded in the selected-choice set
    pub fn id(&self) -> String {
        normalize_option(&self.text)
    }
}

/// Trim, lowercase and collapse inner whitespace of option text
pub fn normalize_option(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
