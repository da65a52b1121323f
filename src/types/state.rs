//! Playback state representation

use serde::{Deserialize, Serialize};

/// Position of the playback state machine within the script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub node: String,
    pub line: usize,
}

impl Cursor {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            line: 0,
        }
    }
}

/// Phase of the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Not started yet
    Idle,
    /// A dialogue line is being revealed
    Revealing,
    /// Dialogue fully revealed, waiting for the player to continue
    AwaitingAdvance,
    /// A choice menu is presented
    AwaitingChoice,
    /// A free-text prompt is open
    AwaitingInput,
    /// Timed pause (automatic advance or `wait` command)
    Delaying,
    /// The graph is exhausted
    Completed,
}

/// How revealed dialogue lines are advanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// Explicit player action after every dialogue line
    #[default]
    Manual,
    /// Continue after a randomized delay
    Auto,
}

/// An entry of the history viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Option<String>,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(speaker: Option<String>, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}
