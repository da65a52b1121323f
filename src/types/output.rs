//! Observable output of the engine: side effects and the visible transcript

use serde::{Deserialize, Serialize};

/// Side effect requested by an interpreter command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    /// Append a system line to the transcript
    Log { text: String },
    /// Wipe the visible transcript
    Clear,
    /// Visual effect for the presentation layer
    Vfx { name: String, args: Vec<String> },
}

/// What kind of line sits in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    Dialogue,
    System,
    Choice,
    Prompt,
    Input,
}

/// A line of the visible terminal transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub kind: TranscriptKind,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(kind: TranscriptKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A choice option as presented to the player after filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedChoice {
    /// Index of the option within the choice line
    pub option: usize,
    /// Normalized option id
    pub id: String,
    /// Display text
    pub text: String,
}

/// An entry of the node-jump menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpEntry {
    pub node: String,
    pub unlocked: bool,
}
