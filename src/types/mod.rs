//! Core types for the terminal-vn library
//!
//! - Script: the parsed node graph
//! - Value: dynamically typed variables
//! - State: cursor, phases and history records
//! - Event: external triggers fed into the engine
//! - Output: side effects and transcript entries

pub mod event;
pub mod output;
pub mod script;
pub mod state;
pub mod value;

pub use event::Event;
pub use output::{JumpEntry, PresentedChoice, SideEffect, TranscriptEntry, TranscriptKind};
pub use script::{ChoiceOption, Line, MetaValue, Node, Script, START_NODE};
pub use state::{AdvanceMode, Cursor, HistoryEntry, Phase};
pub use value::{Value, Variables};
