//! External events that can be sent to the engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events a host feeds into [`crate::runtime::Engine::handle`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Time passed on the host's timer
    Tick(Duration),
    /// Click or Enter: skip the reveal or continue
    Advance,
    /// Player picked the nth presented choice
    Choose(usize),
    /// Player submitted free text
    Submit(String),
    /// Debug jump to a node
    JumpTo(String),
    /// Restart from the start node
    Reset,
}
