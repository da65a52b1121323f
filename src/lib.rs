//! # terminal-vn
//!
//! A scripted dialogue engine for terminal visual novels: a small interpreter
//! with variables, conditions, branching choices, free-text input capture and
//! persistence, driven as an explicit state machine.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use terminal_vn::{Engine, EngineOptions, Phase, parse};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let script = parse(r#"
//! :: start
//! @set name = "Vessel"
//! Hello {name}
//! "#)?;
//!
//! let mut engine = Engine::in_memory(script, EngineOptions::default());
//! engine.start();
//!
//! // The host owns the clock and feeds elapsed time in
//! engine.tick(Duration::from_secs(1));
//! assert_eq!(engine.phase(), Phase::AwaitingAdvance);
//! assert_eq!(engine.transcript()[0].text, "> Hello Vessel");
//!
//! engine.advance();
//! assert!(engine.is_completed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Loading scripts from disk
//!
//! ```rust,no_run
//! use terminal_vn::repository::{FileSystemScriptRepository, ScriptRepository};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = FileSystemScriptRepository::new("demos");
//! for name in repo.list_scripts().await? {
//!     let script = repo.load_script(&name).await?;
//!     println!("{name}: {} nodes", script.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod parser;
pub mod player;
pub mod repository;
pub mod runtime;
pub mod storage;
pub mod typewriter;
pub mod types;

pub use config::EngineOptions;
pub use error::{EvalError, JumpError, PersistenceError, ScriptError, ScriptErrorKind};
pub use interpreter::{CounterLimits, execute};
pub use parser::check::{CheckResult, check};
pub use parser::parse;
pub use player::PlayerSession;
pub use runtime::Engine;
pub use runtime::debug::{DebugConfig, DebugSnapshot};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, Persistence};
pub use typewriter::{Reveal, Typewriter};
pub use types::{
    AdvanceMode, Cursor, Event, HistoryEntry, Line, Node, Phase, Script, SideEffect,
    TranscriptEntry, TranscriptKind, Value, Variables,
};
