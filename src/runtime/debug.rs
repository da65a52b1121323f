//! Debug logging for playback
//!
//! Every message goes through the `log` facade under a per-category target
//! such as `terminal_vn::flow`. When the config is enabled (for example by
//! setting `TVN_DEBUG`) messages are echoed to stderr or a file as well, so
//! a script author sees them without installing a logger.

use crate::types::state::{Cursor, Phase};
use crate::types::value::Variables;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;

/// Environment variable that enables debug echo
pub const DEBUG_ENV: &str = "TVN_DEBUG";

/// Debug log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// All internal state changes
    Trace,
    /// Development debugging information
    Debug,
    /// Important state changes
    Info,
    /// Potential issues
    Warn,
    /// Error situations
    Error,
}

impl LogLevel {
    fn to_log(self) -> log::Level {
        match self {
            Self::Trace => log::Level::Trace,
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warn => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Debug log category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugCategory {
    /// Engine lifecycle and phases
    Engine,
    /// Variable operations
    Variables,
    /// Control flow (jumps, choices, conditions)
    Flow,
    /// Typewriter and delays
    Timing,
    /// Durable storage
    Persistence,
}

impl DebugCategory {
    fn target(self) -> &'static str {
        match self {
            Self::Engine => "terminal_vn::engine",
            Self::Variables => "terminal_vn::variables",
            Self::Flow => "terminal_vn::flow",
            Self::Timing => "terminal_vn::timing",
            Self::Persistence => "terminal_vn::persistence",
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Echo messages besides the `log` facade
    pub enabled: bool,
    /// Minimum level echoed
    pub level: LogLevel,
    /// Output destination
    pub output: DebugOutput,
    /// Echoed categories
    pub categories: HashSet<DebugCategory>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        let mut categories = HashSet::new();
        categories.insert(DebugCategory::Engine);
        categories.insert(DebugCategory::Flow);

        Self {
            enabled: std::env::var(DEBUG_ENV).is_ok(),
            level: LogLevel::Debug,
            output: DebugOutput::Stderr,
            categories,
        }
    }
}

impl DebugConfig {
    /// Enabled config echoing every category
    pub fn verbose() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Debug,
            output: DebugOutput::Stderr,
            categories: [
                DebugCategory::Engine,
                DebugCategory::Variables,
                DebugCategory::Flow,
                DebugCategory::Timing,
                DebugCategory::Persistence,
            ]
            .into_iter()
            .collect(),
        }
    }

    fn echoes(&self, category: DebugCategory, level: LogLevel) -> bool {
        self.enabled && level >= self.level && self.categories.contains(&category)
    }
}

/// Debug output destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DebugOutput {
    /// Output to stderr
    Stderr,
    /// Append to a file
    File(String),
}

/// Serializable view of the engine for debugging tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    pub phase: Phase,
    pub cursor: Cursor,
    pub variables: Variables,
    pub visited_nodes: Vec<String>,
    pub selected_choices: Vec<String>,
    /// Text of the currently presented choices
    pub pending_choices: Vec<String>,
    /// Open input prompt, if any
    pub prompt: Option<String>,
}

/// Log a debug message
pub fn log(config: &DebugConfig, category: DebugCategory, level: LogLevel, message: &str) {
    log::log!(target: category.target(), level.to_log(), "{}", message);

    if !config.echoes(category, level) {
        return;
    }

    let line = format!("[{}] {:12} {}", level.label(), format!("{:?}", category), message);
    match &config.output {
        DebugOutput::Stderr => eprintln!("{line}"),
        DebugOutput::File(path) => {
            let written = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| writeln!(file, "{line}"));
            if let Err(err) = written {
                eprintln!("{line} (debug file {path} unavailable: {err})");
            }
        }
    }
}
