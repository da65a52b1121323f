//! Engine configuration

use crate::interpreter::CounterLimits;
use crate::types::state::AdvanceMode;
use crate::types::value::Variables;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Options a host passes when creating an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Manual or automatic advancement of dialogue lines
    pub mode: AdvanceMode,
    /// Delay between revealed characters
    pub typing_speed_ms: u64,
    /// Bounds of the randomized pause before an automatic advance
    pub auto_delay_min_ms: u64,
    pub auto_delay_max_ms: u64,
    /// Pause used by a bare `wait` command
    pub default_wait_ms: u64,
    /// Prefix for every persisted key
    pub storage_prefix: String,
    pub counter_limits: CounterLimits,
    /// Defaults merged under any persisted variables
    pub initial_variables: Variables,
    /// Seed for the auto-advance delay; random when absent
    pub rng_seed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mode: AdvanceMode::Manual,
            typing_speed_ms: 30,
            auto_delay_min_ms: 1000,
            auto_delay_max_ms: 2000,
            default_wait_ms: 1000,
            storage_prefix: "tvn:".to_string(),
            counter_limits: CounterLimits::default(),
            initial_variables: Variables::new(),
            rng_seed: None,
        }
    }
}

impl EngineOptions {
    /// Load options from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let options = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(options)
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.typing_speed_ms)
    }

    /// Auto-delay bounds with min <= max guaranteed
    pub fn auto_delay_bounds(&self) -> (Duration, Duration) {
        let min = self.auto_delay_min_ms.min(self.auto_delay_max_ms);
        let max = self.auto_delay_min_ms.max(self.auto_delay_max_ms);
        (Duration::from_millis(min), Duration::from_millis(max))
    }
}
