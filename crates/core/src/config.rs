use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DuplexError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Bus and batch-runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Maximum number of tasks on the bus at once.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Maximum number of tasks a single batch may spawn.
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    /// Upper bound (inclusive) of a randomly drawn transfer duration, in time units.
    #[serde(default = "default_max_duration")]
    pub max_duration: u64,
    /// Length of one time unit in milliseconds.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    /// Seed for the duration generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_capacity() -> usize { 3 }
fn default_max_tasks() -> usize { 200 }
fn default_max_duration() -> u64 { 243 }
fn default_time_unit_ms() -> u64 { 1 }
fn default_seed() -> u64 { 123_456_789 }

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_tasks: default_max_tasks(),
            max_duration: default_max_duration(),
            time_unit_ms: default_time_unit_ms(),
            seed: default_seed(),
        }
    }
}

impl BusConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DUPLEX_PROFILE`. When set (e.g. `FAST`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self> {
        let profile = env_or("DUPLEX_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let config = Self {
            capacity: profiled_env_parse(p, "DUPLEX_CAPACITY", default_capacity()),
            max_tasks: profiled_env_parse(p, "DUPLEX_MAX_TASKS", default_max_tasks()),
            max_duration: profiled_env_parse(p, "DUPLEX_MAX_DURATION", default_max_duration()),
            time_unit_ms: profiled_env_parse(p, "DUPLEX_TIME_UNIT_MS", default_time_unit_ms()),
            seed: profiled_env_parse(p, "DUPLEX_SEED", default_seed()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string. Missing keys take their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(DuplexError::Config("capacity must be at least 1".into()));
        }
        if self.max_tasks == 0 {
            return Err(DuplexError::Config("max_tasks must be at least 1".into()));
        }
        if self.time_unit_ms == 0 {
            return Err(DuplexError::Config("time_unit_ms must be at least 1".into()));
        }
        // A full batch waits 2 x max_tasks x max_duration units.
        let worst_case = (self.max_tasks as u64)
            .checked_mul(2)
            .and_then(|units| units.checked_mul(self.max_duration));
        if worst_case.is_none() {
            return Err(DuplexError::Config(format!(
                "max_duration={} is too large for max_tasks={}",
                self.max_duration, self.max_tasks
            )));
        }
        Ok(())
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  bus:       capacity={}", self.capacity);
        tracing::info!("  batch:     max_tasks={}, max_duration={}", self.max_tasks, self.max_duration);
        tracing::info!("  timing:    time_unit={}ms, seed={}", self.time_unit_ms, self.seed);
    }
}
