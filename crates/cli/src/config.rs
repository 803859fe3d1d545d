use anyhow::{Context, Result};
use tracing::debug;

use duplex_core::BusConfig;
use duplex_core::config::load_dotenv;

use crate::cli::RunArgs;

/// Load config from the given TOML file, or from the environment when no
/// file is given.
pub fn load(path: Option<&str>) -> Result<BusConfig> {
    match path {
        Some(p) => {
            debug!(path = %p, "Loading config file");
            BusConfig::from_file(p).with_context(|| format!("failed to load config: {p}"))
        }
        None => {
            load_dotenv();
            BusConfig::from_env().context("invalid configuration in environment")
        }
    }
}

/// Apply `run` flag overrides on top of a loaded config.
pub fn apply_overrides(mut config: BusConfig, args: &RunArgs) -> Result<BusConfig> {
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(unit) = args.time_unit_ms {
        config.time_unit_ms = unit;
    }
    config.validate().context("invalid command-line override")?;
    Ok(config)
}
