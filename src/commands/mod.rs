//! Command implementations for the CLI

pub mod backtest;
pub mod live;

use anyhow::{Context, Result};
use supertrend_trader::Config;
use tracing::info;

/// Config file when given, otherwise defaults; environment overrides apply
/// either way
fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path))?;
            info!("Loaded configuration from: {}", path);
            Ok(config)
        }
        None => {
            info!("No config file given, using defaults");
            Config::from_env()
        }
    }
}
