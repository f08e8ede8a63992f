//! Configuration management
//!
//! Handles loading and validating the JSON configuration file. Every field
//! has a default, so a partial file (or none at all) is enough to run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub market: MarketConfig,
    pub indicator: IndicatorConfig,
    pub trading: TradingConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// `SUPERTREND_SYMBOL` and `SUPERTREND_TIMEFRAME`, looked up through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(symbol) = lookup("SUPERTREND_SYMBOL") {
            self.market.symbol = symbol;
        }
        if let Some(timeframe) = lookup("SUPERTREND_TIMEFRAME") {
            self.market.timeframe = timeframe;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let indicator = &self.indicator;
        let trading = &self.trading;

        if indicator.period == 0 {
            anyhow::bail!("indicator.period must be at least 1");
        }
        if !(indicator.multiplier.is_finite() && indicator.multiplier > 0.0) {
            anyhow::bail!("indicator.multiplier must be positive");
        }
        // three trend points are read every tick
        if self.market.window < indicator.period + 3 {
            anyhow::bail!(
                "market.window ({}) must be at least period + 3 ({})",
                self.market.window,
                indicator.period + 3
            );
        }
        if trading.capital <= 0.0 || trading.leverage <= 0.0 {
            anyhow::bail!("trading.capital and trading.leverage must be positive");
        }
        if trading.fee_rate < 0.0 || trading.take_profit_fraction < 0.0 {
            anyhow::bail!("trading.fee_rate and trading.take_profit_fraction must not be negative");
        }
        if self.market.symbol.trim().is_empty() {
            anyhow::bail!("market.symbol must not be empty");
        }

        Ok(())
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.market.symbol)
    }
}

/// Where bars and prices come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub timeframe: String,
    /// Number of bars fetched per tick
    pub window: usize,
    pub rest_url: String,
    pub ws_url: String,
    pub reconnect_delay_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            symbol: "ETHUSDT".to_string(),
            timeframe: "15m".to_string(),
            window: 150,
            rest_url: "https://fapi.binance.com/fapi/v1".to_string(),
            ws_url: "wss://fstream.binance.com/ws".to_string(),
            reconnect_delay_secs: 5,
        }
    }
}

impl MarketConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Supertrend parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            period: 12,
            multiplier: 3.0,
        }
    }
}

/// Position sizing, fees and timing of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub capital: f64,
    pub leverage: f64,
    /// Fee charged per side as a fraction of notional
    pub fee_rate: f64,
    /// Share of the previous bar's body added beyond its close
    pub take_profit_fraction: f64,
    pub settle_delay_secs: u64,
    pub poll_interval_secs: u64,
    /// Skip re-entry until the next confirmed reversal once a trade closed
    pub guard_traded_regime: bool,
    /// Close when the third-back trend equals the confirmed trend
    pub trend_exit: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            capital: 100.0,
            leverage: 2.0,
            fee_rate: 0.0004, // 0.04%
            take_profit_fraction: 0.30,
            settle_delay_secs: 5,
            poll_interval_secs: 2,
            guard_traded_regime: true,
            trend_exit: true,
        }
    }
}

impl TradingConfig {
    /// Capital times leverage
    pub fn notional(&self) -> f64 {
        self.capital * self.leverage
    }

    /// Fees for opening and closing one position
    pub fn round_trip_fees(&self) -> f64 {
        self.notional() * self.fee_rate * 2.0
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.indicator.period, 12);
        assert_eq!(config.market.window, 150);
        assert_eq!(config.trading.notional(), 200.0);
        assert!((config.trading.round_trip_fees() - 0.16).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "indicator": { "period": 10 }, "trading": { "leverage": 5 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.indicator.period, 10);
        assert_eq!(config.indicator.multiplier, 3.0);
        assert_eq!(config.trading.leverage, 5.0);
        assert_eq!(config.trading.capital, 100.0);
        assert_eq!(config.market.symbol, "ETHUSDT");
    }

    #[test]
    fn test_window_must_cover_three_points() {
        let mut config = Config::default();
        config.market.window = 14;
        assert!(config.validate().is_err());
        config.market.window = 15;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_sizing() {
        let mut config = Config::default();
        config.trading.leverage = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join("supertrend_config_test.json");
        std::fs::write(&path, r#"{ "market": { "window": 60 } }"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.market.window, 60);
    }

    #[test]
    fn test_overrides_replace_symbol_and_timeframe() {
        let mut config: Config =
            serde_json::from_str(r#"{ "market": { "symbol": "ethusdt", "timeframe": "1h" } }"#)
                .unwrap();

        config.apply_overrides(|_| None);
        assert_eq!(config.market.timeframe, "1h");
        assert_eq!(config.symbol().as_str(), "ETHUSDT");

        config.apply_overrides(|key| match key {
            "SUPERTREND_SYMBOL" => Some("btcusdt".to_string()),
            "SUPERTREND_TIMEFRAME" => Some("5m".to_string()),
            _ => None,
        });
        assert_eq!(config.symbol().as_str(), "BTCUSDT");
        assert_eq!(config.market.timeframe, "5m");
    }
}
