//! Supertrend Trend Follower
//!
//! A Supertrend indicator over a Wilder ATR, and a single-position controller
//! that trades confirmed trend reversals with a body-based take-profit.
//! Market data comes in through [`feed::BarSource`] / [`feed::PriceSource`],
//! orders go out through [`orders::OrderSink`].
//!
//! # Example
//! ```no_run
//! use supertrend_trader::{data, backtest, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let candles = data::load_csv("data/ETHUSDT_15m.csv")?;
//!     let report = backtest::replay(candles, &config).await?;
//!     println!("{} trades, net PnL {}", report.trades.len(), report.net_pnl);
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod binance;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod orders;
pub mod types;

pub use config::Config;
pub use controller::{ControllerParams, TickOutcome, TrendFollower};
pub use error::{IndicatorError, TraderError, TraderResult};
pub use indicators::{supertrend, TrendPoint};
pub use types::*;
