//! Binance futures REST client for kline (candlestick) data
//!
//! # Example
//! ```no_run
//! use supertrend_trader::binance::BinanceClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceClient::new("https://fapi.binance.com/fapi/v1")?;
//!     let klines = client.get_klines("ETHUSDT", "15m", 150).await?;
//!     println!("Fetched {} klines", klines.len());
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::BinanceKline;
use crate::error::{TraderError, TraderResult};
use crate::feed::BarSource;
use crate::{Candle, Symbol};

/// Maximum klines per request (futures endpoint limit)
const MAX_KLINES_PER_REQUEST: usize = 1500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(BinanceClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the most recent `limit` klines, oldest first
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<BinanceKline>> {
        let url = format!("{}/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];

        debug!(
            "Fetching klines: symbol={}, interval={}, limit={}",
            symbol, interval, limit
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to Binance")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_data: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("Failed to parse Binance response")?;

        let klines: Vec<BinanceKline> = raw_data
            .iter()
            .filter_map(|row| BinanceKline::from_raw(row))
            .collect();

        if klines.len() < raw_data.len() {
            warn!(
                "Dropped {} malformed klines for {}",
                raw_data.len() - klines.len(),
                symbol
            );
        }

        Ok(klines)
    }
}

impl BarSource for BinanceClient {
    async fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: &str,
        count: usize,
    ) -> TraderResult<Vec<Candle>> {
        let klines = self
            .get_klines(symbol.as_str(), timeframe, count)
            .await
            .map_err(|e| TraderError::DataUnavailable(format!("{:#}", e)))?;

        if klines.is_empty() {
            return Err(TraderError::DataUnavailable(format!(
                "no klines returned for {} {}",
                symbol, timeframe
            )));
        }

        klines_to_candles(&klines)
    }
}

/// Every kline must become a valid candle; a gap would shift the ATR recurrence
fn klines_to_candles(klines: &[BinanceKline]) -> TraderResult<Vec<Candle>> {
    let candles: Vec<Candle> = klines.iter().filter_map(BinanceKline::to_candle).collect();

    let dropped = klines.len() - candles.len();
    if dropped > 0 {
        warn!("Rejected {} invalid klines out of {}", dropped, klines.len());
        return Err(TraderError::DataUnavailable(format!(
            "{} of {} klines failed validation",
            dropped,
            klines.len()
        )));
    }

    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_base_url() {
        let client = BinanceClient::new("https://fapi.binance.com/fapi/v1/").unwrap();
        assert_eq!(client.base_url, "https://fapi.binance.com/fapi/v1");
    }

    fn kline(open_time: i64, high: f64, low: f64) -> BinanceKline {
        BinanceKline {
            open_time,
            open: 100.0,
            high,
            low,
            close: 100.0,
            volume: 1.0,
            close_time: open_time + 899_999,
        }
    }

    #[test]
    fn test_klines_to_candles_keeps_valid_window() {
        let klines = vec![kline(1_700_000_000_000, 101.0, 99.0), kline(1_700_000_900_000, 102.0, 98.0)];
        let candles = klines_to_candles(&klines).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].high, 102.0);
    }

    #[test]
    fn test_klines_to_candles_rejects_invalid_bar() {
        // high below low in the middle of the window
        let klines = vec![
            kline(1_700_000_000_000, 101.0, 99.0),
            kline(1_700_000_900_000, 98.0, 102.0),
            kline(1_700_001_800_000, 101.0, 99.0),
        ];
        let result = klines_to_candles(&klines);
        assert!(matches!(result, Err(TraderError::DataUnavailable(_))));
    }
}
