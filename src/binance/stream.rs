//! Push-based live price feed from the futures aggregate trade stream
//!
//! The stream task is the only writer of its [`LivePrice`] cell. When the
//! socket closes or errors it waits a fixed delay and reconnects; the
//! controller keeps reading whatever price was stored last.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::feed::LivePrice;
use crate::Symbol;

#[derive(Debug, Deserialize)]
struct AggTrade {
    #[serde(rename = "p")]
    price: String,
}

/// Price carried by one aggregate trade message
pub fn parse_trade_price(text: &str) -> Option<f64> {
    let trade: AggTrade = serde_json::from_str(text).ok()?;
    trade.price.parse().ok()
}

/// `<base>/<symbol>@aggTrade`, symbol lowercased as the stream names require
pub fn stream_url(base: &str, symbol: &Symbol) -> String {
    format!(
        "{}/{}@aggTrade",
        base.trim_end_matches('/'),
        symbol.as_str().to_lowercase()
    )
}

pub struct PriceStream {
    url: String,
    price: LivePrice,
    reconnect_delay: Duration,
}

impl PriceStream {
    pub fn new(base_url: &str, symbol: &Symbol, price: LivePrice, reconnect_delay: Duration) -> Self {
        PriceStream {
            url: stream_url(base_url, symbol),
            price,
            reconnect_delay,
        }
    }

    /// Run on its own task until the runtime shuts down
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut attempt: u64 = 0;
        loop {
            attempt = attempt.wrapping_add(1);
            info!("Connecting price stream (attempt {}): {}", attempt, self.url);

            match self.read_until_closed().await {
                Ok(()) => warn!("Price stream closed"),
                Err(e) => warn!("Price stream error: {}", e),
            }

            info!("Reconnecting price stream in {:?}", self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn read_until_closed(&self) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (mut ws, _) = connect_async(self.url.as_str()).await?;
        info!("Price stream connected");

        while let Some(message) = ws.next().await {
            match message? {
                Message::Text(text) => match parse_trade_price(&text) {
                    Some(price) => self.price.set(price),
                    None => debug!("Ignoring stream message: {}", text),
                },
                Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
                Message::Close(frame) => {
                    debug!("Close frame: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agg_trade() {
        let text = r#"{"e":"aggTrade","E":1700000000123,"s":"ETHUSDT","a":5933014,"p":"2031.57","q":"0.120","f":100,"l":105,"T":1700000000120,"m":true}"#;
        assert_eq!(parse_trade_price(text), Some(2031.57));
    }

    #[test]
    fn test_parse_rejects_other_messages() {
        assert_eq!(parse_trade_price(r#"{"result":null,"id":1}"#), None);
        assert_eq!(parse_trade_price(r#"{"p":"abc"}"#), None);
        assert_eq!(parse_trade_price("not json"), None);
    }

    #[test]
    fn test_stream_url() {
        let url = stream_url("wss://fstream.binance.com/ws/", &Symbol::new("ETHUSDT"));
        assert_eq!(url, "wss://fstream.binance.com/ws/ethusdt@aggTrade");
    }
}
