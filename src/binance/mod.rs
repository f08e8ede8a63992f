//! Binance USDⓈ-M futures market data
//!
//! Public endpoints only, no API key needed:
//! - REST klines as the bar source
//! - aggregate trade WebSocket stream as the live price feed

mod client;
mod stream;
mod types;

pub use client::BinanceClient;
pub use stream::{parse_trade_price, stream_url, PriceStream};
pub use types::*;
