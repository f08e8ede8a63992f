//! Live paper-trading loop
//!
//! Bars come from the REST klines endpoint, the price from the aggregate
//! trade stream. One tick runs every poll interval until Ctrl+C.

use anyhow::{Context, Result};
use supertrend_trader::binance::{is_valid_interval, BinanceClient, PriceStream};
use supertrend_trader::controller::{log_tick, ControllerParams, TrendFollower};
use supertrend_trader::feed::LivePrice;
use supertrend_trader::orders::PaperSink;
use tracing::info;

pub fn run(config_path: Option<String>, symbol: Option<String>) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, symbol))
}

async fn run_async(config_path: Option<String>, symbol: Option<String>) -> Result<()> {
    let mut config = super::load_config(config_path.as_deref())?;
    if let Some(symbol) = symbol {
        info!("Overriding symbol to: {}", symbol);
        config.market.symbol = symbol;
        config.validate()?;
    }

    if !is_valid_interval(&config.market.timeframe) {
        anyhow::bail!("Unsupported Binance interval: {}", config.market.timeframe);
    }

    let params = ControllerParams::from_config(&config);
    let poll_interval = config.trading.poll_interval();

    info!("==============================================================");
    info!("SUPERTREND TREND FOLLOWER - PAPER MODE");
    info!("Symbol: {} | Timeframe: {}", params.symbol, params.timeframe);
    info!(
        "Supertrend: period {} x {} | Window: {} bars",
        params.period, params.multiplier, params.window
    );
    info!(
        "Notional: {:.2} | Round trip fees: {:.4} | TP fraction: {}",
        params.notional,
        params.round_trip_fees,
        params.take_profit_fraction
    );
    info!("==============================================================");

    let client = BinanceClient::new(config.market.rest_url.as_str())?;
    let price = LivePrice::new();
    let stream = PriceStream::new(
        &config.market.ws_url,
        &params.symbol,
        price.clone(),
        config.market.reconnect_delay(),
    )
    .spawn();

    let mut trader = TrendFollower::new(params, client, price, PaperSink::new());

    info!("Starting trading loop...");

    loop {
        tokio::select! {
            result = trader.tick() => {
                log_tick(&result);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    stream.abort();

    let sink = trader.sink();
    if trader.position().is_open() {
        info!("Position still open at shutdown: {:?}", trader.position());
    }
    info!(
        "Session ended: {} trades, realized PnL {}",
        sink.trades().len(),
        sink.realized_pnl().round_dp(4)
    );
    Ok(())
}
