//! Backtest command: replay a CSV bar history through the controller

use anyhow::{Context, Result};
use supertrend_trader::{backtest, data};
use tracing::info;

pub fn run(
    config_path: Option<String>,
    data_path: String,
    period: Option<usize>,
    multiplier: Option<f64>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = super::load_config(config_path.as_deref())?;

    if let Some(period) = period {
        info!("Overriding period to: {}", period);
        config.indicator.period = period;
    }
    if let Some(multiplier) = multiplier {
        info!("Overriding multiplier to: {}", multiplier);
        config.indicator.multiplier = multiplier;
    }
    config.validate()?;

    info!("Loading data from: {}", data_path);
    let candles = data::load_csv(&data_path)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    info!("Running backtest...");
    let report = runtime.block_on(backtest::replay(candles, &config))?;

    let return_pct = report.net_pnl.to_f64() / config.trading.capital * 100.0;
    let avg_move = if report.trades.is_empty() {
        0.0
    } else {
        report.trades.iter().map(|t| t.return_pct()).sum::<f64>() / report.trades.len() as f64
    };

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS ({} {})", config.market.symbol, config.market.timeframe);
    println!("{}", "=".repeat(60));
    println!("Capital x Leverage: {:.2} x {:.1}", config.trading.capital, config.trading.leverage);
    println!("Ticks:              {} ({} skipped)", report.ticks, report.skipped);
    println!("Total Trades:       {}", report.trades.len());
    println!("Winning Trades:     {}", report.winning_trades());
    println!("Win Rate:           {:.2}%", report.win_rate);
    println!("Avg Price Move:     {:.3}%", avg_move);
    println!("Fees Paid:          {:.4}", report.total_fees.to_f64());
    println!("Net PnL:            {:.4}", report.net_pnl.to_f64());
    println!("Return on Capital:  {:.2}%", return_pct);
    println!("{}", "=".repeat(60));

    info!("Backtest completed successfully");

    Ok(())
}
