//! Offline replay of a bar history through the live controller
//!
//! Each step reveals one more bar, serves the trailing `window` bars ending
//! at it and uses its close as the live price. The settle delay is skipped,
//! so the take-profit is armed from the bar before the current one.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::controller::{ControllerParams, TickOutcome, TrendFollower};
use crate::error::TraderResult;
use crate::feed::{LivePrice, StaticBars};
use crate::orders::PaperSink;
use crate::{Candle, Money, Trade};

/// Replay summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    /// Controller ticks that ran to completion
    pub ticks: usize,
    /// Ticks that ended in a recoverable error
    pub skipped: usize,
    pub trades: Vec<Trade>,
    pub net_pnl: Money,
    pub total_fees: Money,
    /// Percentage of trades with positive net PnL
    pub win_rate: f64,
}

impl ReplayReport {
    fn from_trades(ticks: usize, skipped: usize, trades: Vec<Trade>) -> Self {
        let net_pnl = trades.iter().map(|t| &t.net_pnl).sum();
        let total_fees = trades.iter().map(|t| &t.fees).sum();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            trades.iter().filter(|t| t.is_win()).count() as f64 / trades.len() as f64 * 100.0
        };

        ReplayReport {
            ticks,
            skipped,
            trades,
            net_pnl,
            total_fees,
            win_rate,
        }
    }

    pub fn winning_trades(&self) -> usize {
        self.trades.iter().filter(|t| t.is_win()).count()
    }
}

/// Walk `candles` bar by bar through a fresh controller
pub async fn replay(candles: Vec<Candle>, config: &Config) -> TraderResult<ReplayReport> {
    let mut params = ControllerParams::from_config(config);
    params.settle_delay = Duration::ZERO;

    // fewer bars cannot produce three trend points
    let first_end = params.period + 3;
    let total = candles.len();
    if total < first_end {
        info!(
            "Replay needs at least {} bars, got {}; nothing to do",
            first_end, total
        );
        return Ok(ReplayReport::default());
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let bars = StaticBars::new(candles);
    let price = LivePrice::new();
    let mut follower = TrendFollower::new(params, bars.clone(), price.clone(), PaperSink::quiet());

    let mut ticks = 0;
    let mut skipped = 0;

    for end in first_end..=total {
        bars.set_visible(end);
        price.set(closes[end - 1]);

        match follower.tick().await {
            Ok(outcome) => {
                ticks += 1;
                if !matches!(outcome, TickOutcome::Idle | TickOutcome::Holding) {
                    debug!("Bar {}: {:?}", end - 1, outcome);
                }
            }
            Err(e) if e.is_transient() => {
                skipped += 1;
                debug!("Bar {} skipped: {}", end - 1, e);
            }
            Err(e) => return Err(e),
        }
    }

    let report = ReplayReport::from_trades(ticks, skipped, follower.into_sink().into_trades());
    info!(
        "Replay finished: {} ticks, {} trades, net PnL {}",
        report.ticks,
        report.trades.len(),
        report.net_pnl.round_dp(4)
    );
    Ok(report)
}
