//! Supertrend trend-following controller
//!
//! Single-symbol, single-position state machine. Every tick pulls a fresh bar
//! window, recomputes the Supertrend series and looks at its last three
//! points:
//!
//! - first tick: remember the current trend as the confirmed regime
//! - `prev != prev_prev` with no open position: reversal confirmed, open in
//!   the direction of `prev_prev` and arm a take-profit from the previous
//!   bar's body
//! - take-profit touched: close, skip the normal exit for this tick
//! - `prev_prev == confirmed` with an open position: trend exit

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{IndicatorError, TraderError, TraderResult};
use crate::feed::{BarSource, PriceSource};
use crate::indicators::{supertrend, TrendPoint};
use crate::orders::{OrderAction, OrderIntent, OrderSink};
use crate::{ExitReason, Money, Symbol, Trade, Trend};

/// Everything the controller needs from the configuration
#[derive(Debug, Clone)]
pub struct ControllerParams {
    pub symbol: Symbol,
    pub timeframe: String,
    pub window: usize,
    pub period: usize,
    pub multiplier: f64,
    pub notional: f64,
    /// Opening plus closing fee of one position
    pub round_trip_fees: f64,
    pub take_profit_fraction: f64,
    pub settle_delay: Duration,
    pub guard_traded_regime: bool,
    pub trend_exit: bool,
}

impl ControllerParams {
    pub fn from_config(config: &Config) -> Self {
        ControllerParams {
            symbol: config.symbol(),
            timeframe: config.market.timeframe.clone(),
            window: config.market.window,
            period: config.indicator.period,
            multiplier: config.indicator.multiplier,
            notional: config.trading.notional(),
            round_trip_fees: config.trading.round_trip_fees(),
            take_profit_fraction: config.trading.take_profit_fraction,
            settle_delay: config.trading.settle_delay(),
            guard_traded_regime: config.trading.guard_traded_regime,
            trend_exit: config.trading.trend_exit,
        }
    }
}

/// The one position the controller may hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionState {
    pub direction: Option<Trend>,
    pub entry_price: f64,
    pub quantity: f64,
    /// Only set while open and armed
    pub take_profit: Option<f64>,
    pub entry_time: Option<DateTime<Utc>>,
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        self.direction.is_some()
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// First tick: the regime was recorded, nothing traded
    TrendInitialised(Trend),
    Opened {
        side: Trend,
        price: f64,
        take_profit: Option<f64>,
    },
    Closed {
        side: Trend,
        price: f64,
        reason: ExitReason,
        net_pnl: f64,
    },
    /// Position open, no exit this tick
    Holding,
    /// Flat, no entry this tick
    Idle,
}

pub struct TrendFollower<B, P, S> {
    params: ControllerParams,
    bars: B,
    prices: P,
    sink: S,
    position: PositionState,
    confirmed: Option<Trend>,
    traded_in_regime: bool,
}

impl<B, P, S> TrendFollower<B, P, S>
where
    B: BarSource,
    P: PriceSource,
    S: OrderSink,
{
    pub fn new(params: ControllerParams, bars: B, prices: P, sink: S) -> Self {
        TrendFollower {
            params,
            bars,
            prices,
            sink,
            position: PositionState::default(),
            confirmed: None,
            traded_in_regime: false,
        }
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn confirmed_trend(&self) -> Option<Trend> {
        self.confirmed
    }

    pub fn traded_in_regime(&self) -> bool {
        self.traded_in_regime
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Fetch the bar window, recompute the trend series and act on it
    pub async fn tick(&mut self) -> TraderResult<TickOutcome> {
        let candles = self
            .bars
            .fetch_bars(&self.params.symbol, &self.params.timeframe, self.params.window)
            .await?;
        let series = supertrend(&candles, self.params.period, self.params.multiplier)?;
        let now = candles.last().map(|c| c.datetime).unwrap_or_else(Utc::now);

        self.step(&series, now).await
    }

    /// Act on an already computed trend series. `now` stamps any trade.
    pub async fn step(
        &mut self,
        series: &[TrendPoint],
        now: DateTime<Utc>,
    ) -> TraderResult<TickOutcome> {
        let [prev_prev, prev, current] = last_three(series)?;

        let Some(confirmed) = self.confirmed else {
            info!("Setting trend {}", current.trend);
            self.confirmed = Some(current.trend);
            return Ok(TickOutcome::TrendInitialised(current.trend));
        };

        if current.trend != confirmed {
            info!("Trend reversing {} ==>> {}", confirmed, current.trend);
            self.traded_in_regime = false;
        }

        let mut outcome = if self.position.is_open() {
            TickOutcome::Holding
        } else {
            TickOutcome::Idle
        };

        let regime_blocked = self.params.guard_traded_regime && self.traded_in_regime;
        if prev.trend != prev_prev.trend && !self.position.is_open() && !regime_blocked {
            // read the price before touching any state
            let price = self.prices.live_price()?;
            info!("Trend reversed to {}", prev.trend);
            self.confirmed = Some(prev.trend);
            self.open(prev_prev.trend, price, now);
            self.arm_take_profit().await;
            outcome = TickOutcome::Opened {
                side: prev_prev.trend,
                price,
                take_profit: self.position.take_profit,
            };
        }

        if let Some(closed) = self.close_if_take_profit_hit(now) {
            return Ok(closed);
        }

        if self.params.trend_exit
            && self.position.is_open()
            && Some(prev_prev.trend) == self.confirmed
        {
            let price = self.prices.live_price()?;
            info!("Closing position on trend exit");
            return Ok(self.close(price, ExitReason::TrendExit, now));
        }

        Ok(outcome)
    }

    fn open(&mut self, side: Trend, price: f64, now: DateTime<Utc>) {
        let quantity = self.params.notional / price;
        info!(
            "Opening position {} at {:.2} (qty {:.6})",
            side.position_label(),
            price,
            quantity
        );

        self.position = PositionState {
            direction: Some(side),
            entry_price: price,
            quantity,
            take_profit: None,
            entry_time: Some(now),
        };

        self.sink.emit(&OrderIntent {
            symbol: self.params.symbol.clone(),
            action: OrderAction::Open,
            side,
            price,
            quantity,
        });
    }

    async fn arm_take_profit(&mut self) {
        let Some(side) = self.position.direction else {
            return;
        };

        match self.take_profit_for(side).await {
            Ok(take_profit) => {
                info!("Take profit set to: {:.2}", take_profit);
                self.position.take_profit = Some(take_profit);
            }
            Err(e) => {
                warn!("{}; position stays open without a take profit", e);
            }
        }
    }

    /// Previous completed bar's close pushed by a share of its body
    async fn take_profit_for(&self, side: Trend) -> TraderResult<f64> {
        if !self.params.settle_delay.is_zero() {
            tokio::time::sleep(self.params.settle_delay).await;
        }

        let candles = self
            .bars
            .fetch_bars(&self.params.symbol, &self.params.timeframe, 2)
            .await
            .map_err(|e| TraderError::TakeProfitArmingFailed(e.to_string()))?;

        let previous = match candles.len() {
            n if n >= 2 => &candles[n - 2],
            _ => {
                return Err(TraderError::TakeProfitArmingFailed(
                    "no completed bar available".to_string(),
                ))
            }
        };

        let distance = previous.body_length() * self.params.take_profit_fraction;
        Ok(match side {
            Trend::Up => previous.close + distance,
            Trend::Down => previous.close - distance,
        })
    }

    fn close_if_take_profit_hit(&mut self, now: DateTime<Utc>) -> Option<TickOutcome> {
        let side = self.position.direction?;
        let take_profit = self.position.take_profit?;

        let price = match self.prices.live_price() {
            Ok(price) => price,
            Err(e) => {
                debug!("Skipping take profit check: {}", e);
                return None;
            }
        };

        let hit = match side {
            Trend::Up => price >= take_profit,
            Trend::Down => price <= take_profit,
        };
        if !hit {
            return None;
        }

        info!("Take profit hit at {:.2} (target {:.2})", price, take_profit);
        Some(self.close(price, ExitReason::TakeProfit, now))
    }

    fn close(&mut self, price: f64, reason: ExitReason, now: DateTime<Utc>) -> TickOutcome {
        let Some(side) = self.position.direction else {
            return TickOutcome::Idle;
        };

        let entry = self.position.entry_price;
        let quantity = self.position.quantity;
        let fees = self.params.round_trip_fees;
        let gross = match side {
            Trend::Up => (price - entry) * quantity,
            Trend::Down => (entry - price) * quantity,
        };
        let net_pnl = gross - fees;

        info!(
            "Closing position {}. Current Price {:.2} Profit {:.4}",
            side.position_label(),
            price,
            net_pnl
        );

        self.sink.emit(&OrderIntent {
            symbol: self.params.symbol.clone(),
            action: OrderAction::Close,
            side,
            price,
            quantity,
        });

        let trade = Trade {
            symbol: self.params.symbol.clone(),
            side,
            entry_price: Money::from_f64(entry),
            exit_price: Money::from_f64(price),
            quantity: Money::from_f64(quantity),
            entry_time: self.position.entry_time.unwrap_or(now),
            exit_time: now,
            fees: Money::from_f64(fees),
            net_pnl: Money::from_f64(net_pnl),
            exit_reason: reason,
        };
        self.sink.record_trade(&trade);

        self.position = PositionState::default();
        self.traded_in_regime = true;

        TickOutcome::Closed {
            side,
            price,
            reason,
            net_pnl,
        }
    }
}

/// `[prev_prev, prev, current]`, the three newest points
fn last_three(series: &[TrendPoint]) -> TraderResult<[TrendPoint; 3]> {
    match series {
        [.., prev_prev, prev, current] => Ok([*prev_prev, *prev, *current]),
        _ => Err(IndicatorError::InsufficientData {
            required: 3,
            available: series.len(),
        }
        .into()),
    }
}

/// Log a tick result at the level its outcome deserves
pub fn log_tick(result: &TraderResult<TickOutcome>) {
    match result {
        Ok(TickOutcome::Idle) | Ok(TickOutcome::Holding) => debug!("Tick: no action"),
        Ok(outcome) => debug!("Tick: {:?}", outcome),
        Err(e) if e.is_transient() => warn!("Tick skipped: {}", e),
        Err(e) => error!("Tick failed: {}", e),
    }
}
