//! Order intents and the paper sink
//!
//! The controller never talks to an exchange. It emits [`OrderIntent`]s and
//! finished [`Trade`]s into an [`OrderSink`]; the sink decides what to do
//! with them (log, record, forward).

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::{Money, Symbol, Trade, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Open,
    Close,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Open => write!(f, "OPEN"),
            OrderAction::Close => write!(f, "CLOSE"),
        }
    }
}

/// What the controller wants done
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub action: OrderAction,
    pub side: Trend,
    pub price: f64,
    pub quantity: f64,
}

/// Fire-and-forget destination for order intents
pub trait OrderSink {
    fn emit(&mut self, intent: &OrderIntent);

    /// Called once per closed position, after the close intent
    fn record_trade(&mut self, _trade: &Trade) {}
}

/// Logs intents and keeps the realized trade ledger in memory
#[derive(Debug, Default)]
pub struct PaperSink {
    intents: Vec<OrderIntent>,
    trades: Vec<Trade>,
    realized_pnl: Money,
    quiet: bool,
}

impl PaperSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record without logging each intent (used by the replay)
    pub fn quiet() -> Self {
        PaperSink {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn intents(&self) -> &[OrderIntent] {
        &self.intents
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn realized_pnl(&self) -> Money {
        self.realized_pnl
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}

impl OrderSink for PaperSink {
    fn emit(&mut self, intent: &OrderIntent) {
        if !self.quiet {
            info!(
                "[PAPER] {} {} {} qty={:.6} @ {:.2}",
                intent.action,
                intent.side.position_label(),
                intent.symbol,
                intent.quantity,
                intent.price
            );
        }
        self.intents.push(intent.clone());
    }

    fn record_trade(&mut self, trade: &Trade) {
        self.realized_pnl += trade.net_pnl;
        if !self.quiet {
            let emoji = if trade.is_win() { "✅" } else { "❌" };
            info!(
                "{} {} {} closed @ {} | PnL={} | {} | session PnL={}",
                emoji,
                trade.side.position_label(),
                trade.symbol,
                trade.exit_price.round_dp(2),
                trade.net_pnl.round_dp(4),
                trade.exit_reason,
                self.realized_pnl.round_dp(4)
            );
        }
        self.trades.push(trade.clone());
    }
}
