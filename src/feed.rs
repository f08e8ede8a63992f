//! Market data seams used by the controller
//!
//! - [`BarSource`]: pulls a window of recent bars (network bound, async)
//! - [`PriceSource`]: reads the latest pushed price without blocking
//! - [`LivePrice`]: single-writer / multi-reader price cell behind a price stream

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{TraderError, TraderResult};
use crate::{Candle, Symbol};

/// Supplier of bar history
pub trait BarSource {
    /// The most recent `count` bars, oldest first. The last bar may still be
    /// forming.
    fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: &str,
        count: usize,
    ) -> impl Future<Output = TraderResult<Vec<Candle>>> + Send;
}

/// Supplier of the latest traded price
pub trait PriceSource {
    /// Fails with `PriceNotReady` until a first price has arrived
    fn live_price(&self) -> TraderResult<f64>;
}

/// Last price pushed by a stream, stored as raw `f64` bits.
///
/// Zero means nothing has arrived yet. Clones share the same cell.
#[derive(Debug, Clone, Default)]
pub struct LivePrice {
    bits: Arc<AtomicU64>,
}

impl LivePrice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new price; non-finite or non-positive values are ignored
    pub fn set(&self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.bits.store(price.to_bits(), Ordering::Release);
        }
    }

    pub fn get(&self) -> Option<f64> {
        match self.bits.load(Ordering::Acquire) {
            0 => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

impl PriceSource for LivePrice {
    fn live_price(&self) -> TraderResult<f64> {
        self.get().ok_or(TraderError::PriceNotReady)
    }
}

/// In-memory bar history, served as a trailing window.
///
/// Used by the replay and by tests; the visible end of the history can be
/// moved forward to simulate time passing.
#[derive(Debug, Clone, Default)]
pub struct StaticBars {
    inner: Arc<Mutex<StaticBarsState>>,
}

#[derive(Debug, Default)]
struct StaticBarsState {
    candles: Vec<Candle>,
    visible: usize,
}

impl StaticBars {
    /// All bars visible
    pub fn new(candles: Vec<Candle>) -> Self {
        let visible = candles.len();
        StaticBars {
            inner: Arc::new(Mutex::new(StaticBarsState { candles, visible })),
        }
    }

    /// Only bars `[0, visible)` are served
    pub fn set_visible(&self, visible: usize) {
        if let Ok(mut state) = self.inner.lock() {
            state.visible = visible.min(state.candles.len());
        }
    }

    fn window(&self, count: usize) -> TraderResult<Vec<Candle>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| TraderError::DataUnavailable("bar store poisoned".to_string()))?;
        if state.visible == 0 {
            return Err(TraderError::DataUnavailable("no bars".to_string()));
        }
        let start = state.visible.saturating_sub(count);
        Ok(state.candles[start..state.visible].to_vec())
    }
}

impl BarSource for StaticBars {
    async fn fetch_bars(
        &self,
        _symbol: &Symbol,
        _timeframe: &str,
        count: usize,
    ) -> TraderResult<Vec<Candle>> {
        self.window(count)
    }
}
