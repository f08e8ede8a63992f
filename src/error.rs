//! Error taxonomy for the indicator and the controller

use thiserror::Error;

/// Failures of a single indicator computation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndicatorError {
    #[error("not enough bars: need at least {required}, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("period must be at least 1")]
    InvalidPeriod,

    #[error("multiplier must be finite and positive, got {0}")]
    InvalidMultiplier(f64),
}

/// Recoverable failures of one controller tick.
///
/// None of these stop the polling loop; the tick is abandoned and retried
/// after the poll interval.
#[derive(Debug, Error)]
pub enum TraderError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("bar data unavailable: {0}")]
    DataUnavailable(String),

    #[error("live price not ready")]
    PriceNotReady,

    #[error("take profit arming failed: {0}")]
    TakeProfitArmingFailed(String),
}

impl TraderError {
    /// Errors that only mean "no signal this tick"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraderError::PriceNotReady
                | TraderError::Indicator(IndicatorError::InsufficientData { .. })
        )
    }
}

pub type TraderResult<T> = Result<T, TraderError>;
