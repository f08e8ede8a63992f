//! Technical indicators
//!
//! Wilder ATR and the Supertrend overlay built on top of it. Every function
//! here is pure: the output depends only on the bars passed in.

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::{Candle, Trend};

/// One Supertrend output, aligned with a single bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub upper_band: f64,
    pub lower_band: f64,
    pub supertrend: f64,
    pub trend: Trend,
}

impl TrendPoint {
    fn new(upper_band: f64, lower_band: f64, trend: Trend) -> Self {
        let supertrend = match trend {
            Trend::Up => lower_band,
            Trend::Down => upper_band,
        };
        TrendPoint {
            upper_band,
            lower_band,
            supertrend,
            trend,
        }
    }
}

/// True range of every bar that has a predecessor.
///
/// `result[i]` belongs to `candles[i + 1]`:
/// `max(high - low, |high - prev_close|, |low - prev_close|)`.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|pair| {
            let prev_close = pair[0].close;
            let bar = &pair[1];
            let hl = bar.high - bar.low;
            let hc = (bar.high - prev_close).abs();
            let lc = (bar.low - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range using Wilder's smoothing.
///
/// The first value is the SMA of the first `period` true ranges, later values
/// follow `atr = prev + (tr - prev) / period`. `result[i]` belongs to
/// `candles[i + period]`, so the output has `len - period` values.
pub fn atr(candles: &[Candle], period: usize) -> Result<Vec<f64>, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod);
    }
    if candles.len() < period + 1 {
        return Err(IndicatorError::InsufficientData {
            required: period + 1,
            available: candles.len(),
        });
    }

    let tr = true_range(candles);
    let n = period as f64;

    let seed = tr[..period].iter().sum::<f64>() / n;
    let mut result = Vec::with_capacity(tr.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &value in &tr[period..] {
        prev += (value - prev) / n;
        result.push(prev);
    }

    Ok(result)
}

/// Supertrend over `candles`.
///
/// The first point is seeded `Down`. After that the band on the trailing side
/// only ratchets in the direction of the trend, and the trend flips when the
/// close crosses the previous point's opposite band.
///
/// # Errors
/// `InsufficientData` when fewer than `period + 1` bars are given,
/// `InvalidPeriod` for `period == 0` and `InvalidMultiplier` for a
/// multiplier that is not finite and positive.
pub fn supertrend(
    candles: &[Candle],
    period: usize,
    multiplier: f64,
) -> Result<Vec<TrendPoint>, IndicatorError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(IndicatorError::InvalidMultiplier(multiplier));
    }

    let atr_values = atr(candles, period)?;
    let mut result: Vec<TrendPoint> = Vec::with_capacity(atr_values.len());

    for (i, &atr_value) in atr_values.iter().enumerate() {
        let bar = &candles[i + period];
        let hl2 = bar.hl2();
        let mut upper = hl2 + multiplier * atr_value;
        let mut lower = hl2 - multiplier * atr_value;

        let Some(prev) = result.last().copied() else {
            result.push(TrendPoint::new(upper, lower, Trend::Down));
            continue;
        };

        // Ratchet before the flip test; the flip compares against prev's bands.
        match prev.trend {
            Trend::Up => lower = lower.max(prev.lower_band),
            Trend::Down => upper = upper.min(prev.upper_band),
        }

        let trend = match prev.trend {
            Trend::Down if bar.close > prev.upper_band => Trend::Up,
            Trend::Up if bar.close < prev.lower_band => Trend::Down,
            unchanged => unchanged,
        };

        result.push(TrendPoint::new(upper, lower, trend));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                datetime: start + Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
            })
            .collect()
    }

    fn flat(count: usize, price: f64) -> Vec<Candle> {
        bars(&vec![(price, price, price, price); count])
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = bars(&[
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 10.5, 9.5, 10.2),  // inside bar: hl = 1.0
            (13.0, 14.0, 12.5, 13.5), // gap up: high - prev_close = 3.8
            (11.0, 11.5, 10.0, 10.5), // gap down: prev_close - low = 3.5
        ]);
        let tr = true_range(&candles);
        assert_eq!(tr.len(), 3);
        assert_relative_eq!(tr[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(tr[1], 3.8, epsilon = 1e-9);
        assert_relative_eq!(tr[2], 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_atr_wilder_smoothing() {
        let candles = bars(&[
            (10.0, 10.0, 10.0, 10.0),
            (10.0, 12.0, 10.0, 11.0), // tr 2
            (11.0, 15.0, 11.0, 14.0), // tr 4
            (14.0, 14.0, 8.0, 9.0),   // tr 6
            (9.0, 10.0, 9.0, 9.5),    // tr 1
        ]);
        let values = atr(&candles, 2).unwrap();
        assert_eq!(values.len(), 3);
        assert_relative_eq!(values[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(values[1], 4.5, epsilon = 1e-9);
        assert_relative_eq!(values[2], 2.75, epsilon = 1e-9);
    }

    #[test]
    fn test_atr_rejects_zero_period() {
        assert_eq!(atr(&flat(5, 1.0), 0), Err(IndicatorError::InvalidPeriod));
    }

    #[test]
    fn test_supertrend_insufficient_data() {
        let err = supertrend(&flat(12, 100.0), 12, 3.0).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InsufficientData {
                required: 13,
                available: 12
            }
        );
    }

    #[test]
    fn test_supertrend_minimum_window_gives_one_point() {
        let points = supertrend(&flat(13, 100.0), 12, 3.0).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].trend, Trend::Down);
        assert_eq!(points[0].supertrend, points[0].upper_band);
    }

    #[test]
    fn test_supertrend_rejects_bad_multiplier() {
        assert!(matches!(
            supertrend(&flat(20, 100.0), 3, 0.0),
            Err(IndicatorError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            supertrend(&flat(20, 100.0), 3, f64::NAN),
            Err(IndicatorError::InvalidMultiplier(_))
        ));
    }

    #[test]
    fn test_supertrend_flat_prices_never_flip() {
        let points = supertrend(&flat(40, 50.0), 5, 3.0).unwrap();
        assert_eq!(points.len(), 35);
        for point in &points {
            assert_eq!(point.trend, Trend::Down);
            assert_relative_eq!(point.upper_band, 50.0, epsilon = 1e-9);
            assert_relative_eq!(point.lower_band, 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_supertrend_seed_is_down_with_upper_band() {
        let candles = bars(&[
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 11.0, 9.0, 10.0),
        ]);
        let points = supertrend(&candles, 2, 1.0).unwrap();
        // atr = 2, hl2 = 10
        assert_relative_eq!(points[0].upper_band, 12.0, epsilon = 1e-9);
        assert_relative_eq!(points[0].lower_band, 8.0, epsilon = 1e-9);
        assert_eq!(points[0].trend, Trend::Down);
        assert_relative_eq!(points[0].supertrend, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_upper_band_ratchets_down_while_trend_down() {
        let mut ohlc = vec![(10.0, 11.0, 9.0, 10.0); 3];
        // wider bar pushes the candidate upper band above the previous one
        ohlc.push((10.0, 13.0, 9.0, 10.0));
        let points = supertrend(&bars(&ohlc), 2, 1.0).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].trend, Trend::Down);
        assert!(points[1].upper_band <= points[0].upper_band);
        assert_relative_eq!(points[1].upper_band, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flip_uses_previous_band_not_candidate() {
        // prev upper band is 12; close 12.5 is above it even though the
        // candidate upper band on this wide bar is much higher.
        let candles = bars(&[
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 13.0, 9.0, 12.5),
        ]);
        let points = supertrend(&candles, 2, 1.0).unwrap();
        assert_eq!(points[1].trend, Trend::Up);
        assert_eq!(points[1].supertrend, points[1].lower_band);
    }

    #[test]
    fn test_supertrend_is_pure() {
        let candles = bars(&[
            (10.0, 11.0, 9.0, 10.0),
            (10.0, 12.0, 9.5, 11.5),
            (11.5, 13.0, 11.0, 12.8),
            (12.8, 13.2, 10.0, 10.4),
            (10.4, 10.9, 8.7, 9.0),
            (9.0, 9.8, 8.8, 9.7),
        ]);
        let first = supertrend(&candles, 3, 1.5).unwrap();
        let second = supertrend(&candles, 3, 1.5).unwrap();
        assert_eq!(first, second);
    }
}
