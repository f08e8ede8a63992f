//! Bar history loading from CSV files
//!
//! Expected columns: `datetime,open,high,low,close[,volume]` with a header
//! row. The datetime may be RFC 3339, `%Y-%m-%d %H:%M:%S` (UTC) or Unix
//! milliseconds. Extra columns are ignored.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::info;

use crate::Candle;

/// Load and validate OHLC bars, oldest first
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Failed to read row {}", row))?;

        let datetime = parse_datetime(record.get(0).context("Missing datetime column")?)
            .with_context(|| format!("Bad datetime on row {}", row))?;
        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column on row {}", name, row))?
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Failed to parse {} on row {}", name, row))
        };

        let candle = Candle::new(
            datetime,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
        )
        .with_context(|| format!("Invalid bar on row {}", row))?;

        candles.push(candle);
    }

    if candles.windows(2).any(|w| w[1].datetime < w[0].datetime) {
        anyhow::bail!("Bars in {} are not in chronological order", path.display());
    }

    info!("Loaded {} bars from {}", candles.len(), path.display());
    Ok(candles)
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    let millis: i64 = raw
        .parse()
        .with_context(|| format!("Unrecognised datetime: {}", raw))?;
    DateTime::from_timestamp_millis(millis).with_context(|| format!("Timestamp out of range: {}", raw))
}
