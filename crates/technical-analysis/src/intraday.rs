//! Intraday price-position metrics on 5-minute bars.

use analysis_core::Bar;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const PULLBACK_LOOKBACK: usize = 5;
pub const PULLBACK_MIN_PCT: f64 = 1.0;
pub const PULLBACK_MAX_PCT: f64 = 5.0;

const MINUTES_PER_BAR: i64 = 5;
const UPPER_RANGE_LEVEL: f64 = 0.6;
const LOWER_RANGE_LEVEL: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pullback {
    pub pullback_pct: f64,
    pub is_pullback: bool,
}

/// Retracement of the latest close from the highest high of the last
/// `PULLBACK_LOOKBACK` bars. A 1-5% dip counts as a pullback entry.
pub fn pullback(bars: &[Bar]) -> Pullback {
    if bars.len() < PULLBACK_LOOKBACK {
        return Pullback::default();
    }

    let recent = &bars[bars.len() - PULLBACK_LOOKBACK..];
    let recent_high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let close = recent[recent.len() - 1].close;
    if !(recent_high > 0.0) || !close.is_finite() {
        return Pullback::default();
    }

    let pullback_pct = (recent_high - close) / recent_high * 100.0;
    Pullback {
        pullback_pct,
        is_pullback: (PULLBACK_MIN_PCT..=PULLBACK_MAX_PCT).contains(&pullback_pct),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntradayMetrics {
    pub minutes_since_open: i64,
    pub minutes_above_upper: i64,
    pub minutes_below_lower: i64,
}

/// Time spent in the top 40% and bottom 30% of today's range.
///
/// Only bars stamped at or after `session_open` and no later than `now` are
/// considered. Before the open everything is zero.
pub fn intraday_metrics(bars: &[Bar], session_open: DateTime<Utc>, now: DateTime<Utc>) -> IntradayMetrics {
    if now < session_open {
        return IntradayMetrics::default();
    }

    let minutes_since_open = (now - session_open).num_minutes();
    let session_end = session_open + Duration::days(1);
    let today: Vec<&Bar> = bars
        .iter()
        .filter(|b| b.timestamp >= session_open && b.timestamp < session_end && b.timestamp <= now)
        .collect();

    if today.is_empty() {
        return IntradayMetrics {
            minutes_since_open,
            ..Default::default()
        };
    }

    let high = today.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = today.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let range = high - low;
    let upper = low + range * UPPER_RANGE_LEVEL;
    let lower = low + range * LOWER_RANGE_LEVEL;

    let above = today.iter().filter(|b| b.close > upper).count() as i64;
    let below = today.iter().filter(|b| b.close < lower).count() as i64;

    IntradayMetrics {
        minutes_since_open,
        minutes_above_upper: above * MINUTES_PER_BAR,
        minutes_below_lower: below * MINUTES_PER_BAR,
    }
}
