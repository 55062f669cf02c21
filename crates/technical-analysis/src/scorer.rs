use crate::snapshot::{validate_bars, IndicatorSnapshot};
use analysis_core::stats::clamp_finite;
use analysis_core::Bar;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bars of history required before a timeframe is scored at all.
pub const MIN_SCORING_BARS: usize = 30;

const W_OSCILLATOR: f64 = 0.25;
const W_MOMENTUM: f64 = 0.25;
const W_SHORT_MA: f64 = 0.20;
const W_LONG_MA: f64 = 0.20;
const W_TREND_STRENGTH: f64 = 0.10;

/// ADX level at which the trend-strength factor saturates.
const STRONG_TREND_ADX: f64 = 25.0;

/// Bullish and bearish conviction for one timeframe, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeframeScore {
    pub bull_factor: f64,
    pub bear_factor: f64,
}

impl TimeframeScore {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Score a snapshot. Missing readings degrade to neutral: RSI reads as 50,
/// a missing average or MACD contributes nothing, a missing ADX contributes 0.
pub fn score_snapshot(snapshot: &IndicatorSnapshot) -> TimeframeScore {
    if snapshot.bar_count < MIN_SCORING_BARS {
        return TimeframeScore::neutral();
    }

    let rsi = snapshot.rsi.filter(|v| v.is_finite()).unwrap_or(50.0);
    let close = snapshot.close.filter(|v| v.is_finite());

    let above = |level: Option<f64>| match (close, level) {
        (Some(c), Some(l)) if l.is_finite() => c > l,
        _ => false,
    };
    let below = |level: Option<f64>| match (close, level) {
        (Some(c), Some(l)) if l.is_finite() => c < l,
        _ => false,
    };
    let indicator = |hit: bool| if hit { 1.0 } else { 0.0 };

    let (macd_up, macd_down) = match snapshot.macd_slope() {
        Some(slope) => (slope > 0.0, slope < 0.0),
        None => (false, false),
    };

    let strength = match snapshot.adx.filter(|v| v.is_finite()) {
        Some(adx) if adx > STRONG_TREND_ADX => 1.0,
        Some(adx) => clamp_finite(adx / STRONG_TREND_ADX, 0.0, 1.0),
        None => 0.0,
    };

    let bull = W_OSCILLATOR * clamp_finite((rsi - 30.0) / 40.0, 0.0, 1.0)
        + W_MOMENTUM * indicator(macd_up)
        + W_SHORT_MA * indicator(above(snapshot.ema20))
        + W_LONG_MA * indicator(above(snapshot.ema50))
        + W_TREND_STRENGTH * strength;

    let bear = W_OSCILLATOR * clamp_finite((70.0 - rsi) / 40.0, 0.0, 1.0)
        + W_MOMENTUM * indicator(macd_down)
        + W_SHORT_MA * indicator(below(snapshot.ema20))
        + W_LONG_MA * indicator(below(snapshot.ema50))
        + W_TREND_STRENGTH * strength;

    TimeframeScore {
        bull_factor: clamp_finite(bull, 0.0, 1.0),
        bear_factor: clamp_finite(bear, 0.0, 1.0),
    }
}

/// Validate, snapshot and score a bar series. Rejected series score 0/0.
pub fn score_bars(bars: &[Bar]) -> (IndicatorSnapshot, TimeframeScore) {
    if let Err(e) = validate_bars(bars) {
        debug!("Scoring skipped: {}", e);
        return (IndicatorSnapshot::default(), TimeframeScore::neutral());
    }
    let snapshot = IndicatorSnapshot::from_bars(bars);
    let score = score_snapshot(&snapshot);
    (snapshot, score)
}
