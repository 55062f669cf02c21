use crate::indicators::{self, latest};
use analysis_core::{AnalysisError, Bar, Bias};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const RSI_PERIOD: usize = 14;
pub const EMA_SHORT_PERIOD: usize = 20;
pub const EMA_LONG_PERIOD: usize = 50;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const ADX_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const SUPERTREND_LENGTH: usize = 10;
pub const SUPERTREND_MULTIPLIER: f64 = 3.0;

/// Share of malformed bars above which a series is rejected.
pub const MAX_INVALID_BAR_RATIO: f64 = 0.10;

/// Latest indicator readings for one timeframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub bar_count: usize,
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    pub supertrend: Option<Bias>,
}

impl IndicatorSnapshot {
    /// Compute every indicator over `bars` and keep the latest value of each.
    pub fn from_bars(bars: &[Bar]) -> Self {
        if bars.is_empty() {
            return Self::default();
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let macd = indicators::macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let supertrend = indicators::supertrend(bars, SUPERTREND_LENGTH, SUPERTREND_MULTIPLIER);

        Self {
            bar_count: bars.len(),
            close: closes.last().copied().filter(|c| c.is_finite()),
            rsi: latest(&indicators::rsi(&closes, RSI_PERIOD)),
            ema20: latest(&indicators::ema(&closes, EMA_SHORT_PERIOD)),
            ema50: latest(&indicators::ema(&closes, EMA_LONG_PERIOD)),
            macd: latest(&macd.macd),
            macd_signal: latest(&macd.signal),
            adx: latest(&indicators::adx(bars, ADX_PERIOD)),
            atr: latest(&indicators::atr(bars, ATR_PERIOD)),
            supertrend: supertrend.last().copied().flatten().map(|p| p.direction),
        }
    }

    /// MACD minus its signal line; positive while momentum is building.
    pub fn macd_slope(&self) -> Option<f64> {
        match (self.macd, self.macd_signal) {
            (Some(m), Some(s)) if m.is_finite() && s.is_finite() => Some(m - s),
            _ => None,
        }
    }
}

/// Reject empty series and series where more than 10% of bars have open or
/// close outside their own high/low range.
pub fn validate_bars(bars: &[Bar]) -> Result<(), AnalysisError> {
    if bars.is_empty() {
        return Err(AnalysisError::InsufficientData("empty bar series".to_string()));
    }

    let invalid = bars.iter().filter(|b| !b.is_well_formed()).count();
    let ratio = invalid as f64 / bars.len() as f64;
    if ratio > MAX_INVALID_BAR_RATIO {
        warn!("Rejecting bar series: {} of {} bars malformed", invalid, bars.len());
        return Err(AnalysisError::InvalidData(format!(
            "{:.1}% of bars have OHLC outside range",
            ratio * 100.0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn trending_bars(n: usize, step: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 45, 0).unwrap();
        (0..n)
            .map(|i| {
                let base = 1000.0 + step * i as f64;
                Bar {
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open: base,
                    high: base + 3.0,
                    low: base - 3.0,
                    close: base + step / 2.0,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_snapshot_populated_for_long_series() {
        let snap = IndicatorSnapshot::from_bars(&trending_bars(80, 2.0));

        assert_eq!(snap.bar_count, 80);
        assert!(snap.rsi.unwrap() > 70.0);
        assert!(snap.ema20.unwrap() > snap.ema50.unwrap());
        assert!(snap.macd_slope().is_some());
        assert!(snap.adx.is_some());
        assert!(snap.atr.is_some());
        assert!(snap.supertrend.is_some());
    }

    #[test]
    fn test_snapshot_short_series_leaves_gaps() {
        let snap = IndicatorSnapshot::from_bars(&trending_bars(12, 1.0));

        assert_eq!(snap.bar_count, 12);
        assert!(snap.close.is_some());
        assert!(snap.ema50.is_none());
        assert!(snap.macd.is_none());
        assert!(snap.adx.is_none());
    }

    #[test]
    fn test_validate_bars() {
        assert!(matches!(validate_bars(&[]), Err(AnalysisError::InsufficientData(_))));

        let mut bars = trending_bars(20, 1.0);
        assert!(validate_bars(&bars).is_ok());

        // 2 of 20 is exactly 10% and still accepted
        bars[0].close = bars[0].high + 5.0;
        bars[1].open = bars[1].low - 5.0;
        assert!(validate_bars(&bars).is_ok());

        bars[2].close = bars[2].high + 5.0;
        assert!(matches!(validate_bars(&bars), Err(AnalysisError::InvalidData(_))));
    }
}
