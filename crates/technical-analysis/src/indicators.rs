//! Indicator maths.
//!
//! Every series returned here is aligned index-for-index with its input;
//! warm-up positions are `None`, so callers can read the latest value with
//! `series.last().copied().flatten()`.

use analysis_core::{Bar, Bias};

/// Trading days per year used to annualise volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fallback annualised volatility when there is not enough history.
pub const DEFAULT_VOLATILITY: f64 = 0.15;

/// Floor applied to computed historical volatility.
pub const MIN_VOLATILITY: f64 = 0.05;

/// Latest defined value of an aligned series.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Exponential Moving Average (recursive, seeded with the first value).
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.is_empty() {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = data[0];
    for (i, &x) in data.iter().enumerate() {
        if i > 0 {
            value = alpha * x + (1.0 - alpha) * value;
        }
        if i + 1 >= period {
            out[i] = Some(value);
        }
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() <= period {
        return out;
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let to_rsi = |gain: f64, loss: f64| {
        if loss == 0.0 {
            if gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };

    out[period] = Some(to_rsi(avg_gain, avg_loss));
    for i in period..changes.len() {
        let change = changes[i];
        avg_gain = (avg_gain * (period - 1) as f64 + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-change).max(0.0)) / period as f64;
        out[i + 1] = Some(to_rsi(avg_gain, avg_loss));
    }
    out
}

/// MACD line and its signal line, both aligned with the input.
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let empty = MacdSeries {
        macd: vec![None; data.len()],
        signal: vec![None; data.len()],
    };
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow {
        return empty;
    }

    let fast_ema = ema(data, fast);
    let slow_ema = ema(data, slow);
    let macd_line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal line is an EMA over the defined part of the MACD line
    let first_defined = match macd_line.iter().position(Option::is_some) {
        Some(idx) => idx,
        None => return empty,
    };
    let defined: Vec<f64> = macd_line[first_defined..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut signal = vec![None; first_defined];
    signal.extend(ema(&defined, signal_period));

    MacdSeries {
        macd: macd_line,
        signal,
    }
}

fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let high_low = bar.high - bar.low;
            if i == 0 {
                return high_low;
            }
            let prev_close = bars[i - 1].close;
            high_low
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// Average True Range as a rolling mean of true range.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr = true_ranges(bars);
    for i in period - 1..bars.len() {
        out[i] = Some(tr[i + 1 - period..=i].iter().sum::<f64>() / period as f64);
    }
    out
}

/// Average Directional Index (Wilder), measuring trend strength on 0-100.
pub fn adx(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < 2 * period + 1 {
        return out;
    }

    let tr = true_ranges(bars);
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let mut sm_tr: f64 = tr[1..=period].iter().sum();
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();

    let dx_at = |sm_tr: f64, sm_plus: f64, sm_minus: f64| {
        if sm_tr <= 0.0 {
            return 0.0;
        }
        let pdi = 100.0 * sm_plus / sm_tr;
        let mdi = 100.0 * sm_minus / sm_tr;
        let sum = pdi + mdi;
        if sum > 0.0 {
            100.0 * (pdi - mdi).abs() / sum
        } else {
            0.0
        }
    };

    // dx[i] is defined from index `period` onwards
    let mut dx = vec![dx_at(sm_tr, sm_plus, sm_minus)];
    for i in period + 1..bars.len() {
        sm_tr = sm_tr - sm_tr / period as f64 + tr[i];
        sm_plus = sm_plus - sm_plus / period as f64 + plus_dm[i];
        sm_minus = sm_minus - sm_minus / period as f64 + minus_dm[i];
        dx.push(dx_at(sm_tr, sm_plus, sm_minus));
    }

    let mut adx_val = dx[..period].iter().sum::<f64>() / period as f64;
    out[2 * period - 1] = Some(adx_val);
    for (k, &d) in dx.iter().enumerate().skip(period) {
        adx_val = (adx_val * (period - 1) as f64 + d) / period as f64;
        out[period + k] = Some(adx_val);
    }
    out
}

/// One SuperTrend reading: the active band and the direction it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperTrendPoint {
    pub band: f64,
    pub direction: Bias,
}

/// SuperTrend over `length`-bar ATR with a band `multiplier`.
///
/// A close at or under the upper band reads bearish (band = upper), a close
/// above it reads bullish (band = lower). The first `length` bars are `None`.
pub fn supertrend(bars: &[Bar], length: usize, multiplier: f64) -> Vec<Option<SuperTrendPoint>> {
    let atr_values = atr(bars, length);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < length {
                return None;
            }
            let atr = atr_values[i]?;
            let mid = (bar.high + bar.low) / 2.0;
            let upper = mid + multiplier * atr;
            let lower = mid - multiplier * atr;
            if bar.close <= upper {
                Some(SuperTrendPoint {
                    band: upper,
                    direction: Bias::Bearish,
                })
            } else {
                Some(SuperTrendPoint {
                    band: lower,
                    direction: Bias::Bullish,
                })
            }
        })
        .collect()
}

/// Annualised historical volatility from the last `period` log returns.
///
/// Falls back to [`DEFAULT_VOLATILITY`] when there are fewer than
/// `max(period, 10)` returns and never reports less than [`MIN_VOLATILITY`].
pub fn historical_volatility(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period {
        return DEFAULT_VOLATILITY;
    }
    if closes.iter().any(|c| *c <= 0.0 || !c.is_finite()) {
        return DEFAULT_VOLATILITY;
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    if returns.len() < period.max(10) {
        return DEFAULT_VOLATILITY;
    }

    let window = &returns[returns.len() - period..];
    let hv = analysis_core::stats::population_std_dev(window) * TRADING_DAYS_PER_YEAR.sqrt();
    if hv.is_finite() {
        hv.max(MIN_VOLATILITY)
    } else {
        DEFAULT_VOLATILITY
    }
}

/// Rolling annualised volatility of simple returns (sample stdev), one value
/// per bar. Used to seed implied-volatility history when no IV feed exists.
pub fn rolling_volatility(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period < 2 || closes.len() <= period {
        return out;
    }

    let returns: Vec<Option<f64>> = std::iter::once(None)
        .chain(closes.windows(2).map(|w| {
            if w[0] != 0.0 {
                Some(w[1] / w[0] - 1.0)
            } else {
                None
            }
        }))
        .collect();

    for i in period..closes.len() {
        let window: Option<Vec<f64>> = returns[i + 1 - period..=i].iter().copied().collect();
        if let Some(window) = window {
            let m = analysis_core::stats::mean(&window);
            let var = window.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (period - 1) as f64;
            out[i] = Some(var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt());
        }
    }
    out
}
