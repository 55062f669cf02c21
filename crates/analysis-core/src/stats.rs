//! Small statistics helpers shared by the volatility and scoring crates.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Percentage (0-100) of `data` that is less than or equal to `value`.
///
/// Ties count fully ("weak" convention), so a value equal to the maximum
/// always scores 100.
pub fn percentile_of_score(value: f64, data: &[f64]) -> f64 {
    if data.is_empty() {
        return 50.0;
    }
    let at_or_below = data.iter().filter(|&&x| x <= value).count();
    (at_or_below as f64 / data.len() as f64) * 100.0
}

/// Clamp that maps NaN to the lower bound instead of propagating it.
pub fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}
