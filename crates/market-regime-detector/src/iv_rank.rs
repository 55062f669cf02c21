use analysis_core::stats::{clamp_finite, percentile_of_score};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// One year of trading days.
pub const IV_HISTORY_CAPACITY: usize = 252;

/// Samples needed before rank and percentile leave their neutral 50.
pub const MIN_IV_SAMPLES: usize = 10;

const CHEAP_BELOW: f64 = 30.0;
const EXPENSIVE_ABOVE: f64 = 70.0;

/// Where implied volatility sits relative to its own history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    /// Low in its range, favours buying premium
    Cheap,
    Normal,
    /// High in its range, favours selling premium
    Expensive,
}

impl VolatilityRegime {
    pub fn from_rank(iv_rank: f64) -> Self {
        if iv_rank < CHEAP_BELOW {
            VolatilityRegime::Cheap
        } else if iv_rank > EXPENSIVE_ABOVE {
            VolatilityRegime::Expensive
        } else {
            VolatilityRegime::Normal
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VolatilityRegime::Cheap => "CHEAP",
            VolatilityRegime::Normal => "NORMAL",
            VolatilityRegime::Expensive => "EXPENSIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvSample {
    pub date: NaiveDate,
    pub iv: f64,
}

/// IV rank and percentile of one reading against the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IVRankState {
    pub current_iv: f64,
    pub iv_low: f64,
    pub iv_high: f64,
    pub iv_rank: f64,
    pub iv_percentile: f64,
    pub regime: VolatilityRegime,
    pub sample_count: usize,
}

impl IVRankState {
    fn neutral(current_iv: f64, sample_count: usize) -> Self {
        Self {
            current_iv,
            iv_low: current_iv,
            iv_high: current_iv,
            iv_rank: 50.0,
            iv_percentile: 50.0,
            regime: VolatilityRegime::Normal,
            sample_count,
        }
    }

    pub fn should_buy_options(&self) -> bool {
        self.iv_rank < 50.0
    }

    pub fn should_sell_options(&self) -> bool {
        self.iv_rank > 50.0
    }
}

/// Bounded FIFO of daily IV readings for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityHistory {
    samples: VecDeque<IvSample>,
    capacity: usize,
}

impl Default for VolatilityHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl VolatilityHistory {
    pub fn new() -> Self {
        Self::with_capacity(IV_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &IvSample> {
        self.samples.iter()
    }

    /// Append a reading, evicting the oldest beyond capacity. Non-positive
    /// and non-finite readings are ignored and return `false`.
    pub fn add_iv_datapoint(&mut self, date: NaiveDate, iv: f64) -> bool {
        if !iv.is_finite() || iv <= 0.0 {
            debug!("Ignoring IV sample {} for {}", iv, date);
            return false;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(IvSample { date, iv });
        true
    }

    /// Append every defined value of an aligned (date, value) series.
    pub fn seed<I>(&mut self, series: I) -> usize
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        series
            .into_iter()
            .filter_map(|(date, value)| value.map(|v| (date, v)))
            .filter(|&(date, iv)| self.add_iv_datapoint(date, iv))
            .count()
    }

    /// State of the most recent stored reading.
    pub fn state(&self) -> IVRankState {
        match self.samples.back() {
            Some(latest) => self.evaluate(latest.iv),
            None => IVRankState::neutral(0.0, 0),
        }
    }

    /// Rank an externally supplied reading without storing it.
    pub fn evaluate(&self, current_iv: f64) -> IVRankState {
        let count = self.samples.len();
        if count < MIN_IV_SAMPLES || !current_iv.is_finite() {
            return IVRankState::neutral(current_iv, count);
        }

        let values: Vec<f64> = self.samples.iter().map(|s| s.iv).collect();
        let low = values.iter().copied().fold(f64::INFINITY, f64::min);
        let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let iv_rank = if high == low {
            50.0
        } else {
            clamp_finite((current_iv - low) / (high - low) * 100.0, 0.0, 100.0)
        };
        let iv_percentile = clamp_finite(percentile_of_score(current_iv, &values), 0.0, 100.0);

        IVRankState {
            current_iv,
            iv_low: low,
            iv_high: high,
            iv_rank,
            iv_percentile,
            regime: VolatilityRegime::from_rank(iv_rank),
            sample_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use proptest::prelude::*;

    fn day(n: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n as i64)
    }

    fn history(values: &[f64]) -> VolatilityHistory {
        let mut h = VolatilityHistory::new();
        for (i, &v) in values.iter().enumerate() {
            h.add_iv_datapoint(day(i), v);
        }
        h
    }

    #[test]
    fn test_rejects_non_positive_samples() {
        let mut h = VolatilityHistory::new();
        assert!(!h.add_iv_datapoint(day(0), 0.0));
        assert!(!h.add_iv_datapoint(day(0), -0.2));
        assert!(!h.add_iv_datapoint(day(0), f64::NAN));
        assert!(h.add_iv_datapoint(day(0), 0.2));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let values: Vec<f64> = (1..=300).map(|i| i as f64 / 100.0).collect();
        let h = history(&values);

        assert_eq!(h.len(), IV_HISTORY_CAPACITY);
        let first = h.samples().next().unwrap();
        assert_relative_eq!(first.iv, 0.49);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let h = history(&[0.1, 0.2, 0.3]);
        let state = h.state();
        assert_eq!(state.iv_rank, 50.0);
        assert_eq!(state.iv_percentile, 50.0);
        assert_eq!(state.regime, VolatilityRegime::Normal);
        assert!(!state.should_buy_options());
        assert!(!state.should_sell_options());
    }

    #[test]
    fn test_scenario_current_at_max_is_expensive() {
        let mut values = vec![0.15; 251];
        values.push(0.30);
        let state = history(&values).state();

        assert_eq!(state.sample_count, 252);
        assert_eq!(state.iv_rank, 100.0);
        assert_eq!(state.iv_percentile, 100.0);
        assert_eq!(state.regime, VolatilityRegime::Expensive);
        assert!(state.should_sell_options());
    }

    #[test]
    fn test_flat_history_ranks_fifty() {
        let state = history(&[0.2; 20]).state();
        assert_eq!(state.iv_rank, 50.0);
        assert_eq!(state.iv_percentile, 100.0);
    }

    #[test]
    fn test_evaluate_does_not_store() {
        let values: Vec<f64> = (1..=20).map(|i| i as f64 / 100.0).collect();
        let h = history(&values);

        let state = h.evaluate(0.01);
        assert_eq!(h.len(), 20);
        assert_eq!(state.iv_rank, 0.0);
        assert_eq!(state.regime, VolatilityRegime::Cheap);
        assert!(state.should_buy_options());

        // outside the stored range clamps
        assert_eq!(h.evaluate(1.0).iv_rank, 100.0);
    }

    #[test]
    fn test_seed_skips_undefined() {
        let mut h = VolatilityHistory::new();
        let added = h.seed(vec![(day(0), None), (day(1), Some(0.2)), (day(2), Some(-1.0)), (day(3), Some(0.25))]);
        assert_eq!(added, 2);
        assert_eq!(h.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_rank_and_percentile_bounded(
            values in prop::collection::vec(0.001f64..3.0, 0..300),
            current in -1.0f64..5.0,
        ) {
            let h = history(&values);
            for state in [h.state(), h.evaluate(current)] {
                prop_assert!((0.0..=100.0).contains(&state.iv_rank));
                prop_assert!((0.0..=100.0).contains(&state.iv_percentile));
            }
        }
    }
}
