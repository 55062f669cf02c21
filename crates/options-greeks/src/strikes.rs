use crate::greeks::{GreeksEngine, GreeksResult};
use analysis_core::{CalcStatus, OptionType};
use anyhow::{bail, Result};
use market_regime_detector::{FlowState, PcrRegime};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OTM implied volatility proxy relative to ATM when no chain is available.
const OTM_IV_FACTOR: f64 = 0.95;
const SKEW_FAVORABLE_THRESHOLD: f64 = 0.05;

/// Liquidity traffic light for a strike recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeStatus {
    Green,
    Yellow,
    Red,
}

impl VolumeStatus {
    /// Combine call and put sides: green only when both are.
    pub fn combine(call: VolumeStatus, put: VolumeStatus) -> Self {
        match (call, put) {
            (VolumeStatus::Green, VolumeStatus::Green) => VolumeStatus::Green,
            (VolumeStatus::Red, _) | (_, VolumeStatus::Red) => VolumeStatus::Red,
            _ => VolumeStatus::Yellow,
        }
    }
}

/// Aggregate Greek calculation outcome across the two best strikes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GreekStatus {
    Success,
    PartialFailure,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeCandidate {
    pub strike: f64,
    pub option_type: OptionType,
    pub greeks: GreeksResult,
    pub distance_pct: f64,
    pub score: f64,
    /// |delta| as a percentage
    pub profit_probability: f64,
}

/// Market inputs for one strike-selection pass.
#[derive(Debug, Clone, Copy)]
pub struct StrikeRequest {
    pub spot: f64,
    pub tau: f64,
    pub implied_vol: Option<f64>,
    pub historical_vol: f64,
}

impl StrikeRequest {
    /// Implied volatility when a positive one is supplied, otherwise historical.
    pub fn volatility(&self) -> f64 {
        match self.implied_vol {
            Some(iv) if iv > 0.0 && iv.is_finite() => iv,
            _ => self.historical_vol,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeRecommendation {
    pub atm_strike: f64,
    pub best_call: Option<StrikeCandidate>,
    /// Previous best call that the final best displaced, if any
    pub alt_call: Option<StrikeCandidate>,
    pub best_put: Option<StrikeCandidate>,
    pub alt_put: Option<StrikeCandidate>,
    pub call_volume_status: VolumeStatus,
    pub put_volume_status: VolumeStatus,
    pub volume_status: VolumeStatus,
    pub iv_used: f64,
    pub call_skew: f64,
    pub put_skew: f64,
    pub skew_score: f64,
    pub skew_favorable: bool,
    pub greek_status: GreekStatus,
    pub pcr_regime: PcrRegime,
}

impl StrikeRecommendation {
    fn failed(iv_used: f64, pcr_regime: PcrRegime) -> Self {
        Self {
            atm_strike: 0.0,
            best_call: None,
            alt_call: None,
            best_put: None,
            alt_put: None,
            call_volume_status: VolumeStatus::Red,
            put_volume_status: VolumeStatus::Red,
            volume_status: VolumeStatus::Red,
            iv_used,
            call_skew: 0.0,
            put_skew: 0.0,
            skew_score: 0.0,
            skew_favorable: false,
            greek_status: GreekStatus::Failed,
            pcr_regime,
        }
    }

    /// Best candidate on the side matching `option_type`.
    pub fn best(&self, option_type: OptionType) -> Option<&StrikeCandidate> {
        match option_type {
            OptionType::Call => self.best_call.as_ref(),
            OptionType::Put => self.best_put.as_ref(),
        }
    }
}

/// Walks strikes outward from ATM and keeps the best-scoring contract per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeSelector {
    pub strike_step: f64,
    pub max_distance_pct: f64,
    /// Strikes examined beyond ATM on each side
    pub max_steps: usize,
    pub min_delta: f64,
    pub max_delta: f64,
    pub target_delta: f64,
    /// Distance from spot within which a strike counts as liquid
    pub liquid_distance_pct: f64,
}

impl Default for StrikeSelector {
    fn default() -> Self {
        Self {
            strike_step: 100.0,
            max_distance_pct: 2.5,
            max_steps: 2,
            min_delta: 0.30,
            max_delta: 0.60,
            target_delta: 0.45,
            liquid_distance_pct: 1.5,
        }
    }
}

impl StrikeSelector {
    pub fn new(strike_step: f64, max_distance_pct: f64, max_steps: usize) -> Result<Self> {
        if !(strike_step > 0.0) || !strike_step.is_finite() {
            bail!("strike_step must be positive");
        }
        if !(max_distance_pct > 0.0) || max_distance_pct > 100.0 {
            bail!("max_distance_pct must be between 0 and 100");
        }
        Ok(Self {
            strike_step,
            max_distance_pct,
            max_steps,
            ..Self::default()
        })
    }

    /// Nearest strike; a spot exactly between two strikes goes to the even multiple.
    pub fn atm_strike(&self, spot: f64) -> f64 {
        (spot / self.strike_step).round_ties_even() * self.strike_step
    }

    /// Candidate strikes for one side, nearest first.
    pub fn candidate_strikes(&self, spot: f64, option_type: OptionType) -> Vec<f64> {
        let atm = self.atm_strike(spot);
        let max_distance = (spot * self.max_distance_pct / 100.0).floor();
        (0..=self.max_steps)
            .map(|k| {
                let offset = k as f64 * self.strike_step;
                match option_type {
                    OptionType::Call => atm + offset,
                    OptionType::Put => atm - offset,
                }
            })
            .filter(|&strike| strike > 0.0 && (strike - spot).abs() <= max_distance)
            .collect()
    }

    fn scan_side(
        &self,
        engine: &GreeksEngine,
        request: &StrikeRequest,
        volatility: f64,
        option_type: OptionType,
    ) -> (Option<StrikeCandidate>, Option<StrikeCandidate>) {
        let mut best: Option<StrikeCandidate> = None;
        let mut alt: Option<StrikeCandidate> = None;

        for strike in self.candidate_strikes(request.spot, option_type) {
            let greeks = engine.calculate(request.spot, strike, request.tau, volatility, option_type);
            let abs_delta = greeks.delta.abs();
            if abs_delta < self.min_delta || abs_delta > self.max_delta {
                continue;
            }

            let distance_pct = ((strike - request.spot) / request.spot).abs() * 100.0;
            let delta_score = 1.0 - (abs_delta - self.target_delta).abs();
            let distance_score = 1.0 - distance_pct / self.max_distance_pct;
            let score = 0.6 * delta_score + 0.4 * distance_score;

            let candidate = StrikeCandidate {
                strike,
                option_type,
                greeks,
                distance_pct,
                score,
                profit_probability: abs_delta * 100.0,
            };

            if best.map_or(true, |b| score > b.score) {
                if best.is_some() {
                    alt = best;
                }
                best = Some(candidate);
            }
        }

        (best, alt)
    }

    fn side_volume(&self, best: Option<&StrikeCandidate>) -> VolumeStatus {
        match best {
            Some(c) if c.distance_pct <= self.liquid_distance_pct => VolumeStatus::Green,
            Some(_) => VolumeStatus::Yellow,
            None => VolumeStatus::Red,
        }
    }

    /// Pick best and alternate strikes for both sides under the flow filter.
    pub fn select(&self, engine: &GreeksEngine, request: &StrikeRequest, flow: &FlowState) -> StrikeRecommendation {
        let volatility = request.volatility();
        let pcr_regime = flow.regime();
        if !(request.spot > 0.0) || !(volatility > 0.0) {
            debug!("Strike selection skipped: spot {} vol {}", request.spot, volatility);
            return StrikeRecommendation::failed(volatility, pcr_regime);
        }

        let (best_call, alt_call) = if flow.can_buy_calls() {
            self.scan_side(engine, request, volatility, OptionType::Call)
        } else {
            (None, None)
        };
        let (best_put, alt_put) = if flow.can_buy_puts() {
            self.scan_side(engine, request, volatility, OptionType::Put)
        } else {
            (None, None)
        };

        let call_volume_status = self.side_volume(best_call.as_ref());
        let put_volume_status = self.side_volume(best_put.as_ref());

        let call_skew = skew(volatility, best_call.is_some());
        let put_skew = skew(volatility, best_put.is_some());
        let skew_favorable = call_skew < -SKEW_FAVORABLE_THRESHOLD || put_skew > SKEW_FAVORABLE_THRESHOLD;

        let both_succeeded = matches!(
            (&best_call, &best_put),
            (Some(c), Some(p)) if c.greeks.calc_status == CalcStatus::Success
                && p.greeks.calc_status == CalcStatus::Success
        );

        StrikeRecommendation {
            atm_strike: self.atm_strike(request.spot),
            best_call,
            alt_call,
            best_put,
            alt_put,
            call_volume_status,
            put_volume_status,
            volume_status: VolumeStatus::combine(call_volume_status, put_volume_status),
            iv_used: volatility,
            call_skew,
            put_skew,
            skew_score: call_skew.max(put_skew),
            skew_favorable,
            greek_status: if both_succeeded {
                GreekStatus::Success
            } else {
                GreekStatus::PartialFailure
            },
            pcr_regime,
        }
    }
}

/// Relative skew of the OTM proxy against ATM. Sides without a pick use ATM
/// volatility and read zero.
fn skew(atm_iv: f64, has_pick: bool) -> f64 {
    if atm_iv <= 0.0 {
        return 0.0;
    }
    let otm_iv = if has_pick { atm_iv * OTM_IV_FACTOR } else { atm_iv };
    (otm_iv - atm_iv) / atm_iv
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn request(spot: f64) -> StrikeRequest {
        StrikeRequest {
            spot,
            tau: 0.125,
            implied_vol: None,
            historical_vol: 0.15,
        }
    }

    #[test]
    fn test_candidate_strikes_respect_distance() {
        let selector = StrikeSelector::default();

        assert_eq!(selector.atm_strike(20140.0), 20100.0);
        assert_eq!(selector.candidate_strikes(20140.0, OptionType::Call), vec![20100.0, 20200.0, 20300.0]);
        assert_eq!(selector.candidate_strikes(20140.0, OptionType::Put), vec![20100.0, 20000.0, 19900.0]);

        // floor(1000 * 2.5%) = 25 leaves only ATM
        assert_eq!(selector.candidate_strikes(1000.0, OptionType::Call), vec![1000.0]);
    }

    #[test]
    fn test_atm_halfway_rounds_to_even_multiple() {
        let selector = StrikeSelector::default();
        assert_eq!(selector.atm_strike(20250.0), 20200.0);
        assert_eq!(selector.atm_strike(20150.0), 20200.0);
        assert_eq!(selector.atm_strike(20350.0), 20400.0);
        assert_eq!(selector.atm_strike(20250.01), 20300.0);
    }

    #[test]
    fn test_alt_is_displaced_best() {
        let selector = StrikeSelector::default();
        let rec = selector.select(&GreeksEngine::default(), &request(20140.0), &FlowState::default());

        let best = rec.best_call.unwrap();
        let alt = rec.alt_call.unwrap();
        assert_eq!(best.strike, 20200.0);
        assert_eq!(alt.strike, 20100.0);
        assert!(best.score > alt.score);

        assert_eq!(rec.best_put.unwrap().strike, 20100.0);
        assert!(rec.alt_put.is_none());

        assert_eq!(rec.volume_status, VolumeStatus::Green);
        assert_eq!(rec.greek_status, GreekStatus::Success);
        assert_relative_eq!(rec.iv_used, 0.15);
        assert_relative_eq!(best.profit_probability, best.greeks.delta.abs() * 100.0);
    }

    #[test]
    fn test_flow_filter_blocks_calls() {
        let selector = StrikeSelector::default();
        let flow = FlowState::new(Some(0.8));
        let rec = selector.select(&GreeksEngine::default(), &request(20140.0), &flow);

        assert!(rec.best_call.is_none());
        assert!(rec.best_put.is_some());
        assert_eq!(rec.call_volume_status, VolumeStatus::Red);
        assert_eq!(rec.volume_status, VolumeStatus::Red);
        assert_eq!(rec.greek_status, GreekStatus::PartialFailure);
        assert_eq!(rec.pcr_regime, PcrRegime::Bearish);
        assert_eq!(rec.call_skew, 0.0);
        assert!(rec.put_skew < 0.0);
    }

    #[test]
    fn test_invalid_inputs_fail() {
        let selector = StrikeSelector::default();
        let engine = GreeksEngine::default();

        let rec = selector.select(&engine, &request(0.0), &FlowState::default());
        assert_eq!(rec.greek_status, GreekStatus::Failed);
        assert_eq!(rec.volume_status, VolumeStatus::Red);

        let mut req = request(20000.0);
        req.historical_vol = 0.0;
        assert_eq!(selector.select(&engine, &req, &FlowState::default()).greek_status, GreekStatus::Failed);
    }

    #[test]
    fn test_implied_vol_preferred_when_positive() {
        let mut req = request(20000.0);
        req.implied_vol = Some(0.22);
        assert_eq!(req.volatility(), 0.22);
        req.implied_vol = Some(0.0);
        assert_eq!(req.volatility(), 0.15);
    }

    #[test]
    fn test_volume_combine() {
        use VolumeStatus::*;
        assert_eq!(VolumeStatus::combine(Green, Green), Green);
        assert_eq!(VolumeStatus::combine(Green, Yellow), Yellow);
        assert_eq!(VolumeStatus::combine(Yellow, Red), Red);
    }

    #[test]
    fn test_new_validates() {
        assert!(StrikeSelector::new(50.0, 2.0, 3).is_ok());
        assert!(StrikeSelector::new(0.0, 2.0, 3).is_err());
        assert!(StrikeSelector::new(50.0, -1.0, 3).is_err());
    }

    proptest! {
        #[test]
        fn prop_best_delta_within_band(
            spot in 500.0f64..60_000.0,
            tau in 0.0f64..1.0,
            vol in 0.0f64..1.0,
            pcr in 0.2f64..1.5,
        ) {
            let selector = StrikeSelector::default();
            let req = StrikeRequest { spot, tau, implied_vol: None, historical_vol: vol };
            let rec = selector.select(&GreeksEngine::default(), &req, &FlowState::new(Some(pcr)));
            for best in [rec.best_call, rec.best_put].into_iter().flatten() {
                let d = best.greeks.delta.abs();
                prop_assert!((0.30..=0.60).contains(&d));
            }
        }
    }
}
