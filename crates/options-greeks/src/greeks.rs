//! Closed-form Black-Scholes Greeks for short-dated options.
//!
//! Time to expiry is a fraction of a day (`tau`), as produced by
//! [`SessionClock::time_to_close`](crate::SessionClock::time_to_close). Theta
//! is reported per unit of `tau` without further day-count scaling, so it is
//! comparable across strikes within one cycle but not a per-calendar-day figure.
//!
//! Inputs outside the model's domain return documented fallback values tagged
//! [`CalcStatus::EdgeCase`]; a non-finite result is tagged [`CalcStatus::Error`].

use crate::session::MIN_TAU;
use analysis_core::{CalcStatus, OptionType};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::debug;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.06;

/// Volatility below which the model is not evaluated.
pub const MIN_MODEL_VOLATILITY: f64 = 0.01;

const FALLBACK_DELTA: f64 = 0.5;
const FALLBACK_GAMMA: f64 = 0.01;
const FALLBACK_THETA: f64 = -0.05;
const FALLBACK_VEGA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreeksResult {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub calc_status: CalcStatus,
}

impl GreeksResult {
    pub fn fallback(option_type: OptionType, calc_status: CalcStatus) -> Self {
        let delta = match option_type {
            OptionType::Call => FALLBACK_DELTA,
            OptionType::Put => -FALLBACK_DELTA,
        };
        Self {
            delta,
            gamma: FALLBACK_GAMMA,
            theta: FALLBACK_THETA,
            vega: FALLBACK_VEGA,
            calc_status,
        }
    }

    fn is_finite(&self) -> bool {
        self.delta.is_finite() && self.gamma.is_finite() && self.theta.is_finite() && self.vega.is_finite()
    }
}

/// Black-Scholes Greeks calculator at a fixed risk-free rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GreeksEngine {
    pub risk_free_rate: f64,
}

impl Default for GreeksEngine {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

impl GreeksEngine {
    pub fn new(risk_free_rate: f64) -> Result<Self> {
        if !risk_free_rate.is_finite() || !(-0.5..=1.0).contains(&risk_free_rate) {
            bail!("risk_free_rate must be a finite rate between -0.5 and 1.0");
        }
        Ok(Self { risk_free_rate })
    }

    /// Delta, gamma, theta and vega for one contract.
    pub fn calculate(
        &self,
        spot: f64,
        strike: f64,
        tau: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> GreeksResult {
        // Negated comparisons so NaN inputs also fall back
        if !(tau >= MIN_TAU) || !(volatility >= MIN_MODEL_VOLATILITY) || !(spot > 0.0) || !(strike > 0.0) {
            debug!(
                "Greeks edge case: S={} K={} tau={} vol={}",
                spot, strike, tau, volatility
            );
            return GreeksResult::fallback(option_type, CalcStatus::EdgeCase);
        }

        let normal = Normal::standard();
        let r = self.risk_free_rate;
        let sqrt_tau = tau.sqrt();
        let d1 = ((spot / strike).ln() + (r + 0.5 * volatility * volatility) * tau) / (volatility * sqrt_tau);
        let d2 = d1 - volatility * sqrt_tau;
        let pdf_d1 = normal.pdf(d1);
        let discounted_strike = r * strike * (-r * tau).exp();

        let decay = -spot * pdf_d1 * volatility / (2.0 * sqrt_tau);
        let (delta, theta) = match option_type {
            OptionType::Call => (
                normal.cdf(d1).clamp(0.0, 1.0),
                decay - discounted_strike * normal.cdf(d2),
            ),
            OptionType::Put => (
                (normal.cdf(d1) - 1.0).clamp(-1.0, 0.0),
                decay + discounted_strike * normal.cdf(-d2),
            ),
        };

        let result = GreeksResult {
            delta,
            gamma: (pdf_d1 / (spot * volatility * sqrt_tau)).max(0.0),
            theta,
            vega: (spot * pdf_d1 * sqrt_tau / 100.0).max(0.0),
            calc_status: CalcStatus::Success,
        };

        if result.is_finite() {
            result
        } else {
            debug!("Greeks produced non-finite output for S={} K={}", spot, strike);
            GreeksResult::fallback(option_type, CalcStatus::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_scenario_atm_call_delta() {
        let engine = GreeksEngine::default();
        let g = engine.calculate(1000.0, 1000.0, 0.02, 0.20, OptionType::Call);

        assert_eq!(g.calc_status, CalcStatus::Success);
        assert!(g.delta > 0.49 && g.delta < 0.53, "delta {}", g.delta);
        assert!(g.gamma > 0.0);
        assert!(g.vega > 0.0);
        assert!(g.theta < 0.0);
    }

    #[test]
    fn test_edge_cases_use_fallbacks() {
        let engine = GreeksEngine::default();

        let g = engine.calculate(1000.0, 1000.0, 0.0005, 0.2, OptionType::Put);
        assert_eq!(g, GreeksResult::fallback(OptionType::Put, CalcStatus::EdgeCase));
        assert_eq!(g.delta, -0.5);

        let g = engine.calculate(1000.0, 1000.0, 0.02, 0.005, OptionType::Call);
        assert_eq!(g.calc_status, CalcStatus::EdgeCase);
        assert_eq!(g.delta, 0.5);
        assert_eq!(g.gamma, 0.01);
        assert_eq!(g.theta, -0.05);
        assert_eq!(g.vega, 0.1);

        assert_eq!(engine.calculate(0.0, 1000.0, 0.02, 0.2, OptionType::Call).calc_status, CalcStatus::EdgeCase);
        assert_eq!(engine.calculate(1000.0, -5.0, 0.02, 0.2, OptionType::Call).calc_status, CalcStatus::EdgeCase);
        assert_eq!(engine.calculate(f64::NAN, 1000.0, 0.02, 0.2, OptionType::Call).calc_status, CalcStatus::EdgeCase);
    }

    #[test]
    fn test_non_finite_output_is_error() {
        let engine = GreeksEngine::default();
        let g = engine.calculate(f64::INFINITY, 1000.0, 0.02, 0.2, OptionType::Call);
        assert_eq!(g.calc_status, CalcStatus::Error);
        assert_eq!(g.delta, 0.5);
    }

    #[test]
    fn test_deep_itm_call_and_put() {
        let engine = GreeksEngine::default();
        let call = engine.calculate(1200.0, 1000.0, 0.02, 0.2, OptionType::Call);
        let put = engine.calculate(1200.0, 1000.0, 0.02, 0.2, OptionType::Put);

        assert_relative_eq!(call.delta, 1.0, epsilon = 1e-6);
        assert_relative_eq!(put.delta, 0.0, epsilon = 1e-6);
        assert_relative_eq!(call.gamma, put.gamma);
        assert_relative_eq!(call.vega, put.vega);
    }

    #[test]
    fn test_new_validates_rate() {
        assert!(GreeksEngine::new(0.065).is_ok());
        assert!(GreeksEngine::new(f64::NAN).is_err());
        assert!(GreeksEngine::new(3.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_call_minus_put_delta_is_one(
            spot in 100.0f64..50_000.0,
            moneyness in 0.8f64..1.2,
            tau in 0.001f64..1.0,
            vol in 0.01f64..1.5,
        ) {
            let engine = GreeksEngine::default();
            let strike = spot * moneyness;
            let call = engine.calculate(spot, strike, tau, vol, OptionType::Call);
            let put = engine.calculate(spot, strike, tau, vol, OptionType::Put);

            prop_assert_eq!(call.calc_status, CalcStatus::Success);
            prop_assert!((call.delta - put.delta - 1.0).abs() < 1e-9);
            prop_assert!((0.0..=1.0).contains(&call.delta));
            prop_assert!((-1.0..=0.0).contains(&put.delta));
            prop_assert!(call.gamma >= 0.0 && call.vega >= 0.0);
        }
    }
}
