use analysis_core::Bar;
use chrono::{DateTime, Utc};
use market_regime_detector::{FlowSnapshot, IVRankState};
use multi_timeframe::{RankRecord, Timeframe, TimeframeBreakdown};
use options_greeks::{AfternoonWindow, GreeksEngine, SessionClock, StrikeRecommendation, StrikeSelector, TimeToClose};
use risk_manager::{LadderAction, LadderSnapshot, PnLLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use technical_analysis::{IntradayMetrics, Pullback};
use trade_confirmation::{EntryDecision, ExitDecision};

/// Daily log returns used for historical volatility.
pub const HV_PERIOD: usize = 20;

/// OTM/ATM implied-volatility proxy applied to HV when no IV sample arrives.
pub const IV_PROXY_FACTOR: f64 = 0.95;

/// Market inputs for one instrument in one evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentCycle {
    pub symbol: String,
    #[serde(default)]
    pub bars: HashMap<Timeframe, Vec<Bar>>,
    /// Latest implied volatility, annualised fraction
    #[serde(default)]
    pub iv_sample: Option<f64>,
    /// Latest put/call ratio
    #[serde(default)]
    pub pcr_sample: Option<f64>,
    pub evaluated_at: DateTime<Utc>,
}

impl InstrumentCycle {
    /// Most recent close, preferring the finest timeframe that has one.
    pub fn spot(&self) -> Option<f64> {
        Timeframe::all().into_iter().find_map(|tf| {
            self.bars
                .get(&tf)
                .and_then(|bars| bars.last())
                .map(|bar| bar.close)
                .filter(|close| close.is_finite() && *close > 0.0)
        })
    }

    pub fn bars(&self, timeframe: Timeframe) -> &[Bar] {
        self.bars.get(&timeframe).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Everything decided about one instrument in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub symbol: String,
    pub evaluated_at: DateTime<Utc>,
    pub spot: f64,
    pub rank: RankRecord,
    pub timeframes: Vec<TimeframeBreakdown>,
    pub historical_vol: f64,
    pub iv_used: f64,
    pub iv_state: IVRankState,
    pub flow: FlowSnapshot,
    pub strikes: StrikeRecommendation,
    /// Absent when the daily P&L gate is closed
    pub entry: Option<EntryDecision>,
    pub exit: ExitDecision,
    pub time_to_close: TimeToClose,
    pub afternoon_window: AfternoonWindow,
    pub pullback: Pullback,
    pub intraday: Option<IntradayMetrics>,
    pub can_trade_today: bool,
    pub position: Option<LadderSnapshot>,
    /// Ladder change made this cycle, if any
    pub ladder_action: Option<LadderAction>,
    pub opened_position: bool,
}

/// Tunables for [`crate::DecisionEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub greeks: GreeksEngine,
    pub strikes: StrikeSelector,
    pub session: SessionClock,
    pub pnl_limits: PnLLimits,
    pub hv_period: usize,
    pub iv_proxy_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            greeks: GreeksEngine::default(),
            strikes: StrikeSelector::default(),
            session: SessionClock::default(),
            pnl_limits: PnLLimits::default(),
            hv_period: HV_PERIOD,
            iv_proxy_factor: IV_PROXY_FACTOR,
        }
    }
}
