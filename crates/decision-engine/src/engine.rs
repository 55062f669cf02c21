use crate::models::*;
use analysis_core::{AnalysisError, Bias};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use market_regime_detector::{FlowState, IVRankState, VolatilityHistory};
use multi_timeframe::{MultiTimeframeAnalyzer, Timeframe};
use options_greeks::StrikeRequest;
use rayon::prelude::*;
use risk_manager::{DailyPnLState, DailyPnLTracker, LadderAction, LadderSnapshot, PyramidLadder};
use rust_decimal::Decimal;
use std::sync::Arc;
use technical_analysis::{historical_volatility, intraday_metrics, pullback, rolling_volatility, IndicatorSnapshot};
use trade_confirmation::{confirm_entry, confirm_exit, EntryContext, ExitContext};

/// Runs one decision cycle per instrument and owns the state that outlives
/// a cycle: IV history and open ladders per symbol, and the shared daily P&L.
pub struct DecisionEngine {
    config: EngineConfig,
    analyzer: MultiTimeframeAnalyzer,
    iv_history: DashMap<String, VolatilityHistory>,
    ladders: DashMap<String, PyramidLadder>,
    pnl: Arc<DailyPnLTracker>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let pnl = DailyPnLTracker::new(config.pnl_limits, config.session.timezone())?;
        Ok(Self::with_pnl_tracker(config, Arc::new(pnl)))
    }

    /// Share an existing P&L tracker, e.g. with the component booking fills.
    pub fn with_pnl_tracker(config: EngineConfig, pnl: Arc<DailyPnLTracker>) -> Self {
        Self {
            config,
            analyzer: MultiTimeframeAnalyzer::new(),
            iv_history: DashMap::new(),
            ladders: DashMap::new(),
            pnl,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pnl_tracker(&self) -> Arc<DailyPnLTracker> {
        Arc::clone(&self.pnl)
    }

    /// Evaluate a batch of instruments in parallel.
    pub fn evaluate_all(&self, cycles: &[InstrumentCycle]) -> Vec<(String, Result<DecisionRecord, AnalysisError>)> {
        cycles
            .par_iter()
            .map(|cycle| (cycle.symbol.clone(), self.evaluate(cycle)))
            .collect()
    }

    /// Run every stage for one instrument and update its ladder.
    pub fn evaluate(&self, cycle: &InstrumentCycle) -> Result<DecisionRecord, AnalysisError> {
        let now = cycle.evaluated_at;
        let spot = cycle.spot().ok_or_else(|| {
            AnalysisError::InsufficientData(format!("no usable price for {}", cycle.symbol))
        })?;

        tracing::debug!("Evaluating {} at {:.2}", cycle.symbol, spot);

        let (scores, rank) = self.analyzer.analyze(&cycle.bars);

        let daily_closes: Vec<f64> = cycle.bars(Timeframe::Daily).iter().map(|b| b.close).collect();
        let historical_vol = historical_volatility(&daily_closes, self.config.hv_period);
        let iv_used = match cycle.iv_sample {
            Some(iv) if iv > 0.0 && iv.is_finite() => iv,
            _ => historical_vol * self.config.iv_proxy_factor,
        };
        let iv_state = self.update_iv_history(cycle, &daily_closes, iv_used, now);

        let flow = FlowState::new(cycle.pcr_sample);
        let time_to_close = self.config.session.time_to_close(now);
        let afternoon_window = self.config.session.afternoon_window(now);

        let strikes = self.config.strikes.select(
            &self.config.greeks,
            &StrikeRequest {
                spot,
                tau: time_to_close.tau,
                implied_vol: Some(iv_used),
                historical_vol,
            },
            &flow,
        );

        // Entry and exit read the daily frame; 5-minute bars drive timing only.
        let signal = scores
            .snapshot(Timeframe::Daily)
            .cloned()
            .unwrap_or_else(IndicatorSnapshot::default);
        let execution_bars = cycle.bars(Timeframe::Min5);
        let pullback = pullback(execution_bars);
        let intraday = self
            .config
            .session
            .session_open(now)
            .map(|open| intraday_metrics(execution_bars, open, now));

        let can_trade_today = self.pnl.can_trade(now);
        let entry = if can_trade_today {
            Some(confirm_entry(&EntryContext {
                rank_score: rank.rank_score,
                snapshot: &signal,
                iv_regime: iv_state.regime,
                in_afternoon_window: afternoon_window.in_window,
                is_pullback: pullback.is_pullback,
            }))
        } else {
            tracing::debug!("{}: daily P&L gate closed, skipping entry checks", cycle.symbol);
            None
        };

        let mut ladder_action = None;
        let mut opened_position = false;
        let position_bias = self
            .ladders
            .get(&cycle.symbol)
            .map(|ladder| ladder.bias())
            .unwrap_or(rank.dominant_trend);

        let exit = confirm_exit(&ExitContext {
            bias: position_bias,
            snapshot: &signal,
            minutes_remaining: time_to_close.minutes_remaining,
            theta_risk: time_to_close.theta_risk,
        });

        if let Some(mut ladder) = self.ladders.get_mut(&cycle.symbol) {
            if !exit.should_exit {
                if ladder.add_entry(spot) {
                    ladder_action = Some(LadderAction::Add);
                } else if ladder.reduce_entry(spot) {
                    ladder_action = Some(LadderAction::Reduce);
                }
            }
        } else if entry.as_ref().map_or(false, |e| e.accepted) {
            let ladder = PyramidLadder::new(spot, rank.dominant_trend)?;
            self.ladders.insert(cycle.symbol.clone(), ladder);
            opened_position = true;
            tracing::info!(
                "{}: entry accepted at {:.2} ({}), rank {:.2}",
                cycle.symbol,
                spot,
                rank.dominant_trend,
                rank.rank_score
            );
        }

        if exit.should_exit {
            tracing::info!("{}: exit confirmed ({})", cycle.symbol, exit.reason);
        }

        let position = self.ladders.get(&cycle.symbol).map(|ladder| ladder.snapshot());

        Ok(DecisionRecord {
            symbol: cycle.symbol.clone(),
            evaluated_at: now,
            spot,
            timeframes: scores.breakdown(),
            rank,
            historical_vol,
            iv_used,
            iv_state,
            flow: flow.snapshot(),
            strikes,
            entry,
            exit,
            time_to_close,
            afternoon_window,
            pullback,
            intraday,
            can_trade_today,
            position,
            ladder_action,
            opened_position,
        })
    }

    /// Seed an empty history from rolling HV of the daily closes, rank the
    /// current reading, then store it once per session date.
    fn update_iv_history(
        &self,
        cycle: &InstrumentCycle,
        daily_closes: &[f64],
        current_iv: f64,
        now: DateTime<Utc>,
    ) -> IVRankState {
        let mut history = self.iv_history.entry(cycle.symbol.clone()).or_default();

        if history.is_empty() {
            let dates = cycle.bars(Timeframe::Daily).iter().map(|b| b.timestamp.date_naive());
            let rolling = rolling_volatility(daily_closes, self.config.hv_period);
            let seeded = history.seed(dates.zip(rolling));
            tracing::debug!("{}: seeded IV history with {} readings", cycle.symbol, seeded);
        }

        let state = history.evaluate(current_iv);

        let today = self.config.session.session_date(now);
        if history.samples().last().map(|s| s.date) != Some(today) {
            history.add_iv_datapoint(today, current_iv);
        }

        state
    }

    /// Forget the ladder for `symbol` once the position is flat.
    pub fn close_position(&self, symbol: &str) -> Option<LadderSnapshot> {
        self.ladders.remove(symbol).map(|(_, ladder)| {
            tracing::info!("{}: position closed at {}% size", symbol, ladder.total_size_pct());
            ladder.snapshot()
        })
    }

    pub fn position(&self, symbol: &str) -> Option<LadderSnapshot> {
        self.ladders.get(symbol).map(|ladder| ladder.snapshot())
    }

    pub fn open_positions(&self) -> Vec<(String, Bias)> {
        self.ladders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().bias()))
            .collect()
    }

    pub fn iv_history_len(&self, symbol: &str) -> usize {
        self.iv_history.get(symbol).map_or(0, |h| h.len())
    }

    /// Book a closed trade against the session day containing `now`.
    pub fn record_trade_result(&self, now: DateTime<Utc>, pnl: Decimal) -> DailyPnLState {
        self.pnl.add_trade_result(now, pnl)
    }
}
