use analysis_core::{Bias, ThetaRisk};
use serde::{Deserialize, Serialize};
use technical_analysis::IndicatorSnapshot;
use tracing::debug;

/// Independent exit votes required before closing.
pub const REQUIRED_EXIT_SIGNALS: usize = 2;
pub const ADX_WEAK: f64 = 20.0;
/// Minutes before close at which high theta risk becomes an exit vote.
pub const THETA_CRITICAL_MINUTES: f64 = 30.0;

#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    /// Direction of the position being defended
    pub bias: Bias,
    pub snapshot: &'a IndicatorSnapshot,
    pub minutes_remaining: f64,
    pub theta_risk: ThetaRisk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub should_exit: bool,
    pub confidence: u32,
    pub reason: String,
    pub signals_count: usize,
    pub exit_signals: Vec<String>,
    pub hold_reasons: Vec<String>,
}

/// Votes from SuperTrend, MACD, ADX, price vs EMA-20 and late-session theta.
/// Exits only once at least two agree.
pub fn confirm_exit(ctx: &ExitContext<'_>) -> ExitDecision {
    let mut exits: Vec<&'static str> = Vec::new();
    let mut holds: Vec<&'static str> = Vec::new();
    let snap = ctx.snapshot;

    match snap.supertrend {
        Some(direction) if direction != ctx.bias => exits.push("SUPERTREND_BREAK"),
        Some(_) => holds.push("ST_HOLDING"),
        None => holds.push("ST_UNAVAILABLE"),
    }

    match snap.macd_slope() {
        Some(slope) if slope < 0.0 && ctx.bias == Bias::Bullish => exits.push("MACD_BEARISH"),
        Some(slope) if slope > 0.0 && ctx.bias == Bias::Bearish => exits.push("MACD_BULLISH"),
        Some(_) => holds.push("MACD_HOLDING"),
        None => holds.push("MACD_ERROR"),
    }

    match snap.adx.filter(|v| v.is_finite()) {
        Some(adx) if adx < ADX_WEAK => exits.push("ADX_WEAK"),
        Some(_) => holds.push("ADX_STRONG"),
        None => holds.push("ADX_ERROR"),
    }

    match (snap.close, snap.ema20) {
        (Some(close), Some(ema)) if close.is_finite() && ema.is_finite() => match ctx.bias {
            Bias::Bullish if close < ema => exits.push("PRICE_BELOW_EMA20"),
            Bias::Bearish if close > ema => exits.push("PRICE_ABOVE_EMA20"),
            _ => holds.push("PRICE_HOLDING"),
        },
        _ => holds.push("PRICE_ERROR"),
    }

    if ctx.theta_risk == ThetaRisk::High && ctx.minutes_remaining < THETA_CRITICAL_MINUTES {
        exits.push("THETA_CRITICAL");
    }

    debug!("Exit votes for {}: exits={:?} holds={:?}", ctx.bias, exits, holds);

    let count = exits.len();
    let (should_exit, confidence, reason) = if count >= REQUIRED_EXIT_SIGNALS {
        let mut reason = format!("CONFIRMED: {} + {}", exits[0], exits[1]);
        if count > REQUIRED_EXIT_SIGNALS {
            reason.push_str(&format!(" + {} more", count - REQUIRED_EXIT_SIGNALS));
        }
        (true, (70 + 8 * count as u32).min(95), reason)
    } else if count == 1 {
        (false, 30, format!("SINGLE: {} (need {})", exits[0], REQUIRED_EXIT_SIGNALS))
    } else {
        let shown = holds.len().min(3);
        (false, 5, format!("HOLD: {}", holds[..shown].join(" + ")))
    };

    ExitDecision {
        should_exit,
        confidence,
        reason,
        signals_count: count,
        exit_signals: exits.iter().map(|s| s.to_string()).collect(),
        hold_reasons: holds.iter().map(|s| s.to_string()).collect(),
    }
}
