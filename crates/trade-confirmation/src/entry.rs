use market_regime_detector::VolatilityRegime;
use serde::{Deserialize, Serialize};
use technical_analysis::IndicatorSnapshot;
use tracing::debug;

/// Rank below which no entry is considered.
pub const MIN_ENTRY_RANK: f64 = 8.0;
pub const RSI_OVERBOUGHT: f64 = 75.0;
pub const RSI_HEALTHY: f64 = 50.0;
pub const ADX_STRONG: f64 = 25.0;

const MACD_REJECT_CONFIDENCE: u32 = 15;
const BASE_CONFIDENCE: u32 = 50;
const PER_CONFIRMATION: u32 = 12;
const PER_BLOCK: u32 = 15;
const MAX_ENTRY_CONFIDENCE: u32 = 98;

/// Everything the entry checks read for one instrument.
#[derive(Debug, Clone, Copy)]
pub struct EntryContext<'a> {
    pub rank_score: f64,
    /// Latest readings on the signal timeframe
    pub snapshot: &'a IndicatorSnapshot,
    pub iv_regime: VolatilityRegime,
    pub in_afternoon_window: bool,
    pub is_pullback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub accepted: bool,
    /// 0-98
    pub confidence: u32,
    pub reason: String,
    /// Number of confirming checks
    pub signals_count: usize,
}

impl EntryDecision {
    fn reject(confidence: u32, reason: String, signals_count: usize) -> Self {
        Self {
            accepted: false,
            confidence,
            reason,
            signals_count,
        }
    }
}

/// Two hard gates (rank, MACD momentum) followed by soft checks that either
/// confirm or block. More than one block rejects the entry.
pub fn confirm_entry(ctx: &EntryContext<'_>) -> EntryDecision {
    let mut confirmations: Vec<&'static str> = Vec::new();
    let mut blocks: Vec<&'static str> = Vec::new();
    let snap = ctx.snapshot;

    if !(ctx.rank_score >= MIN_ENTRY_RANK) {
        return EntryDecision::reject(0, format!("RANK_LOW: {:.2} < {}", ctx.rank_score, MIN_ENTRY_RANK), 0);
    }
    confirmations.push("RANK_GOOD");

    match snap.macd_slope() {
        Some(slope) if slope > 0.0 => confirmations.push("MACD_BUILDING"),
        Some(_) => {
            return EntryDecision::reject(MACD_REJECT_CONFIDENCE, "MACD_NOT_BUILDING".to_string(), confirmations.len());
        }
        None => blocks.push("MACD_ERROR"),
    }

    match (snap.close, snap.ema20) {
        (Some(price), Some(ema)) if price.is_finite() && ema.is_finite() => {
            if price < ema {
                blocks.push("PRICE_NOT_CONF");
            } else {
                confirmations.push("PRICE_CONF");
            }
        }
        _ => blocks.push("PRICE_ERROR"),
    }

    match snap.rsi.filter(|v| v.is_finite()) {
        Some(rsi) if rsi > RSI_OVERBOUGHT => blocks.push("RSI_OVERBOUGHT"),
        Some(rsi) if rsi > RSI_HEALTHY => confirmations.push("RSI_HEALTHY"),
        Some(_) => {}
        None => blocks.push("RSI_ERROR"),
    }

    match snap.adx.filter(|v| v.is_finite()) {
        Some(adx) if adx > ADX_STRONG => confirmations.push("ADX_STRONG"),
        Some(_) => {}
        None => blocks.push("ADX_ERROR"),
    }

    if ctx.in_afternoon_window {
        confirmations.push("AFTERNOON_WINDOW");
    }
    if ctx.is_pullback {
        confirmations.push("PULLBACK_ENTRY");
    }

    match ctx.iv_regime {
        VolatilityRegime::Cheap => confirmations.push("IV_CHEAP"),
        VolatilityRegime::Expensive => blocks.push("IV_EXPENSIVE"),
        VolatilityRegime::Normal => {}
    }

    debug!("Entry checks: confirmations={:?} blocks={:?}", confirmations, blocks);

    if blocks.len() > 1 {
        let penalty = PER_BLOCK.saturating_mul(blocks.len() as u32);
        return EntryDecision::reject(
            BASE_CONFIDENCE.saturating_sub(penalty),
            blocks[..2].join(" | "),
            confirmations.len(),
        );
    }

    EntryDecision {
        accepted: true,
        confidence: (BASE_CONFIDENCE + PER_CONFIRMATION * confirmations.len() as u32).min(MAX_ENTRY_CONFIDENCE),
        reason: confirmations.join(" + "),
        signals_count: confirmations.len(),
    }
}
