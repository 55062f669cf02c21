use analysis_core::Bias;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Size of every pyramid tranche, in percent of the full position.
pub const TRANCHE_PCT: u32 = 25;
pub const MAX_POSITION_PCT: u32 = 100;

/// Favourable or adverse excursion from the signal price that triggers a
/// ladder change, in percent.
pub const LADDER_TRIGGER_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderEntry {
    pub price: f64,
    pub size_pct: u32,
    /// 1-based position in the ladder
    pub seq: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LadderAction {
    Add,
    Reduce,
}

/// One audited change to a pyramid ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderEvent {
    pub action: LadderAction,
    pub price: f64,
    pub total_size_pct: u32,
    pub avg_entry_price: f64,
    pub move_pct: f64,
}

/// Read-only view of a ladder for decision records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderSnapshot {
    pub signal_price: f64,
    pub bias: Bias,
    pub total_size_pct: u32,
    pub avg_entry_price: f64,
    pub improvement_pct: f64,
    pub entries: Vec<LadderEntry>,
}

/// Walk-away limits for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnLLimits {
    /// Stop opening trades once realized P&L reaches this
    #[serde(default = "default_daily_target")]
    pub daily_target: Decimal,
    /// Stop opening trades once realized loss reaches this (positive amount)
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
}

fn default_daily_target() -> Decimal {
    Decimal::from(100_000)
}

fn default_max_daily_loss() -> Decimal {
    Decimal::from(50_000)
}

impl Default for PnLLimits {
    fn default() -> Self {
        Self {
            daily_target: default_daily_target(),
            max_daily_loss: default_max_daily_loss(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPnLState {
    pub date: NaiveDate,
    pub realized_pnl: Decimal,
    pub trade_count: u32,
    pub target_achieved: bool,
}

impl DailyPnLState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            realized_pnl: Decimal::ZERO,
            trade_count: 0,
            target_achieved: false,
        }
    }
}
