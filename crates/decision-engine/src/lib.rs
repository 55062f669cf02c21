//! Per-instrument decision cycle.
//!
//! Fuses multi-timeframe rank, IV regime, order flow, Greeks-based strike
//! selection, entry/exit confirmation, pyramiding and the daily P&L gate into
//! one [`DecisionRecord`] per instrument per cycle.

pub mod engine;
pub mod models;

pub use engine::DecisionEngine;
pub use models::*;
