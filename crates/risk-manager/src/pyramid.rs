use crate::models::*;
use analysis_core::{AnalysisError, Bias};
use tracing::{debug, info};

/// Scale-in ladder for one open position.
///
/// Opens with a single 25% tranche at the signal price, adds 25% on each
/// favourable move of at least 2% from the signal price and removes the most
/// recent tranche (LIFO) on an adverse move of at least 2%.
#[derive(Debug, Clone)]
pub struct PyramidLadder {
    signal_price: f64,
    bias: Bias,
    entries: Vec<LadderEntry>,
    total_size_pct: u32,
    avg_entry_price: f64,
    history: Vec<LadderEvent>,
}

impl PyramidLadder {
    pub fn new(signal_price: f64, bias: Bias) -> Result<Self, AnalysisError> {
        if !signal_price.is_finite() || signal_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "signal price must be positive, got {}",
                signal_price
            )));
        }

        info!("Opening {} ladder at {:.2}", bias, signal_price);
        Ok(Self {
            signal_price,
            bias,
            entries: vec![LadderEntry {
                price: signal_price,
                size_pct: TRANCHE_PCT,
                seq: 1,
            }],
            total_size_pct: TRANCHE_PCT,
            avg_entry_price: signal_price,
            history: Vec::new(),
        })
    }

    pub fn signal_price(&self) -> f64 {
        self.signal_price
    }

    pub fn bias(&self) -> Bias {
        self.bias
    }

    pub fn entries(&self) -> &[LadderEntry] {
        &self.entries
    }

    pub fn total_size_pct(&self) -> u32 {
        self.total_size_pct
    }

    pub fn avg_entry_price(&self) -> f64 {
        self.avg_entry_price
    }

    pub fn history(&self) -> &[LadderEvent] {
        &self.history
    }

    /// Percent move from the signal price in the position's favour.
    fn favourable_move_pct(&self, price: f64) -> f64 {
        (price - self.signal_price) / self.signal_price * 100.0 * self.bias.sign()
    }

    /// Add a tranche at `price` if the ladder has room and price has moved
    /// at least 2% in favour. Returns whether the ladder changed.
    pub fn add_entry(&mut self, price: f64) -> bool {
        if self.total_size_pct >= MAX_POSITION_PCT || !price.is_finite() {
            return false;
        }
        let move_pct = self.favourable_move_pct(price);
        if move_pct < LADDER_TRIGGER_PCT {
            return false;
        }

        self.entries.push(LadderEntry {
            price,
            size_pct: TRANCHE_PCT,
            seq: self.entries.len() + 1,
        });
        self.recalculate();
        self.record(LadderAction::Add, price, move_pct);
        debug!("Ladder add at {:.2}: size {}%, avg {:.2}", price, self.total_size_pct, self.avg_entry_price);
        true
    }

    /// Drop the most recent tranche if more than one is held and price has
    /// moved at least 2% against the position. Returns whether the ladder changed.
    pub fn reduce_entry(&mut self, price: f64) -> bool {
        if self.entries.len() <= 1 || !price.is_finite() {
            return false;
        }
        let move_pct = -self.favourable_move_pct(price);
        if move_pct < LADDER_TRIGGER_PCT {
            return false;
        }

        self.entries.pop();
        self.recalculate();
        self.record(LadderAction::Reduce, price, move_pct);
        debug!("Ladder reduce at {:.2}: size {}%, avg {:.2}", price, self.total_size_pct, self.avg_entry_price);
        true
    }

    /// How far the average entry sits better than the signal price, in percent.
    pub fn improvement_pct(&self) -> f64 {
        (self.signal_price - self.avg_entry_price) / self.signal_price * 100.0 * self.bias.sign()
    }

    pub fn snapshot(&self) -> LadderSnapshot {
        LadderSnapshot {
            signal_price: self.signal_price,
            bias: self.bias,
            total_size_pct: self.total_size_pct,
            avg_entry_price: self.avg_entry_price,
            improvement_pct: self.improvement_pct(),
            entries: self.entries.clone(),
        }
    }

    // Recomputed from the remaining entries so add-then-reduce is exact
    fn recalculate(&mut self) {
        self.total_size_pct = self.entries.iter().map(|e| e.size_pct).sum();
        self.avg_entry_price = if self.total_size_pct > 0 {
            let weighted: f64 = self.entries.iter().map(|e| e.price * e.size_pct as f64).sum();
            weighted / self.total_size_pct as f64
        } else {
            self.signal_price
        };
    }

    fn record(&mut self, action: LadderAction, price: f64, move_pct: f64) {
        self.history.push(LadderEvent {
            action,
            price,
            total_size_pct: self.total_size_pct,
            avg_entry_price: self.avg_entry_price,
            move_pct,
        });
    }
}
