use decision_engine::DecisionRecord;
use std::time::Instant;

/// Running counters for the agent, logged through tracing every few cycles.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    pub cycles_run: u64,
    pub instruments_evaluated: u64,
    pub evaluation_errors: u64,
    pub entries_accepted: u64,
    pub entries_gated: u64,
    pub positions_opened: u64,
    pub exits_confirmed: u64,
    pub ladder_changes: u64,
    pub last_cycle_duration_ms: u64,
    log_interval_cycles: u64,
}

impl AgentMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            log_interval_cycles,
            ..Self::default()
        }
    }

    pub fn record_decision(&mut self, record: &DecisionRecord) {
        self.instruments_evaluated += 1;
        match &record.entry {
            Some(entry) if entry.accepted => self.entries_accepted += 1,
            Some(_) => {}
            None => self.entries_gated += 1,
        }
        if record.opened_position {
            self.positions_opened += 1;
        }
        if record.exit.should_exit {
            self.exits_confirmed += 1;
        }
        if record.ladder_action.is_some() {
            self.ladder_changes += 1;
        }
    }

    pub fn record_error(&mut self) {
        self.instruments_evaluated += 1;
        self.evaluation_errors += 1;
    }

    pub fn finish_cycle(&mut self, cycle_start: Instant) {
        self.last_cycle_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;

        if self.log_interval_cycles > 0 && self.cycles_run % self.log_interval_cycles == 0 {
            self.log_metrics();
        }
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            instruments_evaluated = self.instruments_evaluated,
            evaluation_errors = self.evaluation_errors,
            entries_accepted = self.entries_accepted,
            entries_gated = self.entries_gated,
            positions_opened = self.positions_opened,
            exits_confirmed = self.exits_confirmed,
            ladder_changes = self.ladder_changes,
            last_cycle_ms = self.last_cycle_duration_ms,
            "Agent metrics summary"
        );
    }
}
