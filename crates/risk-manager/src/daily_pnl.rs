use crate::models::{DailyPnLState, PnLLimits};
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Realized P&L for the current trading day with walk-away limits.
///
/// State rolls over lazily: the first call that observes a new session date
/// resets the counters. Shared between workers behind an `Arc`.
#[derive(Debug)]
pub struct DailyPnLTracker {
    limits: PnLLimits,
    tz: Tz,
    state: Mutex<DailyPnLState>,
}

impl DailyPnLTracker {
    pub fn new(limits: PnLLimits, tz: Tz) -> Result<Self> {
        if limits.daily_target <= Decimal::ZERO {
            bail!("daily target must be positive, got {}", limits.daily_target);
        }
        if limits.max_daily_loss <= Decimal::ZERO {
            bail!("max daily loss must be positive, got {}", limits.max_daily_loss);
        }

        // MIN until the first call observes a session date
        Ok(Self {
            limits,
            tz,
            state: Mutex::new(DailyPnLState::new(NaiveDate::MIN)),
        })
    }

    pub fn limits(&self) -> PnLLimits {
        self.limits
    }

    fn session_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Advance to `date` if it is a later day. An earlier date is treated as
    /// the current day and never resets it.
    fn roll(state: &mut DailyPnLState, date: NaiveDate) {
        if date > state.date {
            if state.date != NaiveDate::MIN {
                info!(
                    "New trading day {}: previous day closed at {} over {} trades",
                    date, state.realized_pnl, state.trade_count
                );
            }
            *state = DailyPnLState::new(date);
        } else if date < state.date {
            warn!("Stale date {} ignored; trading day is {}", date, state.date);
        }
    }

    /// Book a closed trade against `date` and return the updated day.
    pub fn add_trade_result_on(&self, date: NaiveDate, pnl: Decimal) -> DailyPnLState {
        let mut state = self.state.lock();
        Self::roll(&mut state, date);

        state.realized_pnl += pnl;
        state.trade_count += 1;

        if !state.target_achieved && state.realized_pnl >= self.limits.daily_target {
            state.target_achieved = true;
            info!(
                "Daily target reached: {} >= {} after {} trades",
                state.realized_pnl, self.limits.daily_target, state.trade_count
            );
        }
        if state.realized_pnl <= -self.limits.max_daily_loss {
            warn!(
                "Daily loss limit hit: {} (limit -{})",
                state.realized_pnl, self.limits.max_daily_loss
            );
        }

        state.clone()
    }

    pub fn add_trade_result(&self, now: DateTime<Utc>, pnl: Decimal) -> DailyPnLState {
        self.add_trade_result_on(self.session_date(now), pnl)
    }

    /// New trades are allowed until the target is reached or the loss limit is hit.
    pub fn can_trade_on(&self, date: NaiveDate) -> bool {
        let mut state = self.state.lock();
        Self::roll(&mut state, date);
        !state.target_achieved && state.realized_pnl > -self.limits.max_daily_loss
    }

    pub fn can_trade(&self, now: DateTime<Utc>) -> bool {
        self.can_trade_on(self.session_date(now))
    }

    /// Profit above the daily target, available for opportunistic trades.
    pub fn surplus_for_scalps_on(&self, date: NaiveDate) -> Decimal {
        let mut state = self.state.lock();
        Self::roll(&mut state, date);
        if state.target_achieved {
            (state.realized_pnl - self.limits.daily_target).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }

    pub fn surplus_for_scalps(&self, now: DateTime<Utc>) -> Decimal {
        self.surplus_for_scalps_on(self.session_date(now))
    }

    pub fn snapshot_on(&self, date: NaiveDate) -> DailyPnLState {
        let mut state = self.state.lock();
        Self::roll(&mut state, date);
        state.clone()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DailyPnLState {
        self.snapshot_on(self.session_date(now))
    }
}
