use analysis_core::{ThetaDecayStage, ThetaRisk};
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Smallest time-to-expiry fraction handed to the pricing model.
pub const MIN_TAU: f64 = 0.001;

/// Time left until the session close, as the pricing model consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeToClose {
    /// Fraction of a day, never below [`MIN_TAU`]
    pub tau: f64,
    pub hours_remaining: f64,
    pub minutes_remaining: f64,
    pub theta_decay_stage: ThetaDecayStage,
    pub theta_risk: ThetaRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfternoonWindow {
    pub in_window: bool,
    /// Zero while inside the window
    pub minutes_until: i64,
}

/// Exchange session calendar for a single timezone.
#[derive(Debug, Clone)]
pub struct SessionClock {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    window_start: NaiveTime,
    window_end: NaiveTime,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for SessionClock {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Asia::Kolkata,
            open: hm(9, 15),
            close: hm(15, 30),
            window_start: hm(13, 30),
            window_end: hm(14, 0),
        }
    }
}

impl SessionClock {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            bail!("session open {} must be before close {}", open, close);
        }
        Ok(Self {
            tz,
            open,
            close,
            ..Self::default()
        })
    }

    /// Override the afternoon entry window.
    pub fn with_afternoon_window(mut self, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start > end {
            bail!("afternoon window start {} is after end {}", start, end);
        }
        self.window_start = start;
        self.window_end = end;
        Ok(self)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Calendar date of `now` in the session timezone.
    pub fn session_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Today's open as a UTC instant.
    pub fn session_open(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.at(self.session_date(now), self.open)
    }

    /// Time to the next session close; rolls to tomorrow once today's has passed.
    pub fn time_to_close(&self, now: DateTime<Utc>) -> TimeToClose {
        let today = self.session_date(now);
        let close = match self.at(today, self.close) {
            Some(close) if now > close => today.succ_opt().and_then(|d| self.at(d, self.close)),
            other => other,
        };

        let hours_remaining = close
            .map(|c| (c - now).num_milliseconds() as f64 / 3_600_000.0)
            .unwrap_or(0.0);

        TimeToClose {
            tau: (hours_remaining / 24.0).max(MIN_TAU),
            hours_remaining,
            minutes_remaining: hours_remaining * 60.0,
            theta_decay_stage: ThetaDecayStage::from_hours_remaining(hours_remaining),
            theta_risk: ThetaRisk::from_hours_remaining(hours_remaining),
        }
    }

    /// Whether `now` falls in the afternoon entry window (both ends
    /// inclusive) and, if not, whole minutes until it next opens.
    pub fn afternoon_window(&self, now: DateTime<Utc>) -> AfternoonWindow {
        let local = now.with_timezone(&self.tz);
        let time = local.time();
        if time >= self.window_start && time <= self.window_end {
            return AfternoonWindow {
                in_window: true,
                minutes_until: 0,
            };
        }

        let today = local.date_naive();
        let day = if time < self.window_start {
            Some(today)
        } else {
            today.succ_opt()
        };
        let minutes_until = day
            .and_then(|d| self.at(d, self.window_start))
            .map(|start| (start - now).num_seconds() / 60)
            .unwrap_or(0);

        AfternoonWindow {
            in_window: false,
            minutes_until,
        }
    }

    /// True between the session open and close, inclusive.
    pub fn is_session_open(&self, now: DateTime<Utc>) -> bool {
        let time = now.with_timezone(&self.tz).time();
        time >= self.open && time <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // 2024-03-04 in IST is UTC+5:30
    fn ist(hour: u32, minute: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2024, 3, 4, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_time_to_close_midday() {
        let clock = SessionClock::default();
        let ttc = clock.time_to_close(ist(12, 30));

        assert_relative_eq!(ttc.hours_remaining, 3.0, epsilon = 1e-9);
        assert_relative_eq!(ttc.tau, 3.0 / 24.0, epsilon = 1e-12);
        assert_relative_eq!(ttc.minutes_remaining, 180.0, epsilon = 1e-9);
        assert_eq!(ttc.theta_decay_stage, ThetaDecayStage::Fast);
        assert_eq!(ttc.theta_risk, ThetaRisk::Medium);
    }

    #[test]
    fn test_time_to_close_rolls_after_close() {
        let clock = SessionClock::default();
        let ttc = clock.time_to_close(ist(16, 30));

        assert_relative_eq!(ttc.hours_remaining, 23.0, epsilon = 1e-9);
        assert_eq!(ttc.theta_decay_stage, ThetaDecayStage::Slow);
        assert_eq!(ttc.theta_risk, ThetaRisk::Low);
    }

    #[test]
    fn test_tau_floor_at_close() {
        let clock = SessionClock::default();
        let ttc = clock.time_to_close(ist(15, 30));

        assert_eq!(ttc.hours_remaining, 0.0);
        assert_eq!(ttc.tau, MIN_TAU);
        assert_eq!(ttc.theta_risk, ThetaRisk::High);
    }

    #[test]
    fn test_afternoon_window() {
        let clock = SessionClock::default();

        assert_eq!(
            clock.afternoon_window(ist(13, 45)),
            AfternoonWindow { in_window: true, minutes_until: 0 }
        );
        assert!(clock.afternoon_window(ist(14, 0)).in_window);

        let before = clock.afternoon_window(ist(12, 0));
        assert!(!before.in_window);
        assert_eq!(before.minutes_until, 90);

        let after = clock.afternoon_window(ist(15, 0));
        assert_eq!(after.minutes_until, 22 * 60 + 30);
    }

    #[test]
    fn test_session_open_and_date() {
        let clock = SessionClock::default();
        let now = ist(10, 0);

        assert_eq!(clock.session_open(now), Some(ist(9, 15)));
        assert_eq!(clock.session_date(now), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert!(clock.is_session_open(now));
        assert!(!clock.is_session_open(ist(8, 0)));
    }

    #[test]
    fn test_new_rejects_inverted_session() {
        assert!(SessionClock::new(chrono_tz::Asia::Kolkata, hm(15, 30), hm(9, 15)).is_err());
        assert!(SessionClock::new(chrono_tz::US::Eastern, hm(9, 30), hm(16, 0)).is_ok());
    }
}
