use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use decision_engine::EngineConfig;
use options_greeks::{GreeksEngine, SessionClock, StrikeSelector};
use risk_manager::PnLLimits;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Pricing
    pub risk_free_rate: f64,

    // Strike ladder
    pub strike_step: f64,
    pub max_strike_distance_pct: f64,
    pub max_strike_steps: usize,

    // Daily walk-away limits
    pub daily_profit_target: Decimal,
    pub max_daily_loss: Decimal,

    // Session calendar
    pub session_timezone: Tz,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,

    // I/O
    pub cycle_input: PathBuf,
    /// 0 runs a single cycle and exits
    pub cycle_interval_seconds: u64,
    pub metrics_log_interval_cycles: u64,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {}: {:?}", key, raw))
}

fn time_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<NaiveTime> {
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").with_context(|| format!("invalid {} (expected HH:MM): {:?}", key, raw))
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let tz_name = lookup("SESSION_TIMEZONE").unwrap_or_else(|| "Asia/Kolkata".to_string());
        let session_timezone: Tz = tz_name
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SESSION_TIMEZONE {:?}: {}", tz_name, e))?;

        let config = Self {
            risk_free_rate: parse_or(&lookup, "RISK_FREE_RATE", "0.06")?,

            strike_step: parse_or(&lookup, "STRIKE_STEP", "100")?,
            max_strike_distance_pct: parse_or(&lookup, "MAX_STRIKE_DISTANCE_PCT", "2.5")?,
            max_strike_steps: parse_or(&lookup, "MAX_STRIKE_STEPS", "2")?,

            daily_profit_target: parse_or(&lookup, "DAILY_PROFIT_TARGET", "100000")?,
            max_daily_loss: parse_or(&lookup, "MAX_DAILY_LOSS", "50000")?,

            session_timezone,
            session_open: time_or(&lookup, "SESSION_OPEN", "09:15")?,
            session_close: time_or(&lookup, "SESSION_CLOSE", "15:30")?,

            cycle_input: lookup("CYCLE_INPUT")
                .map(PathBuf::from)
                .context("CYCLE_INPUT not set")?,
            cycle_interval_seconds: parse_or(&lookup, "CYCLE_INTERVAL_SECONDS", "0")?,
            metrics_log_interval_cycles: parse_or(&lookup, "METRICS_LOG_INTERVAL_CYCLES", "12")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.daily_profit_target <= Decimal::ZERO {
            bail!("DAILY_PROFIT_TARGET must be positive");
        }
        if self.max_daily_loss <= Decimal::ZERO {
            bail!("MAX_DAILY_LOSS must be positive");
        }
        if self.session_open >= self.session_close {
            bail!("SESSION_OPEN must be before SESSION_CLOSE");
        }
        Ok(())
    }

    /// Build validated engine parameters from this configuration.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            greeks: GreeksEngine::new(self.risk_free_rate).context("RISK_FREE_RATE")?,
            strikes: StrikeSelector::new(self.strike_step, self.max_strike_distance_pct, self.max_strike_steps)
                .context("strike ladder settings")?,
            session: SessionClock::new(self.session_timezone, self.session_open, self.session_close)
                .context("session settings")?,
            pnl_limits: PnLLimits {
                daily_target: self.daily_profit_target,
                max_daily_loss: self.max_daily_loss,
            },
            ..EngineConfig::default()
        })
    }
}
