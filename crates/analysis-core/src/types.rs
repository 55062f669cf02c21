use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar is well-formed when both open and close sit inside [low, high].
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open && self.open <= self.high && self.low <= self.close && self.close <= self.high
    }
}

/// Directional bias of a signal, a trend or an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl Bias {
    pub fn opposite(&self) -> Self {
        match self {
            Bias::Bullish => Bias::Bearish,
            Bias::Bearish => Bias::Bullish,
        }
    }

    /// +1.0 for bullish, -1.0 for bearish
    pub fn sign(&self) -> f64 {
        match self {
            Bias::Bullish => 1.0,
            Bias::Bearish => -1.0,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionType {
    Call,
    Put,
}

/// Outcome tag attached to every numeric result that may have fallen back
/// to documented constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalcStatus {
    Success,
    EdgeCase,
    Error,
}

impl CalcStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CalcStatus::Success)
    }
}

/// How fast time value is eroding given the hours left in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThetaDecayStage {
    Slow,
    Normal,
    Fast,
}

impl ThetaDecayStage {
    pub fn from_hours_remaining(hours: f64) -> Self {
        if hours > 6.0 {
            ThetaDecayStage::Slow
        } else if hours > 3.0 {
            ThetaDecayStage::Normal
        } else {
            ThetaDecayStage::Fast
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThetaRisk {
    Low,
    Medium,
    High,
}

impl ThetaRisk {
    pub fn from_hours_remaining(hours: f64) -> Self {
        if hours > 6.0 {
            ThetaRisk::Low
        } else if hours > 2.0 {
            ThetaRisk::Medium
        } else {
            ThetaRisk::High
        }
    }
}
