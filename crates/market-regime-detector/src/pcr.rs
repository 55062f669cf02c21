use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PCR: f64 = 0.65;

/// Put-call ratio sentiment bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PcrRegime {
    BullishExtreme,
    Bullish,
    Neutral,
    Bearish,
    BearishExtreme,
}

impl PcrRegime {
    pub fn from_pcr(pcr: f64) -> Self {
        if pcr < 0.5 {
            PcrRegime::BullishExtreme
        } else if pcr < 0.65 {
            PcrRegime::Bullish
        } else if pcr < 0.75 {
            PcrRegime::Neutral
        } else if pcr < 1.0 {
            PcrRegime::Bearish
        } else {
            PcrRegime::BearishExtreme
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PcrRegime::BullishExtreme => "BULLISH_EXTREME",
            PcrRegime::Bullish => "BULLISH",
            PcrRegime::Neutral => "NEUTRAL",
            PcrRegime::Bearish => "BEARISH",
            PcrRegime::BearishExtreme => "BEARISH_EXTREME",
        }
    }
}

/// Order-flow filter driven by the latest put-call ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pcr_value: f64,
}

impl Default for FlowState {
    fn default() -> Self {
        Self { pcr_value: DEFAULT_PCR }
    }
}

impl FlowState {
    /// Starts from the given ratio when it is usable, otherwise the default.
    pub fn new(pcr_value: Option<f64>) -> Self {
        let mut state = Self::default();
        if let Some(pcr) = pcr_value {
            state.update(pcr);
        }
        state
    }

    pub fn pcr_value(&self) -> f64 {
        self.pcr_value
    }

    /// Replace the ratio. Non-positive or non-finite values are ignored.
    pub fn update(&mut self, pcr_value: f64) -> bool {
        if !pcr_value.is_finite() || pcr_value <= 0.0 {
            debug!("Ignoring PCR sample {}", pcr_value);
            return false;
        }
        self.pcr_value = pcr_value;
        true
    }

    /// Heavy put buying already priced in above 0.7
    pub fn can_buy_calls(&self) -> bool {
        self.pcr_value < 0.7
    }

    /// Heavy call buying already priced in below 0.5
    pub fn can_buy_puts(&self) -> bool {
        self.pcr_value > 0.5
    }

    pub fn regime(&self) -> PcrRegime {
        PcrRegime::from_pcr(self.pcr_value)
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            pcr_value: self.pcr_value,
            regime: self.regime(),
            can_buy_calls: self.can_buy_calls(),
            can_buy_puts: self.can_buy_puts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub pcr_value: f64,
    pub regime: PcrRegime,
    pub can_buy_calls: bool,
    pub can_buy_puts: bool,
}
