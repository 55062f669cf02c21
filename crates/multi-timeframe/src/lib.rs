use analysis_core::{Bar, Bias};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use technical_analysis::{score_bars, IndicatorSnapshot, TimeframeScore};
use tracing::{debug, warn};

/// Scale applied to the net bull/bear total to produce a rank score.
pub const RANK_SCALE: f64 = 15.0;

/// Factor above which a timeframe counts as aligned with a direction.
pub const ALIGNMENT_THRESHOLD: f64 = 0.5;

/// Supported trading timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 5-minute bars
    #[serde(rename = "5min")]
    Min5,
    /// 15-minute bars
    #[serde(rename = "15min")]
    Min15,
    /// 1-hour bars
    #[serde(rename = "1hour")]
    Hour1,
    /// 4-hour bars
    #[serde(rename = "4hour")]
    Hour4,
    /// Daily bars
    #[serde(rename = "daily")]
    Daily,
}

impl Timeframe {
    /// Get the duration represented by one bar
    pub fn to_duration(&self) -> Duration {
        match self {
            Timeframe::Min5 => Duration::minutes(5),
            Timeframe::Min15 => Duration::minutes(15),
            Timeframe::Hour1 => Duration::hours(1),
            Timeframe::Hour4 => Duration::hours(4),
            Timeframe::Daily => Duration::days(1),
        }
    }

    /// Contribution of this timeframe to the bull/bear totals. Sums to 1.
    pub fn weight(&self) -> f64 {
        match self {
            Timeframe::Min5 => 0.10,
            Timeframe::Min15 => 0.20,
            Timeframe::Hour1 => 0.25,
            Timeframe::Hour4 => 0.20,
            Timeframe::Daily => 0.25,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::Min5 => "5min",
            Timeframe::Min15 => "15min",
            Timeframe::Hour1 => "1hour",
            Timeframe::Hour4 => "4hour",
            Timeframe::Daily => "daily",
        }
    }

    /// All available timeframes
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::Min5,
            Timeframe::Min15,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Daily,
        ]
    }
}

/// Position size fraction for a rank score, by magnitude.
pub fn position_multiplier(rank_score: f64) -> f64 {
    let magnitude = rank_score.abs();
    if magnitude >= 14.0 {
        1.0
    } else if magnitude >= 12.0 {
        0.8
    } else if magnitude >= 10.0 {
        0.6
    } else if magnitude >= 8.0 {
        0.4
    } else if magnitude >= 6.0 {
        0.2
    } else {
        0.0
    }
}

/// Signed rank from the weighted totals, clamped to [-15, 15].
pub fn rank_score(bull_total: f64, bear_total: f64) -> f64 {
    let net = bull_total * RANK_SCALE - bear_total * RANK_SCALE;
    if net.is_nan() {
        return 0.0;
    }
    net.clamp(-RANK_SCALE, RANK_SCALE)
}

/// Per-timeframe detail kept alongside the rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeBreakdown {
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub score: TimeframeScore,
}

/// Continuous rank, the position size it maps to, and the dominant trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankRecord {
    pub rank_score: f64,
    pub position_multiplier: f64,
    pub dominant_trend: Bias,
    /// Set when bull and bear totals were exactly equal and the trend
    /// defaulted to bearish.
    pub tie_defaulted_bearish: bool,
    pub bull_total: f64,
    pub bear_total: f64,
    pub trend_strength: f64,
    pub bull_alignment: usize,
    pub bear_alignment: usize,
}

impl RankRecord {
    /// Build the record from already-weighted totals.
    pub fn from_totals(bull_total: f64, bear_total: f64) -> Self {
        let rank = rank_score(bull_total, bear_total);
        Self {
            rank_score: rank,
            position_multiplier: position_multiplier(rank),
            dominant_trend: if bull_total > bear_total {
                Bias::Bullish
            } else {
                Bias::Bearish
            },
            tie_defaulted_bearish: bull_total == bear_total,
            bull_total,
            bear_total,
            trend_strength: (bull_total - bear_total).abs(),
            bull_alignment: 0,
            bear_alignment: 0,
        }
    }
}

/// Scores of every timeframe for one instrument, plus the latest snapshots.
#[derive(Debug, Clone, Default)]
pub struct MultiTimeframeScores {
    pub scores: HashMap<Timeframe, TimeframeScore>,
    pub snapshots: HashMap<Timeframe, IndicatorSnapshot>,
}

impl MultiTimeframeScores {
    pub fn snapshot(&self, timeframe: Timeframe) -> Option<&IndicatorSnapshot> {
        self.snapshots.get(&timeframe)
    }

    pub fn breakdown(&self) -> Vec<TimeframeBreakdown> {
        Timeframe::all()
            .into_iter()
            .map(|tf| TimeframeBreakdown {
                timeframe: tf,
                bar_count: self.snapshots.get(&tf).map(|s| s.bar_count).unwrap_or(0),
                score: self.scores.get(&tf).copied().unwrap_or_default(),
            })
            .collect()
    }
}

/// Multi-timeframe analyzer
#[derive(Debug, Clone, Default)]
pub struct MultiTimeframeAnalyzer;

impl MultiTimeframeAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Score each supplied timeframe. Missing timeframes score 0/0.
    pub fn score_timeframes(&self, data: &HashMap<Timeframe, Vec<Bar>>) -> MultiTimeframeScores {
        let mut result = MultiTimeframeScores::default();

        for timeframe in Timeframe::all() {
            let bars = data.get(&timeframe).map(Vec::as_slice).unwrap_or(&[]);
            let (snapshot, score) = score_bars(bars);
            debug!(
                "{}: {} bars, bull {:.3}, bear {:.3}",
                timeframe.name(),
                bars.len(),
                score.bull_factor,
                score.bear_factor
            );
            result.scores.insert(timeframe, score);
            result.snapshots.insert(timeframe, snapshot);
        }

        result
    }

    /// Fold per-timeframe scores into a rank record.
    pub fn rank(&self, scores: &HashMap<Timeframe, TimeframeScore>) -> RankRecord {
        let mut bull_total = 0.0;
        let mut bear_total = 0.0;
        let mut bull_alignment = 0;
        let mut bear_alignment = 0;

        for timeframe in Timeframe::all() {
            let score = scores.get(&timeframe).copied().unwrap_or_default();
            bull_total += score.bull_factor * timeframe.weight();
            bear_total += score.bear_factor * timeframe.weight();
            if score.bull_factor > ALIGNMENT_THRESHOLD {
                bull_alignment += 1;
            }
            if score.bear_factor > ALIGNMENT_THRESHOLD {
                bear_alignment += 1;
            }
        }

        let mut record = RankRecord::from_totals(bull_total, bear_total);
        record.bull_alignment = bull_alignment;
        record.bear_alignment = bear_alignment;

        if record.tie_defaulted_bearish {
            warn!("Bull and bear totals tied at {:.4}; dominant trend defaulted to BEARISH", bull_total);
        }
        record
    }

    /// Score and rank in one pass.
    pub fn analyze(&self, data: &HashMap<Timeframe, Vec<Bar>>) -> (MultiTimeframeScores, RankRecord) {
        let scores = self.score_timeframes(data);
        let record = self.rank(&scores.scores);
        (scores, record)
    }
}
