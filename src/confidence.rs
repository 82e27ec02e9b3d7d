// Confidence Classifier - translate a raw similarity score into the
// business-facing confidence tier agents act on.

use serde::{Deserialize, Serialize};

use crate::scoring::MAX_SIMILARITY_SCORE;
use crate::settings::ThresholdConfig;

/// Stable machine-readable tier tag. The string form doubles as the UI
/// styling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "High Confidence",
            ConfidenceTier::Medium => "Possible Match",
            ConfidenceTier::Low => "Worth Reviewing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "Very likely duplicate - immediate merge candidate",
            ConfidenceTier::Medium => "Potential duplicate - agent review recommended",
            ConfidenceTier::Low => "Some similarity detected - manual investigation needed",
        }
    }
}

/// Confidence assessment attached to every scored duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub tier: ConfidenceTier,
    pub level: String,
    pub description: String,
}

impl Confidence {
    fn from_tier(tier: ConfidenceTier) -> Self {
        Confidence {
            tier,
            level: tier.level().to_string(),
            description: tier.description().to_string(),
        }
    }
}

/// Classify a 0-160 similarity score against the caller's thresholds.
///
/// The score is converted to a percentage of 160 and compared with
/// strictly-greater semantics: a score sitting exactly on a threshold falls
/// into the lower tier.
pub fn classify(score: u32, settings: &ThresholdConfig) -> Confidence {
    let percentage = score_percentage(score);

    let tier = if percentage > settings.high_confidence_threshold as f64 {
        ConfidenceTier::High
    } else if percentage > settings.medium_confidence_threshold as f64 {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    };

    Confidence::from_tier(tier)
}

/// Score as a percentage of the 160-point maximum.
pub fn score_percentage(score: u32) -> f64 {
    (score as f64 / MAX_SIMILARITY_SCORE as f64) * 100.0
}
