// Threshold settings - an explicit value passed into every resolver and
// classifier call. The engine keeps no global or session state; defaults
// live here for callers that want them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::MAX_SIMILARITY_SCORE;

/// Upper bound on `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 50;

/// Caller-supplied thresholds governing a resolve call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum similarity score (0-160 raw points) a candidate must reach.
    pub similarity_threshold: u32,

    /// Minimum store relevance score a candidate must reach.
    pub search_score_threshold: f64,

    /// High-confidence boundary as a percentage of 160.
    pub high_confidence_threshold: u32,

    /// Medium-confidence boundary as a percentage of 160. Must be below the
    /// high boundary.
    pub medium_confidence_threshold: u32,

    /// Maximum duplicate results to return (1-50).
    pub max_results: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            similarity_threshold: 0,
            search_score_threshold: 0.0,
            high_confidence_threshold: 70,
            medium_confidence_threshold: 40,
            max_results: 10,
        }
    }
}

/// A threshold value outside its documented range. Raised before any store
/// call is made; a bad config is never partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("similarity threshold must be between 0 and {MAX_SIMILARITY_SCORE} points, got {0}")]
    SimilarityThresholdOutOfRange(u32),

    #[error("search score threshold must be non-negative, got {0}")]
    SearchScoreThresholdNegative(f64),

    #[error(
        "high confidence threshold ({high}%) must be greater than \
         medium confidence threshold ({medium}%)"
    )]
    ConfidenceThresholdsInverted { high: u32, medium: u32 },

    #[error("max results must be between 1 and {MAX_RESULTS_LIMIT}, got {0}")]
    MaxResultsOutOfRange(usize),
}

impl ThresholdConfig {
    /// Check every range rule, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.similarity_threshold > MAX_SIMILARITY_SCORE {
            return Err(ValidationError::SimilarityThresholdOutOfRange(
                self.similarity_threshold,
            ));
        }

        if self.search_score_threshold < 0.0 || self.search_score_threshold.is_nan() {
            return Err(ValidationError::SearchScoreThresholdNegative(
                self.search_score_threshold,
            ));
        }

        if self.high_confidence_threshold <= self.medium_confidence_threshold {
            return Err(ValidationError::ConfidenceThresholdsInverted {
                high: self.high_confidence_threshold,
                medium: self.medium_confidence_threshold,
            });
        }

        if self.max_results < 1 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(ValidationError::MaxResultsOutOfRange(self.max_results));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ThresholdConfig::default().validate().is_ok());
    }

    #[test]
    fn test_similarity_threshold_range() {
        let settings = ThresholdConfig {
            similarity_threshold: 161,
            ..ThresholdConfig::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ValidationError::SimilarityThresholdOutOfRange(161))
        );

        let at_max = ThresholdConfig {
            similarity_threshold: 160,
            ..ThresholdConfig::default()
        };
        assert!(at_max.validate().is_ok());
    }

    #[test]
    fn test_negative_search_score_rejected() {
        let settings = ThresholdConfig {
            search_score_threshold: -0.5,
            ..ThresholdConfig::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ValidationError::SearchScoreThresholdNegative(_))
        ));
    }

    #[test]
    fn test_inverted_confidence_thresholds_rejected() {
        let settings = ThresholdConfig {
            high_confidence_threshold: 40,
            medium_confidence_threshold: 40,
            ..ThresholdConfig::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ValidationError::ConfidenceThresholdsInverted {
                high: 40,
                medium: 40
            })
        );
    }

    #[test]
    fn test_max_results_range() {
        let zero = ThresholdConfig {
            max_results: 0,
            ..ThresholdConfig::default()
        };
        assert_eq!(
            zero.validate(),
            Err(ValidationError::MaxResultsOutOfRange(0))
        );

        let too_many = ThresholdConfig {
            max_results: 51,
            ..ThresholdConfig::default()
        };
        assert_eq!(
            too_many.validate(),
            Err(ValidationError::MaxResultsOutOfRange(51))
        );

        let at_limit = ThresholdConfig {
            max_results: 50,
            ..ThresholdConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }
}
