//! Voice feature comparison.
//!
//! Compares a registered voice against the voice captured during a session.
//! Each metric contributes `1 / (1 + |a - b|)`, so the comparison is
//! symmetric in its arguments.

use crate::collector::types::VoiceMetrics;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Minimum weighted similarity for two voices to match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

const STRENGTH_WEIGHT: f64 = 0.4;
const CLARITY_WEIGHT: f64 = 0.3;
const PITCH_WEIGHT: f64 = 0.3;

/// Per-metric similarity, each in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSimilarity {
    pub voice_similarity: f64,
    pub clarity_similarity: f64,
    pub pitch_similarity: f64,
}

/// Outcome of comparing two voices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Weighted similarity in (0, 1]
    pub confidence: f64,
    pub details: FieldSimilarity,
}

/// Voice comparator with a fixed match threshold.
#[derive(Debug, Clone, Copy)]
pub struct VoiceComparator {
    threshold: f64,
}

impl Default for VoiceComparator {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl VoiceComparator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Compare two voices.
    ///
    /// Returns [`AnalysisError::InvalidFeatures`] if either side carries a
    /// non-finite metric.
    pub fn compare(
        &self,
        a: &VoiceMetrics,
        b: &VoiceMetrics,
    ) -> Result<ComparisonResult, AnalysisError> {
        validate(a, "first")?;
        validate(b, "second")?;

        let details = FieldSimilarity {
            voice_similarity: similarity(a.strength, b.strength),
            clarity_similarity: similarity(a.clarity, b.clarity),
            pitch_similarity: similarity(a.pitch_stability, b.pitch_stability),
        };

        let confidence = details.voice_similarity * STRENGTH_WEIGHT
            + details.clarity_similarity * CLARITY_WEIGHT
            + details.pitch_similarity * PITCH_WEIGHT;

        Ok(ComparisonResult {
            is_match: confidence >= self.threshold,
            confidence,
            details,
        })
    }

    /// Compare optional voices, as handed over by a caller that may not have
    /// both recordings.
    pub fn compare_optional(
        &self,
        a: Option<&VoiceMetrics>,
        b: Option<&VoiceMetrics>,
    ) -> Result<ComparisonResult, AnalysisError> {
        match (a, b) {
            (Some(a), Some(b)) => self.compare(a, b),
            _ => Err(AnalysisError::InvalidFeatures(
                "both voice feature sets are required for comparison".to_string(),
            )),
        }
    }
}

fn similarity(x: f64, y: f64) -> f64 {
    1.0 / (1.0 + (x - y).abs())
}

fn validate(metrics: &VoiceMetrics, which: &str) -> Result<(), AnalysisError> {
    let finite = metrics.strength.is_finite()
        && metrics.clarity.is_finite()
        && metrics.pitch_stability.is_finite();
    if finite {
        Ok(())
    } else {
        Err(AnalysisError::InvalidFeatures(format!(
            "{which} voice has non-finite metrics"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(strength: f64, clarity: f64, pitch_stability: f64) -> VoiceMetrics {
        VoiceMetrics {
            strength,
            clarity,
            pitch_stability,
        }
    }

    #[test]
    fn test_identical_voices_match() {
        let v = voice(0.5, 20.0, 300.0);
        let result = VoiceComparator::default().compare(&v, &v).unwrap();
        assert_eq!(result.confidence, 1.0);
        assert!(result.is_match);
        assert_eq!(result.details.voice_similarity, 1.0);
    }

    #[test]
    fn test_weighted_confidence() {
        let a = voice(0.0, 0.0, 0.0);
        let b = voice(1.0, 3.0, 0.0);
        let result = VoiceComparator::default().compare(&a, &b).unwrap();

        assert_eq!(result.details.voice_similarity, 0.5);
        assert_eq!(result.details.clarity_similarity, 0.25);
        assert_eq!(result.details.pitch_similarity, 1.0);
        // 0.5*0.4 + 0.25*0.3 + 1.0*0.3
        assert!((result.confidence - 0.575).abs() < 1e-12);
        assert!(!result.is_match);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let a = voice(0.0, 0.0, 0.0);
        let b = voice(1.0, 0.0, 0.0);
        // 0.5*0.4 + 0.3 + 0.3 = 0.8
        let result = VoiceComparator::new(0.8).compare(&a, &b).unwrap();
        assert!(result.is_match);
    }

    #[test]
    fn test_comparison_is_symmetric() {
        let pairs = [
            (voice(0.1, 22.0, 310.0), voice(0.4, 19.5, 280.0)),
            (voice(-3.0, 0.0, 1e6), voice(7.5, 0.001, 2.0)),
            (voice(0.0, 0.0, 0.0), voice(0.0, 0.0, 0.0)),
            (voice(1e-9, 5.5, 42.0), voice(1e9, -5.5, 41.0)),
        ];
        let comparator = VoiceComparator::default();

        for (a, b) in pairs {
            let ab = comparator.compare(&a, &b).unwrap();
            let ba = comparator.compare(&b, &a).unwrap();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let a = voice(f64::NAN, 1.0, 1.0);
        let b = voice(0.0, 1.0, 1.0);
        assert!(matches!(
            VoiceComparator::default().compare(&a, &b),
            Err(AnalysisError::InvalidFeatures(_))
        ));
    }

    #[test]
    fn test_absent_side_rejected() {
        let b = voice(0.0, 1.0, 1.0);
        let result = VoiceComparator::default().compare_optional(None, Some(&b));
        assert!(matches!(result, Err(AnalysisError::InvalidFeatures(_))));
    }

    #[test]
    fn test_serialized_field_names() {
        let v = voice(0.5, 20.0, 300.0);
        let result = VoiceComparator::default().compare(&v, &v).unwrap();
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["match"], true);
        assert!(json["details"]["pitch_similarity"].is_number());
    }
}
