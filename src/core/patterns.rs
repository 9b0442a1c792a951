//! Rule-based suspicious pattern detection.
//!
//! Rules run in a fixed order (face, body, noise, voice) and are
//! independent: every rule whose condition holds adds one record.

use crate::collector::types::VoiceFeatures;
use crate::core::activity::ActivityMetrics;
use crate::core::risk::Severity;
use crate::core::voice::ComparisonResult;
use serde::{Deserialize, Serialize};

/// Kind of suspicious activity flagged by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ExcessiveFaceMovement,
    ExcessiveBodyMovement,
    HighNoiseLevel,
    VoiceMismatch,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::ExcessiveFaceMovement => "excessive_face_movement",
            ActivityKind::ExcessiveBodyMovement => "excessive_body_movement",
            ActivityKind::HighNoiseLevel => "high_noise_level",
            ActivityKind::VoiceMismatch => "voice_mismatch",
        }
    }
}

/// One rule-triggered flag, carrying the observed value that tripped it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousActivity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub severity: Severity,
    pub value: f64,
}

/// Audio-derived signals consumed by the rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSignals {
    /// Noise amplitude relative to the signal, as a percentage in [0, 100]
    pub noise_ratio: f64,
    /// Voice comparison confidence scaled to [0, 100]; absent when no
    /// comparison was made
    pub voice_match_confidence_pct: Option<f64>,
}

impl AudioSignals {
    /// Derive rule inputs from an extractor bundle and an optional
    /// comparison against a registered voice.
    pub fn from_features(features: &VoiceFeatures, comparison: Option<&ComparisonResult>) -> Self {
        Self {
            noise_ratio: noise_ratio_from_snr(features.noise_metrics.signal_to_noise_ratio),
            voice_match_confidence_pct: comparison
                .map(|c| (c.confidence * 100.0).clamp(0.0, 100.0)),
        }
    }
}

/// Convert an SNR in dB to a noise-to-signal amplitude percentage.
///
/// 20 dB maps to 10%, 0 dB or below saturates at 100%.
pub fn noise_ratio_from_snr(snr_db: f64) -> f64 {
    if !snr_db.is_finite() {
        return if snr_db == f64::INFINITY { 0.0 } else { 100.0 };
    }
    (100.0 * 10f64.powf(-snr_db / 20.0)).clamp(0.0, 100.0)
}

/// Thresholds for each rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// Face activity percentage above which face movement is excessive
    pub face_activity_pct: f64,
    /// Body (head-pose) activity percentage above which movement is excessive
    pub body_activity_pct: f64,
    /// Noise ratio above which the environment is too noisy
    pub noise_ratio: f64,
    /// Voice match confidence percentage below which the voice mismatches
    pub voice_match_pct: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            face_activity_pct: 30.0,
            body_activity_pct: 25.0,
            noise_ratio: 15.0,
            voice_match_pct: 85.0,
        }
    }
}

/// Applies the threshold rules to a session's aggregated signals.
#[derive(Debug, Clone, Default)]
pub struct SuspiciousPatternDetector {
    thresholds: DetectionThresholds,
}

impl SuspiciousPatternDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect(
        &self,
        activity: &ActivityMetrics,
        audio: &AudioSignals,
    ) -> Vec<SuspiciousActivity> {
        let t = &self.thresholds;
        let mut found = Vec::new();

        if activity.face_activity_percentage > t.face_activity_pct {
            found.push(SuspiciousActivity {
                kind: ActivityKind::ExcessiveFaceMovement,
                severity: Severity::High,
                value: activity.face_activity_percentage,
            });
        }

        if activity.body_activity_percentage > t.body_activity_pct {
            found.push(SuspiciousActivity {
                kind: ActivityKind::ExcessiveBodyMovement,
                severity: Severity::High,
                value: activity.body_activity_percentage,
            });
        }

        if audio.noise_ratio > t.noise_ratio {
            found.push(SuspiciousActivity {
                kind: ActivityKind::HighNoiseLevel,
                severity: Severity::Medium,
                value: audio.noise_ratio,
            });
        }

        // Without comparison data the voice rule is skipped, never scored as 0.
        if let Some(confidence) = audio.voice_match_confidence_pct {
            if confidence < t.voice_match_pct {
                found.push(SuspiciousActivity {
                    kind: ActivityKind::VoiceMismatch,
                    severity: Severity::High,
                    value: confidence,
                });
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{NoiseMetrics, VoiceMetrics};
    use pretty_assertions::assert_eq;

    fn activity(face: f64, body: f64) -> ActivityMetrics {
        ActivityMetrics {
            face_activity_percentage: face,
            body_activity_percentage: body,
            ..ActivityMetrics::default()
        }
    }

    #[test]
    fn test_quiet_session_has_no_flags() {
        let audio = AudioSignals {
            noise_ratio: 5.0,
            voice_match_confidence_pct: Some(95.0),
        };
        let found = SuspiciousPatternDetector::default().detect(&activity(10.0, 10.0), &audio);
        assert!(found.is_empty());
    }

    #[test]
    fn test_face_and_noise_rules() {
        let audio = AudioSignals {
            noise_ratio: 20.0,
            voice_match_confidence_pct: Some(90.0),
        };
        let found = SuspiciousPatternDetector::default().detect(&activity(35.0, 10.0), &audio);

        assert_eq!(
            found,
            vec![
                SuspiciousActivity {
                    kind: ActivityKind::ExcessiveFaceMovement,
                    severity: Severity::High,
                    value: 35.0,
                },
                SuspiciousActivity {
                    kind: ActivityKind::HighNoiseLevel,
                    severity: Severity::Medium,
                    value: 20.0,
                },
            ]
        );
    }

    #[test]
    fn test_all_rules_fire_in_order() {
        let audio = AudioSignals {
            noise_ratio: 40.0,
            voice_match_confidence_pct: Some(60.0),
        };
        let found = SuspiciousPatternDetector::default().detect(&activity(80.0, 50.0), &audio);
        let kinds: Vec<ActivityKind> = found.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::ExcessiveFaceMovement,
                ActivityKind::ExcessiveBodyMovement,
                ActivityKind::HighNoiseLevel,
                ActivityKind::VoiceMismatch,
            ]
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        let audio = AudioSignals {
            noise_ratio: 15.0,
            voice_match_confidence_pct: Some(85.0),
        };
        let found = SuspiciousPatternDetector::default().detect(&activity(30.0, 25.0), &audio);
        assert!(found.is_empty());
    }

    #[test]
    fn test_missing_comparison_skips_voice_rule() {
        let audio = AudioSignals {
            noise_ratio: 0.0,
            voice_match_confidence_pct: None,
        };
        let found = SuspiciousPatternDetector::default().detect(&activity(0.0, 0.0), &audio);
        assert!(found.is_empty());
    }

    #[test]
    fn test_noise_ratio_from_snr() {
        assert!((noise_ratio_from_snr(20.0) - 10.0).abs() < 1e-9);
        assert!((noise_ratio_from_snr(40.0) - 1.0).abs() < 1e-9);
        assert_eq!(noise_ratio_from_snr(0.0), 100.0);
        assert_eq!(noise_ratio_from_snr(-6.0), 100.0);
        assert_eq!(noise_ratio_from_snr(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_audio_signals_from_features() {
        let features = VoiceFeatures {
            voice_metrics: VoiceMetrics {
                strength: 0.4,
                clarity: 20.0,
                pitch_stability: 300.0,
            },
            noise_metrics: NoiseMetrics {
                background_level: 0.01,
                signal_to_noise_ratio: 20.0,
                disturbance_level: 1.0,
            },
        };
        let comparison = crate::core::voice::VoiceComparator::default()
            .compare(&features.voice_metrics, &features.voice_metrics)
            .unwrap();

        let audio = AudioSignals::from_features(&features, Some(&comparison));
        assert!((audio.noise_ratio - 10.0).abs() < 1e-9);
        assert_eq!(audio.voice_match_confidence_pct, Some(100.0));

        let audio = AudioSignals::from_features(&features, None);
        assert_eq!(audio.voice_match_confidence_pct, None);
    }

    #[test]
    fn test_serialized_record() {
        let record = SuspiciousActivity {
            kind: ActivityKind::VoiceMismatch,
            severity: Severity::High,
            value: 61.5,
        };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["type"], "voice_mismatch");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["value"], 61.5);
    }
}
