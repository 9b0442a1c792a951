//! Input collection for exam sessions.
//!
//! The landmark model, the audio feature extractor and the anomaly model all
//! run outside this crate. This module holds the typed shapes of their output
//! and the seams through which a session consumes them.

pub mod replay;
pub mod types;

use crate::core::{ActivityMetrics, AudioSignals};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use replay::{FixedAnomalyScorer, FrameReplay};
pub use types::{FaceFrameMetrics, NoiseMetrics, VoiceFeatures, VoiceMetrics};

/// Source of per-frame face metrics, yielded in arrival order.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<Result<FaceFrameMetrics, AnalysisError>>;
}

impl FrameSource for std::vec::IntoIter<FaceFrameMetrics> {
    fn next_frame(&mut self) -> Option<Result<FaceFrameMetrics, AnalysisError>> {
        self.next().map(Ok)
    }
}

/// Combined session feature vector handed to the anomaly model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFeatures {
    pub face_activity_percentage: f64,
    pub body_activity_percentage: f64,
    pub eye_activity_percentage: f64,
    pub blink_rate: f64,
    pub overall_activity_score: f64,
    pub noise_ratio: f64,
    /// Absent when no reference voice was available for comparison
    pub voice_match_confidence: Option<f64>,
}

impl AnomalyFeatures {
    pub fn new(activity: &ActivityMetrics, audio: &AudioSignals) -> Self {
        Self {
            face_activity_percentage: activity.face_activity_percentage,
            body_activity_percentage: activity.body_activity_percentage,
            eye_activity_percentage: activity.eye_activity_percentage,
            blink_rate: activity.blink_rate,
            overall_activity_score: activity.overall_activity_score,
            noise_ratio: audio.noise_ratio,
            voice_match_confidence: audio.voice_match_confidence_pct,
        }
    }
}

/// External anomaly model producing one scalar per session.
pub trait AnomalyScorer: Send + Sync {
    fn score(&self, features: &AnomalyFeatures) -> Result<f64, AnalysisError>;
}
