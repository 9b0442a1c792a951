//! Core analysis for exam sessions.
//!
//! This module contains:
//! - Frame-to-frame movement tracking and session history
//! - Session-level activity aggregation
//! - Voice comparison
//! - Rule-based suspicious pattern detection and risk scoring
//! - Assessment and report assembly

pub mod activity;
pub mod patterns;
pub mod report;
pub mod risk;
pub mod tracker;
pub mod voice;

// Re-export commonly used types
pub use activity::{ActivityMetrics, SessionActivityAggregator};
pub use patterns::{
    noise_ratio_from_snr, ActivityKind, AudioSignals, DetectionThresholds, SuspiciousActivity,
    SuspiciousPatternDetector,
};
pub use report::{Assessment, AssessmentReporter, ReportBuilder, SessionFindings, SessionReport};
pub use risk::{RiskScorer, Severity};
pub use tracker::{FrameMovement, MovementTracker, SessionHistory, TrackerThresholds};
pub use voice::{ComparisonResult, VoiceComparator, DEFAULT_MATCH_THRESHOLD};

/// Round to two decimal places, as reported.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
