//! Severity-weighted risk scoring.
//!
//! The risk score is the mean severity weight of the flagged activities,
//! scaled to a percentage. Adding low-severity flags dilutes the score
//! rather than amplifying it.

use crate::core::patterns::SuspiciousActivity;
use crate::core::round2;
use serde::{Deserialize, Serialize};

/// Severity of a suspicious activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => 0.3,
            Severity::Medium => 0.6,
            Severity::High => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

pub struct RiskScorer;

impl RiskScorer {
    /// Score a session's flagged activities, in [0, 100].
    pub fn score(activities: &[SuspiciousActivity]) -> f64 {
        if activities.is_empty() {
            return 0.0;
        }

        let total: f64 = activities.iter().map(|a| a.severity.weight()).sum();
        let mean = total / activities.len() as f64;
        round2((mean * 100.0).min(100.0))
    }
}
