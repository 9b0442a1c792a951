//! Assessment and session report assembly.
//!
//! The report layout is fixed: `metadata`, `analysis` (activity metrics,
//! audio analysis, anomaly detection) and per-frame `timestamps`.

use crate::collector::types::{NoiseMetrics, VoiceFeatures, VoiceMetrics};
use crate::core::activity::ActivityMetrics;
use crate::core::patterns::SuspiciousActivity;
use crate::core::voice::ComparisonResult;
use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Risk score below which behavior is considered normal.
const SUSPICIOUS_THRESHOLD: f64 = 20.0;

/// Risk score at or above which the session is high risk.
const HIGH_RISK_THRESHOLD: f64 = 50.0;

/// Categorical verdict for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Normal,
    Suspicious,
    HighRisk,
}

impl Assessment {
    /// Human-readable verdict written to the report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Assessment::Normal => "Normal behavior detected",
            Assessment::Suspicious => "Some suspicious behavior detected",
            Assessment::HighRisk => "High risk of cheating detected",
        }
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AssessmentReporter;

impl AssessmentReporter {
    pub fn assess(risk_score: f64) -> Assessment {
        if risk_score < SUSPICIOUS_THRESHOLD {
            Assessment::Normal
        } else if risk_score < HIGH_RISK_THRESHOLD {
            Assessment::Suspicious
        } else {
            Assessment::HighRisk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFiles {
    pub video: String,
    pub audio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
    pub files: ReportFiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub voice_metrics: VoiceMetrics,
    pub noise_metrics: NoiseMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub risk_score: f64,
    pub suspicious_activities: Vec<SuspiciousActivity>,
    pub assessment: String,
    /// External anomaly model output, passed through unmodified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAnalysis {
    pub activity_metrics: ActivityMetrics,
    pub audio_analysis: AudioAnalysis,
    pub anomaly_detection: AnomalyDetection,
}

/// Final integrity report for one exam session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub metadata: ReportMetadata,
    pub analysis: ReportAnalysis,
    pub timestamps: Vec<DateTime<Utc>>,
}

impl SessionReport {
    pub fn risk_score(&self) -> f64 {
        self.analysis.anomaly_detection.risk_score
    }

    pub fn assessment(&self) -> &str {
        &self.analysis.anomaly_detection.assessment
    }

    pub fn to_json_pretty(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self).map_err(|e| AnalysisError::Serialize(e.to_string()))
    }

    /// Write the report, creating parent directories as needed.
    ///
    /// The JSON goes to a sibling temp file first and is renamed into
    /// place, so `path` never holds a partial report.
    pub fn write_to(&self, path: &Path) -> Result<(), AnalysisError> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let tmp_path = path.with_file_name(tmp_name);

        let written =
            std::fs::write(&tmp_path, json).and_then(|_| std::fs::rename(&tmp_path, path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Everything the pipeline computed for a session.
#[derive(Debug, Clone)]
pub struct SessionFindings {
    pub activity: ActivityMetrics,
    pub voice: VoiceFeatures,
    pub comparison: Option<ComparisonResult>,
    pub suspicious_activities: Vec<SuspiciousActivity>,
    pub risk_score: f64,
    pub anomaly_score: Option<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Builder for session reports.
pub struct ReportBuilder {
    student_id: String,
    files: ReportFiles,
}

impl ReportBuilder {
    pub fn new(student_id: impl Into<String>, video: &Path, audio: &Path) -> Self {
        Self {
            student_id: student_id.into(),
            files: ReportFiles {
                video: video.display().to_string(),
                audio: audio.display().to_string(),
            },
        }
    }

    /// Assemble the report. The assessment is derived from the risk score;
    /// everything else is carried over as computed.
    pub fn build(&self, findings: SessionFindings) -> SessionReport {
        let assessment = AssessmentReporter::assess(findings.risk_score);

        SessionReport {
            metadata: ReportMetadata {
                student_id: self.student_id.clone(),
                timestamp: Utc::now(),
                files: self.files.clone(),
            },
            analysis: ReportAnalysis {
                activity_metrics: findings.activity,
                audio_analysis: AudioAnalysis {
                    voice_metrics: findings.voice.voice_metrics,
                    noise_metrics: findings.voice.noise_metrics,
                    comparison: findings.comparison,
                },
                anomaly_detection: AnomalyDetection {
                    risk_score: findings.risk_score,
                    suspicious_activities: findings.suspicious_activities,
                    assessment: assessment.as_str().to_string(),
                    anomaly_score: findings.anomaly_score,
                },
            },
            timestamps: findings.timestamps,
        }
    }
}
