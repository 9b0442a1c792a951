//! Persisted per-student results and voice registrations.
//!
//! The store is a single JSON document. It is not safe for concurrent
//! writers: the batch runner funnels every update through one writer thread.

use crate::collector::types::VoiceFeatures;
use crate::core::report::{Assessment, SessionReport};
use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A student's registered reference voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRegistration {
    pub features: VoiceFeatures,
    pub registered_at: DateTime<Utc>,
}

/// Condensed view of a written report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub risk_score: f64,
    pub assessment: String,
    pub suspicious_activity_count: usize,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Summary(ReportSummary),
    Error(String),
}

/// Latest processing outcome for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub session_id: Uuid,
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: SessionOutcome,
}

impl ResultEntry {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Error(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    registrations: BTreeMap<String, VoiceRegistration>,
    #[serde(default)]
    results: BTreeMap<String, ResultEntry>,
}

/// JSON-backed store of registrations and results, keyed by student id.
#[derive(Debug)]
pub struct ResultsStore {
    path: PathBuf,
    data: StoreData,
}

impl ResultsStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                AnalysisError::Serialize(format!("results store {}: {e}", path.display()))
            })?
        } else {
            StoreData::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register (or replace) a student's reference voice.
    pub fn register_voice(
        &mut self,
        student_id: &str,
        features: VoiceFeatures,
    ) -> &VoiceRegistration {
        let registration = VoiceRegistration {
            features,
            registered_at: Utc::now(),
        };
        self.data.registrations.insert(student_id.to_string(), registration);
        &self.data.registrations[student_id]
    }

    pub fn registered_voice(&self, student_id: &str) -> Option<&VoiceFeatures> {
        self.data.registrations.get(student_id).map(|r| &r.features)
    }

    /// Record a successfully written report, replacing any earlier result.
    pub fn record_success(
        &mut self,
        student_id: &str,
        report: &SessionReport,
        report_path: &Path,
    ) -> &ResultEntry {
        let summary = ReportSummary {
            risk_score: report.risk_score(),
            assessment: report.assessment().to_string(),
            suspicious_activity_count: report
                .analysis
                .anomaly_detection
                .suspicious_activities
                .len(),
            report_path: report_path.to_path_buf(),
        };
        self.insert(student_id, SessionOutcome::Summary(summary))
    }

    /// Record a failed session, replacing any earlier result.
    pub fn record_failure(&mut self, student_id: &str, error: &AnalysisError) -> &ResultEntry {
        self.insert(student_id, SessionOutcome::Error(error.to_string()))
    }

    fn insert(&mut self, student_id: &str, outcome: SessionOutcome) -> &ResultEntry {
        let entry = ResultEntry {
            session_id: Uuid::new_v4(),
            processed_at: Utc::now(),
            outcome,
        };
        self.data.results.insert(student_id.to_string(), entry);
        &self.data.results[student_id]
    }

    pub fn result(&self, student_id: &str) -> Option<&ResultEntry> {
        self.data.results.get(student_id)
    }

    /// All results, ordered by student id.
    pub fn results(&self) -> impl Iterator<Item = (&str, &ResultEntry)> {
        self.data.results.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Save the store, creating parent directories as needed.
    pub fn save(&self) -> Result<(), AnalysisError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| AnalysisError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let failed = self.data.results.values().filter(|e| e.is_failure()).count();
        let high_risk = self
            .data
            .results
            .values()
            .filter(|e| match &e.outcome {
                SessionOutcome::Summary(s) => s.assessment == Assessment::HighRisk.as_str(),
                SessionOutcome::Error(_) => false,
            })
            .count();

        format!(
            "Results Store:\n\
             - Registered voices: {}\n\
             - Sessions recorded: {}\n\
             - Failed sessions: {}\n\
             - High risk sessions: {}",
            self.data.registrations.len(),
            self.data.results.len(),
            failed,
            high_risk
        )
    }
}
