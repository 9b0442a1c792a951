//! Per-session orchestration.
//!
//! One session runs the whole pipeline:
//!
//! ```text
//! frames ──▶ MovementTracker ──▶ SessionHistory ──▶ ActivityMetrics ─┐
//!                                                                    ├──▶ patterns ──▶ risk
//! voice features ──▶ VoiceComparator (if a reference exists) ────────┘                  │
//!                                                                            report ◀───┘
//! ```
//!
//! Sessions share nothing: each analysis owns a fresh tracker and history.

use crate::collector::{
    AnomalyFeatures, AnomalyScorer, FixedAnomalyScorer, FrameReplay, FrameSource, VoiceFeatures,
};
use crate::config::Config;
use crate::core::{
    AudioSignals, ComparisonResult, DetectionThresholds, MovementTracker, ReportBuilder, RiskScorer,
    SessionActivityAggregator, SessionFindings, SessionHistory, SessionReport,
    SuspiciousPatternDetector, TrackerThresholds, VoiceComparator,
};
use crate::error::AnalysisError;
use crate::results::SharedRunStats;
use std::path::PathBuf;

/// Inputs for one exam session.
#[derive(Debug, Clone)]
pub struct SessionInputs {
    pub student_id: String,
    /// Landmark-model output for the session video, one frame per line
    pub video_path: PathBuf,
    /// Feature-extractor output for the session audio
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    /// Registered voice to compare against, if the student has one
    pub reference_voice: Option<VoiceFeatures>,
    /// Score already produced by the external anomaly model
    pub anomaly_score: Option<f64>,
}

impl SessionInputs {
    pub fn new(
        student_id: impl Into<String>,
        video_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            video_path: video_path.into(),
            audio_path: audio_path.into(),
            output_path: output_path.into(),
            reference_voice: None,
            anomaly_score: None,
        }
    }

    pub fn with_reference_voice(mut self, reference: VoiceFeatures) -> Self {
        self.reference_voice = Some(reference);
        self
    }

    pub fn with_anomaly_score(mut self, score: f64) -> Self {
        self.anomaly_score = Some(score);
        self
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        for path in [&self.video_path, &self.audio_path] {
            if !path.exists() {
                return Err(AnalysisError::MissingInput(path.clone()));
            }
        }
        Ok(())
    }
}

/// Runs sessions through the analysis pipeline.
#[derive(Debug, Clone, Default)]
pub struct SessionAnalyzer {
    tracker: TrackerThresholds,
    comparator: VoiceComparator,
    detector: SuspiciousPatternDetector,
    stats: Option<SharedRunStats>,
}

impl SessionAnalyzer {
    pub fn new(
        tracker: TrackerThresholds,
        match_threshold: f64,
        detection: DetectionThresholds,
    ) -> Self {
        Self {
            tracker,
            comparator: VoiceComparator::new(match_threshold),
            detector: SuspiciousPatternDetector::new(detection),
            stats: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tracker, config.match_threshold, config.detection)
    }

    /// Count frames and written reports into shared run stats.
    pub fn with_stats(mut self, stats: SharedRunStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Analyze a session from its input files.
    pub fn analyze(&self, inputs: &SessionInputs) -> Result<SessionReport, AnalysisError> {
        inputs.validate()?;

        let mut frames = FrameReplay::open(&inputs.video_path)?;
        let voice = VoiceFeatures::load(&inputs.audio_path)?;
        let scorer = inputs.anomaly_score.map(FixedAnomalyScorer::new);

        self.analyze_with(
            inputs,
            &mut frames,
            voice,
            scorer.as_ref().map(|s| s as &dyn AnomalyScorer),
        )
    }

    /// Analyze a session from an arbitrary frame source and scorer.
    pub fn analyze_with(
        &self,
        inputs: &SessionInputs,
        frames: &mut dyn FrameSource,
        voice: VoiceFeatures,
        scorer: Option<&dyn AnomalyScorer>,
    ) -> Result<SessionReport, AnalysisError> {
        let history = self.track(frames)?;
        if let Some(stats) = &self.stats {
            stats.record_frames(history.len() as u64);
        }

        let activity = SessionActivityAggregator::summarize(&history);
        tracing::debug!(
            student_id = %inputs.student_id,
            frames = history.len(),
            face = activity.face_activity_percentage,
            body = activity.body_activity_percentage,
            "Activity summarized"
        );

        let comparison = self.compare_reference(inputs, &voice)?;
        let audio = AudioSignals::from_features(&voice, comparison.as_ref());

        let suspicious_activities = self.detector.detect(&activity, &audio);
        let risk_score = RiskScorer::score(&suspicious_activities);

        let anomaly_score = match scorer {
            Some(scorer) => Some(scorer.score(&AnomalyFeatures::new(&activity, &audio))?),
            None => None,
        };

        let builder =
            ReportBuilder::new(&inputs.student_id, &inputs.video_path, &inputs.audio_path);
        let report = builder.build(SessionFindings {
            activity,
            voice,
            comparison,
            suspicious_activities,
            risk_score,
            anomaly_score,
            timestamps: history.timestamps().to_vec(),
        });

        tracing::info!(
            student_id = %inputs.student_id,
            risk_score = report.risk_score(),
            flags = report.analysis.anomaly_detection.suspicious_activities.len(),
            "{}",
            report.assessment()
        );

        Ok(report)
    }

    /// Analyze a session and write its report to `inputs.output_path`.
    ///
    /// The report file is only written once every stage has succeeded.
    pub fn run(&self, inputs: &SessionInputs) -> Result<SessionReport, AnalysisError> {
        let report = self.analyze(inputs)?;
        report.write_to(&inputs.output_path)?;

        if let Some(stats) = &self.stats {
            stats.record_report_written();
        }
        tracing::info!(
            student_id = %inputs.student_id,
            "Report written to {}",
            inputs.output_path.display()
        );

        Ok(report)
    }

    fn track(&self, frames: &mut dyn FrameSource) -> Result<SessionHistory, AnalysisError> {
        let mut tracker = MovementTracker::new(self.tracker);
        let mut history = SessionHistory::new();

        while let Some(frame) = frames.next_frame() {
            history.record(&mut tracker, &frame?);
        }

        Ok(history)
    }

    fn compare_reference(
        &self,
        inputs: &SessionInputs,
        voice: &VoiceFeatures,
    ) -> Result<Option<ComparisonResult>, AnalysisError> {
        let Some(reference) = &inputs.reference_voice else {
            tracing::debug!(
                student_id = %inputs.student_id,
                "No reference voice, skipping comparison"
            );
            return Ok(None);
        };

        self.comparator
            .compare(&reference.voice_metrics, &voice.voice_metrics)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{FaceFrameMetrics, NoiseMetrics, VoiceMetrics};
    use crate::core::ActivityKind;
    use pretty_assertions::assert_eq;

    fn voice(strength: f64, snr: f64) -> VoiceFeatures {
        VoiceFeatures {
            voice_metrics: VoiceMetrics {
                strength,
                clarity: 20.0,
                pitch_stability: 300.0,
            },
            noise_metrics: NoiseMetrics {
                background_level: 0.01,
                signal_to_noise_ratio: snr,
                disturbance_level: 1.0,
            },
        }
    }

    fn inputs() -> SessionInputs {
        SessionInputs::new("S-100", "video.ndjson", "voice.json", "report.json")
    }

    struct FailingScorer;

    impl AnomalyScorer for FailingScorer {
        fn score(&self, _features: &AnomalyFeatures) -> Result<f64, AnalysisError> {
            Err(AnalysisError::ExternalModelFailure("model unavailable".to_string()))
        }
    }

    #[test]
    fn test_zero_frames_is_a_normal_report() {
        let mut frames = Vec::<FaceFrameMetrics>::new().into_iter();
        let report = SessionAnalyzer::default()
            .analyze_with(&inputs(), &mut frames, voice(0.4, 40.0), None)
            .unwrap();

        assert_eq!(report.analysis.activity_metrics.overall_activity_score, 0.0);
        assert_eq!(report.risk_score(), 0.0);
        assert_eq!(report.assessment(), "Normal behavior detected");
        assert!(report.timestamps.is_empty());
    }

    #[test]
    fn test_restless_session_without_reference() {
        // Every frame moves the head far enough to saturate the head channel.
        let mut frames = (0..10)
            .map(|i| FaceFrameMetrics::detected(0.3, 0.2, [i as f64 * 2.0, 0.0, 0.0]))
            .collect::<Vec<_>>()
            .into_iter();

        let report = SessionAnalyzer::default()
            .analyze_with(&inputs(), &mut frames, voice(0.4, 40.0), None)
            .unwrap();

        let kinds: Vec<ActivityKind> = report
            .analysis
            .anomaly_detection
            .suspicious_activities
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::ExcessiveFaceMovement, ActivityKind::ExcessiveBodyMovement]
        );
        assert_eq!(report.risk_score(), 100.0);
        assert!(report.analysis.audio_analysis.comparison.is_none());
        assert_eq!(report.timestamps.len(), 10);
    }

    #[test]
    fn test_mismatched_reference_flags_voice() {
        let mut frames = vec![FaceFrameMetrics::missing(); 4].into_iter();
        let inputs = inputs().with_reference_voice(voice(5.0, 40.0));

        let report = SessionAnalyzer::default()
            .analyze_with(&inputs, &mut frames, voice(0.4, 40.0), None)
            .unwrap();

        let comparison = report.analysis.audio_analysis.comparison.unwrap();
        assert!(!comparison.is_match);
        let flags = &report.analysis.anomaly_detection.suspicious_activities;
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind, ActivityKind::VoiceMismatch);
    }

    #[test]
    fn test_scorer_failure_aborts_session() {
        let mut frames = Vec::<FaceFrameMetrics>::new().into_iter();
        let result = SessionAnalyzer::default().analyze_with(
            &inputs(),
            &mut frames,
            voice(0.4, 40.0),
            Some(&FailingScorer),
        );
        assert!(matches!(result, Err(AnalysisError::ExternalModelFailure(_))));
    }

    #[test]
    fn test_anomaly_score_passes_through() {
        let mut frames = Vec::<FaceFrameMetrics>::new().into_iter();
        let scorer = FixedAnomalyScorer::new(-0.12);
        let report = SessionAnalyzer::default()
            .analyze_with(&inputs(), &mut frames, voice(0.4, 40.0), Some(&scorer))
            .unwrap();
        assert_eq!(report.analysis.anomaly_detection.anomaly_score, Some(-0.12));
    }

    #[test]
    fn test_missing_video_is_reported() {
        let dir = std::env::temp_dir().join(format!("examguard-session-{}", uuid::Uuid::new_v4()));
        let inputs = SessionInputs::new(
            "S-101",
            dir.join("none.ndjson"),
            dir.join("none.json"),
            dir.join("r.json"),
        );

        match SessionAnalyzer::default().run(&inputs) {
            Err(AnalysisError::MissingInput(path)) => assert_eq!(path, dir.join("none.ndjson")),
            other => panic!("expected MissingInput, got {other:?}"),
        }
        assert!(!dir.join("r.json").exists());
    }
}
