//! Multi-session batch runner.
//!
//! A fixed pool of workers pulls sessions from a channel and runs each one
//! through its own [`SessionAnalyzer`] pipeline. Outcomes flow to a single
//! writer thread that owns the [`ResultsStore`], so concurrent sessions never
//! race on the store file.
//!
//! ```text
//!             ┌──▶ worker ──┐
//! dispatch ───┼──▶ worker ──┼──▶ writer ──▶ results.json
//!             └──▶ worker ──┘
//! ```

use crate::core::SessionReport;
use crate::error::AnalysisError;
use crate::results::{ResultsStore, SharedRunStats};
use crate::session::{SessionAnalyzer, SessionInputs};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// One session in a batch manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub student_id: String,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

/// Load a manifest: a JSON array of [`ManifestEntry`].
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| AnalysisError::Serialize(format!("manifest {}: {e}", path.display())))
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    /// Sessions never dispatched because the run was stopped
    pub skipped: usize,
    /// Store saves that failed; the latest outcomes may not be on disk
    pub save_failures: usize,
}

struct SessionResult {
    student_id: String,
    output_path: PathBuf,
    result: Result<SessionReport, AnalysisError>,
}

/// Runs many sessions concurrently.
pub struct BatchRunner {
    analyzer: SessionAnalyzer,
    workers: usize,
    running: Arc<AtomicBool>,
    stats: Option<SharedRunStats>,
}

impl BatchRunner {
    pub fn new(analyzer: SessionAnalyzer, workers: usize) -> Self {
        Self {
            analyzer,
            workers: workers.max(1),
            running: Arc::new(AtomicBool::new(true)),
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: SharedRunStats) -> Self {
        self.analyzer = self.analyzer.with_stats(stats.clone());
        self.stats = Some(stats);
        self
    }

    /// Flag that keeps dispatch going while `true`. Clearing it stops
    /// further sessions from starting; in-flight sessions finish normally.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run every job and return the updated store.
    pub fn run(
        &self,
        jobs: Vec<ManifestEntry>,
        store: ResultsStore,
    ) -> (BatchSummary, ResultsStore) {
        let total = jobs.len();
        let inputs: Vec<SessionInputs> = jobs
            .into_iter()
            .map(|job| resolve_inputs(job, &store))
            .collect();

        let (job_tx, job_rx) = bounded::<SessionInputs>(self.workers);
        let (result_tx, result_rx) = unbounded::<SessionResult>();

        tracing::info!(sessions = total, workers = self.workers, "Starting batch");

        let (summary, store) = thread::scope(|scope| {
            let writer = scope.spawn(move || write_results(result_rx, store));

            for _ in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || self.work(job_rx, result_tx));
            }
            drop(job_rx);
            drop(result_tx);

            let dispatched = self.dispatch(inputs, job_tx);
            let (summary, store) = match writer.join() {
                Ok(done) => done,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (BatchSummary { skipped: total - dispatched, ..summary }, store)
        });

        if summary.skipped > 0 {
            tracing::warn!(
                skipped = summary.skipped,
                "Batch stopped before all sessions were dispatched"
            );
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch finished"
        );

        (summary, store)
    }

    /// Send jobs to the workers until done or stopped. Returns the number
    /// dispatched.
    fn dispatch(&self, inputs: Vec<SessionInputs>, job_tx: Sender<SessionInputs>) -> usize {
        let mut dispatched = 0;
        for job in inputs {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if job_tx.send(job).is_err() {
                break;
            }
            dispatched += 1;
        }
        dispatched
    }

    fn work(&self, job_rx: Receiver<SessionInputs>, result_tx: Sender<SessionResult>) {
        for inputs in job_rx.iter() {
            if let Some(stats) = &self.stats {
                stats.record_session_started();
            }

            let result = self.analyzer.run(&inputs);

            if let Some(stats) = &self.stats {
                match &result {
                    Ok(_) => stats.record_session_completed(),
                    Err(_) => stats.record_session_failed(),
                }
            }
            if let Err(e) = &result {
                tracing::error!(
                    student_id = %inputs.student_id,
                    kind = e.kind(),
                    "Session failed: {}",
                    e
                );
            }

            let message = SessionResult {
                student_id: inputs.student_id,
                output_path: inputs.output_path,
                result,
            };
            if result_tx.send(message).is_err() {
                return;
            }
        }
    }
}

fn resolve_inputs(job: ManifestEntry, store: &ResultsStore) -> SessionInputs {
    let mut inputs = SessionInputs::new(
        job.student_id,
        job.video_path,
        job.audio_path,
        job.output_path,
    );
    inputs.reference_voice = store.registered_voice(&inputs.student_id).copied();
    inputs.anomaly_score = job.anomaly_score;
    inputs
}

/// Writer loop: the only code that touches the store during a batch.
fn write_results(
    results: Receiver<SessionResult>,
    mut store: ResultsStore,
) -> (BatchSummary, ResultsStore) {
    let mut summary = BatchSummary::default();

    for message in results.iter() {
        match &message.result {
            Ok(report) => {
                store.record_success(&message.student_id, report, &message.output_path);
                summary.completed += 1;
            }
            Err(e) => {
                store.record_failure(&message.student_id, e);
                summary.failed += 1;
            }
        }

        if let Err(e) = store.save() {
            summary.save_failures += 1;
            tracing::error!(
                "Failed to save results store {}: {}",
                store.path().display(),
                e
            );
        }
    }

    (summary, store)
}
