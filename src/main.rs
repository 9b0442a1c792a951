//! Exam Guard Agent CLI
//!
//! Integrity scoring for recorded exam sessions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use examguard_agent::{
    batch::{load_manifest, BatchRunner},
    collector::VoiceFeatures,
    config::Config,
    core::{SessionReport, VoiceComparator},
    results::{create_shared_stats, ResultsStore, SessionOutcome},
    session::{SessionAnalyzer, SessionInputs},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "examguard")]
#[command(version = VERSION)]
#[command(about = "Multi-modal integrity scoring for exam sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one exam session and write its report
    Analyze {
        /// Landmark-model output for the session video (NDJSON, one frame per line)
        video: PathBuf,

        /// Feature-extractor output for the session audio (JSON)
        audio: PathBuf,

        /// Student identifier
        student_id: String,

        /// Path of the JSON report to write
        output: PathBuf,

        /// Reference voice features; defaults to the student's registered voice
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Score produced by the external anomaly model
        #[arg(long, allow_hyphen_values = true)]
        anomaly_score: Option<f64>,
    },

    /// Register a student's reference voice
    Register {
        /// Student identifier
        student_id: String,

        /// Feature-extractor output for the reference recording (JSON)
        audio: PathBuf,
    },

    /// Compare two voice feature files
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Minimum similarity for a match (defaults to the configured threshold)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Analyze every session listed in a manifest
    Batch {
        /// JSON array of {student_id, video_path, audio_path, output_path, anomaly_score?}
        manifest: PathBuf,

        /// Worker threads (defaults to the configured count)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show stored results
    Results,

    /// Show configuration
    Config,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            video,
            audio,
            student_id,
            output,
            reference,
            anomaly_score,
        } => cmd_analyze(video, audio, student_id, output, reference, anomaly_score),
        Commands::Register { student_id, audio } => cmd_register(&student_id, &audio),
        Commands::Compare { a, b, threshold } => cmd_compare(&a, &b, threshold),
        Commands::Batch { manifest, workers } => cmd_batch(&manifest, workers),
        Commands::Results => cmd_results(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Could not load config, using defaults: {}", e);
        Config::default()
    })
}

fn cmd_analyze(
    video: PathBuf,
    audio: PathBuf,
    student_id: String,
    output: PathBuf,
    reference: Option<PathBuf>,
    anomaly_score: Option<f64>,
) -> anyhow::Result<()> {
    let config = load_config();
    let mut store = ResultsStore::open(&config.results_path)?;

    let mut inputs = SessionInputs::new(student_id, video, audio, output);
    inputs.reference_voice = match reference {
        Some(path) => Some(VoiceFeatures::load(&path)?),
        None => store.registered_voice(&inputs.student_id).copied(),
    };
    inputs.anomaly_score = anomaly_score;

    let stats = create_shared_stats();
    let analyzer = SessionAnalyzer::from_config(&config).with_stats(stats.clone());

    stats.record_session_started();
    let outcome = analyzer.run(&inputs);
    match &outcome {
        Ok(report) => {
            stats.record_session_completed();
            store.record_success(&inputs.student_id, report, &inputs.output_path);
        }
        Err(e) => {
            stats.record_session_failed();
            store.record_failure(&inputs.student_id, e);
        }
    }

    store.save().context("saving results store")?;

    let report = outcome?;
    print_report(&report, &inputs.output_path);
    Ok(())
}

fn print_report(report: &SessionReport, output: &Path) {
    let detection = &report.analysis.anomaly_detection;

    println!("Session: {}", report.metadata.student_id);
    println!("  Risk score: {:.2}", detection.risk_score);
    println!("  Assessment: {}", detection.assessment);
    if detection.suspicious_activities.is_empty() {
        println!("  Suspicious activities: none");
    } else {
        println!("  Suspicious activities:");
        for activity in &detection.suspicious_activities {
            println!(
                "    - {} ({}, value {:.2})",
                activity.kind.as_str(),
                activity.severity.as_str(),
                activity.value
            );
        }
    }
    println!("  Report: {}", output.display());
}

fn cmd_register(student_id: &str, audio: &Path) -> anyhow::Result<()> {
    let config = load_config();
    let features = VoiceFeatures::load(audio)?;

    let mut store = ResultsStore::open(&config.results_path)?;
    let registered_at = store.register_voice(student_id, features).registered_at;
    store.save().context("saving results store")?;

    tracing::info!(student_id, "Voice registered");
    println!("Registered voice for {student_id} at {}", registered_at.to_rfc3339());
    Ok(())
}

fn cmd_compare(a: &Path, b: &Path, threshold: Option<f64>) -> anyhow::Result<()> {
    let config = load_config();
    let comparator = VoiceComparator::new(threshold.unwrap_or(config.match_threshold));

    let first = VoiceFeatures::load(a)?;
    let second = VoiceFeatures::load(b)?;
    let result = comparator.compare(&first.voice_metrics, &second.voice_metrics)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_batch(manifest: &Path, workers: Option<usize>) -> anyhow::Result<()> {
    let config = load_config();
    let jobs = load_manifest(manifest)?;
    let store = ResultsStore::open(&config.results_path)?;

    let stats = create_shared_stats();
    let runner = BatchRunner::new(
        SessionAnalyzer::from_config(&config),
        workers.unwrap_or(config.workers),
    )
    .with_stats(stats.clone());

    ctrlc_handler(runner.running());

    let (summary, store) = runner.run(jobs, store);

    if summary.save_failures > 0 {
        tracing::warn!(
            save_failures = summary.save_failures,
            "Results store could not be saved during the batch, retrying"
        );
    }
    store
        .save()
        .with_context(|| format!("saving results store {}", store.path().display()))?;

    println!();
    println!("{}", stats.summary());
    println!();
    println!(
        "Batch: {} completed, {} failed, {} skipped",
        summary.completed, summary.failed, summary.skipped
    );

    if summary.failed > 0 {
        anyhow::bail!("{} session(s) failed", summary.failed);
    }
    Ok(())
}

fn cmd_results() -> anyhow::Result<()> {
    let config = load_config();
    let store = ResultsStore::open(&config.results_path)?;

    println!("{}", store.summary());
    println!();

    for (student_id, entry) in store.results() {
        match &entry.outcome {
            SessionOutcome::Summary(summary) => println!(
                "  {student_id}: {:.2} - {} ({} flag(s)) -> {}",
                summary.risk_score,
                summary.assessment,
                summary.suspicious_activity_count,
                summary.report_path.display()
            ),
            SessionOutcome::Error(e) => println!("  {student_id}: FAILED - {e}"),
        }
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not set Ctrl+C handler: {}", e);
    }
}
