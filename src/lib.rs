//! Exam Guard Agent - multi-modal integrity scoring for exam sessions.
//!
//! This library fuses per-frame face metrics, session voice features and an
//! optional anomaly model score into a per-session risk report.
//!
//! # Guarantees
//!
//! - **Independent sessions**: every session owns its tracker and history
//! - **Deterministic scoring**: the same inputs always yield the same risk
//!   score and assessment
//! - **All-or-nothing reports**: a report file is only written once every
//!   stage of the session has succeeded
//! - **Single writer**: the results store is updated by one thread at a time
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Exam Guard Agent                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ FrameReplay │──▶│  Movement   │──▶│  Activity   │──┐          │
//! │  │  (NDJSON)   │   │  Tracker    │   │ Aggregator  │  │          │
//! │  └─────────────┘   └─────────────┘   └─────────────┘  ▼          │
//! │  ┌─────────────┐   ┌─────────────┐            ┌─────────────┐    │
//! │  │   Voice     │──▶│   Voice     │───────────▶│  Patterns   │    │
//! │  │  Features   │   │ Comparator  │            │  + Risk     │    │
//! │  └─────────────┘   └─────────────┘            └─────────────┘    │
//! │                                                      │           │
//! │                    ┌─────────────┐            ┌─────────────┐    │
//! │                    │  Results    │◀───────────│   Session   │    │
//! │                    │   Store     │            │   Report    │    │
//! │                    └─────────────┘            └─────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use examguard_agent::{SessionAnalyzer, SessionInputs};
//!
//! let inputs = SessionInputs::new("S-001", "frames.ndjson", "voice.json", "report.json");
//! let report = SessionAnalyzer::default().run(&inputs).expect("session failed");
//! println!("{}: {}", report.risk_score(), report.assessment());
//! ```

pub mod batch;
pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod results;
pub mod session;

// Re-export key types at crate root for convenience
pub use batch::{load_manifest, BatchRunner, BatchSummary, ManifestEntry};
pub use collector::{FaceFrameMetrics, FrameReplay, VoiceFeatures};
pub use config::{Config, ConfigError};
pub use core::{Assessment, ComparisonResult, SessionReport, VoiceComparator};
pub use error::AnalysisError;
pub use results::{ResultsStore, RunStats, SharedRunStats};
pub use session::{SessionAnalyzer, SessionInputs};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
