//! Persisted results and run statistics.

pub mod stats;
pub mod store;

pub use stats::{create_shared_stats, RunStats, RunStatsSnapshot, SharedRunStats};
pub use store::{ReportSummary, ResultEntry, ResultsStore, SessionOutcome, VoiceRegistration};
