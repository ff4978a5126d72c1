//! Core ranking pipeline: record model, deduplication, deterministic
//! ordering, funnel re-ranking, and the batch runner.

pub mod config;
pub mod dedup;
pub mod fields;
pub mod funnel;
pub mod model;
pub mod rank;
pub mod report;
pub mod runner;
pub mod stats;
pub mod tiebreak;

pub use config::RankConfig;
pub use model::{FindingRecord, RankedFinding, RpiCategory, ScoreSet};
pub use runner::{run_batch, BatchOutcome, RecordScorer};
