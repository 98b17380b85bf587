//! Mirror Engine Core Library
//!
//! This library implements a resumable, concurrent fetch engine for mirroring
//! a document collection partitioned by subject, exam type, language, and
//! year. Candidate document locations are enumerated deterministically (plus
//! links parsed from one discovery page per subject), probed with bounded
//! concurrency, and every outcome is recorded in a durable state record so
//! that an interrupted run resumes without re-attempting resolved candidates
//! or losing accumulated counts.
//!
//! # Architecture
//!
//! - [`config`] - Subject catalog, candidate-space dimensions, engine tunables
//! - [`state`] - Durable state record with crash-safe checkpointing
//! - [`candidates`] - Candidate space generation (parsed + combinatorial)
//! - [`fetch`] - HTTP client and concurrent fetch engine
//! - [`scheduler`] - Fixed-size batch waves with checkpoint barriers
//! - [`scraper`] - Per-subject orchestration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod candidates;
pub mod config;
pub mod fetch;
pub mod scheduler;
pub mod scraper;
pub mod state;

// Re-export commonly used types
pub use candidates::{Candidate, ExamType, generate_candidates, parse_page_links};
pub use config::{
    ConfigError, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, MirrorConfig, SubjectInfo, YearRange,
};
pub use fetch::{EngineError, FetchEngine, FetchError, FetchOutcome, HttpClient, RunStats};
pub use scheduler::run_batches;
pub use scraper::{Mirror, MirrorError};
pub use state::{MirrorState, SharedState, StateError, StateStore, SubjectProgress};
