//! Concurrent HTTP fetch engine.
//!
//! This module provides the pooled [`HttpClient`], the [`FetchEngine`] that
//! resolves individual candidates under a run-wide concurrency gate, and the
//! structured [`FetchError`] whose [`reason`](FetchError::reason) tags are
//! what the durable state record stores.

mod client;
mod engine;
mod error;

pub use client::HttpClient;
pub use engine::{EngineError, FetchEngine, FetchOutcome, RunStats};
pub use error::{FetchError, REASON_CONTENT_MISMATCH, REASON_EXCEPTION};
