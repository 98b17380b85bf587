//! Concurrent fetch engine.
//!
//! [`FetchEngine::fetch_one`] resolves a single candidate: skip it if the
//! state record already settled it, otherwise take a permit from the run-wide
//! concurrency gate, wait a small randomized jitter, issue the request, and
//! record the classified outcome. No outcome is retried within a run; a URL
//! becomes `seen` on its first attempt and stays settled until an external
//! clear.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use super::client::HttpClient;
use crate::candidates::Candidate;
use crate::config::MirrorConfig;
use crate::state::SharedState;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Error type for fetch engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Outcome of resolving one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fetched over the network and persisted this run.
    Downloaded,
    /// Already downloaded in an earlier run and still present on disk; no
    /// network call was made.
    AlreadyDownloaded,
    /// Previously attempted (failed or seen); no network call was made.
    Skipped,
    /// Attempted this run and recorded as failed with the given reason tag.
    Failed(String),
}

/// This-run counters, updated from concurrent fetch tasks.
///
/// These feed per-batch progress logs and the legacy `downloaded`/`found`
/// fields of the subject progress entry; the cumulative truth lives in the
/// state record.
#[derive(Debug, Default)]
pub struct RunStats {
    downloaded: AtomicU64,
    found: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl RunStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Downloads performed this run.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Downloads of probe candidates this run (newly discovered documents).
    #[must_use]
    pub fn found(&self) -> u64 {
        self.found.load(Ordering::SeqCst)
    }

    /// Failures recorded this run.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Candidates resolved without a network attempt.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    fn record(&self, outcome: &FetchOutcome, is_probe: bool) {
        match outcome {
            FetchOutcome::Downloaded => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
                if is_probe {
                    self.found.fetch_add(1, Ordering::SeqCst);
                }
            }
            FetchOutcome::Failed(_) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            FetchOutcome::AlreadyDownloaded | FetchOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Concurrent fetch engine with a run-wide concurrency gate.
///
/// The semaphore bounds in-flight requests across the whole run, not per
/// batch; the HTTP client's pool is sized to the same bound.
#[derive(Debug)]
pub struct FetchEngine {
    client: HttpClient,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    storage_root: PathBuf,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl FetchEngine {
    /// Creates an engine from the mirror configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the configured
    /// concurrency is outside 1-100.
    pub fn new(
        client: HttpClient,
        config: &MirrorConfig,
        storage_root: PathBuf,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }

        debug!(
            concurrency = config.concurrency,
            min_delay_ms = config.min_delay_ms,
            max_delay_ms = config.max_delay_ms,
            storage_root = %storage_root.display(),
            "creating fetch engine"
        );

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            concurrency: config.concurrency,
            storage_root,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms.max(config.min_delay_ms),
        })
    }

    /// Returns the configured concurrency bound.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the storage root.
    #[must_use]
    pub fn storage_root(&self) -> &std::path::Path {
        &self.storage_root
    }

    /// Resolves one candidate.
    ///
    /// Decision order:
    /// 1. Already downloaded and still on disk → [`FetchOutcome::AlreadyDownloaded`],
    ///    no network. Downloaded-but-missing falls through and re-fetches
    ///    (detects out-of-band deletion).
    /// 2. Previously failed or seen → [`FetchOutcome::Skipped`], no network,
    ///    no retry within or across runs.
    /// 3. Otherwise: permit, jitter, GET, classify, and record the outcome in
    ///    the shared state. State mutation happens in one critical section
    ///    after the network and disk I/O complete.
    #[instrument(skip(self, candidate, state, stats), fields(url = %candidate.url))]
    pub async fn fetch_one(
        &self,
        candidate: &Candidate,
        referer: &str,
        state: &SharedState,
        stats: &RunStats,
    ) -> FetchOutcome {
        let url = candidate.url.as_str();
        let save_path = candidate.storage_path(&self.storage_root);

        let was_downloaded = {
            let s = state.lock().await;
            if !s.downloaded.contains(url) && (s.failed.contains_key(url) || s.seen.contains(url)) {
                debug!("previously attempted, skipping");
                drop(s);
                let outcome = FetchOutcome::Skipped;
                stats.record(&outcome, candidate.is_probe);
                return outcome;
            }
            s.downloaded.contains(url)
        };

        if was_downloaded {
            if tokio::fs::try_exists(&save_path).await.unwrap_or(false) {
                let outcome = FetchOutcome::AlreadyDownloaded;
                stats.record(&outcome, candidate.is_probe);
                return outcome;
            }
            debug!(path = %save_path.display(), "recorded as downloaded but missing on disk, re-fetching");
        }

        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                // The engine owns the semaphore and never closes it.
                warn!("concurrency gate closed, skipping candidate");
                let outcome = FetchOutcome::Skipped;
                stats.record(&outcome, candidate.is_probe);
                return outcome;
            }
        };

        // Jitter sampled outside the sleep: ThreadRng is not Send.
        let jitter_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.min_delay_ms..=self.max_delay_ms)
        };
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

        let outcome = match self.client.fetch_document(url, referer, &save_path).await {
            Ok(bytes) => {
                debug!(bytes, "downloaded");
                let mut s = state.lock().await;
                s.record_download(url, &candidate.subject);
                FetchOutcome::Downloaded
            }
            Err(e) => {
                let reason = e.reason();
                debug!(error = %e, reason = %reason, "fetch failed");
                let mut s = state.lock().await;
                s.record_failure(url, &candidate.subject, &reason);
                FetchOutcome::Failed(reason)
            }
        };
        stats.record(&outcome, candidate.is_probe);
        outcome
    }
}
