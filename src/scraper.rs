//! Per-subject orchestration.
//!
//! [`Mirror`] owns the engine, the HTTP client, and the state store, and
//! drives each requested subject through discovery-page fetch → candidate
//! generation → batched retrieval → completion marking. A failed discovery
//! fetch aborts only that subject's pass; an unrecognized subject key is
//! logged and skipped; nothing short of external termination stops the run.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::candidates::{generate_candidates, parse_page_links};
use crate::config::MirrorConfig;
use crate::fetch::{EngineError, FetchEngine, HttpClient, RunStats};
use crate::scheduler::run_batches;
use crate::state::{SharedState, StateError, StateStore};

/// Errors from orchestration setup and checkpointing.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The storage root could not be created.
    #[error("failed to create storage root {path}: {source}")]
    StorageRoot {
        /// The storage root path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A state checkpoint failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Engine construction rejected the configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The mirror orchestrator.
pub struct Mirror {
    config: MirrorConfig,
    client: HttpClient,
    engine: Arc<FetchEngine>,
    store: StateStore,
    state: SharedState,
    storage_root: PathBuf,
}

impl Mirror {
    /// Builds the orchestrator: loads (or recovers) the state record and
    /// constructs the engine.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Engine`] if the configured concurrency is out
    /// of range. State corruption is not an error; it degrades to an empty
    /// state.
    pub async fn new(
        config: MirrorConfig,
        state_file: PathBuf,
        storage_root: PathBuf,
    ) -> Result<Self, MirrorError> {
        let store = StateStore::new(state_file);
        let state: SharedState = Arc::new(Mutex::new(store.load().await));
        let client = HttpClient::new(&config);
        let engine = Arc::new(FetchEngine::new(
            client.clone(),
            &config,
            storage_root.clone(),
        )?);

        Ok(Self {
            config,
            client,
            engine,
            store,
            state,
            storage_root,
        })
    }

    /// Shared handle to the in-memory state (read-only use expected outside
    /// the engine; all mutation goes through the fetch path).
    #[must_use]
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Runs a full pass over the requested subject keys, or over the whole
    /// catalog when `subjects` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] if the storage root cannot be created or a
    /// state checkpoint fails. Per-subject failures are logged and skipped.
    pub async fn run(&self, subjects: &[String]) -> Result<(), MirrorError> {
        info!(
            base_url = %self.config.base_url,
            concurrency = self.config.concurrency,
            batch_size = self.config.batch_size,
            storage_root = %self.storage_root.display(),
            "mirror run starting"
        );

        tokio::fs::create_dir_all(&self.storage_root)
            .await
            .map_err(|source| MirrorError::StorageRoot {
                path: self.storage_root.clone(),
                source,
            })?;

        let targets: Vec<String> = if subjects.is_empty() {
            self.config.subjects.iter().map(|s| s.key.clone()).collect()
        } else {
            subjects.to_vec()
        };

        for key in &targets {
            if self.config.subject(key).is_none() {
                warn!(subject = %key, "unknown subject, skipping");
                continue;
            }
            self.mirror_subject(key).await?;
        }

        let (downloaded, failed) = {
            let s = self.state.lock().await;
            (s.downloaded.len(), s.failed.len())
        };
        info!(
            downloaded_lifetime = downloaded,
            failed_lifetime = failed,
            "mirror run complete"
        );
        Ok(())
    }

    /// Runs one subject's pass end to end.
    ///
    /// A discovery-page failure aborts the pass with no progress mutation -
    /// there is no combinatorial fallback, because without the page the
    /// non-probe half of the candidate space is unknown and the pass would
    /// under-count `total_urls`.
    async fn mirror_subject(&self, key: &str) -> Result<(), MirrorError> {
        // Subject presence is checked by the caller.
        let name = self
            .config
            .subject(key)
            .map_or_else(|| key.to_string(), |s| s.name.clone());
        info!(subject = %key, name = %name, "starting subject pass");

        let referer = self.config.discovery_url(key);
        let html = match self.client.fetch_page(&referer).await {
            Ok(html) => html,
            Err(e) => {
                error!(subject = %key, error = %e, "discovery page fetch failed, aborting subject pass");
                return Ok(());
            }
        };

        let parsed = parse_page_links(&html, key, &self.config);
        info!(subject = %key, parsed = parsed.len(), "discovery links parsed");

        let candidates = generate_candidates(key, parsed, &self.config);
        let total = candidates.len();
        info!(subject = %key, total, "candidate space generated");

        let stats = Arc::new(RunStats::new());
        {
            let mut s = self.state.lock().await;
            s.begin_subject_pass(key, u64::try_from(total).unwrap_or(u64::MAX));
            self.store.save(&mut s).await?;
        }

        run_batches(
            &self.engine,
            candidates,
            &referer,
            &self.state,
            &self.store,
            &stats,
            self.config.batch_size,
        )
        .await?;

        {
            let mut s = self.state.lock().await;
            s.complete_subject_pass(key, stats.downloaded(), stats.found());
            self.store.save(&mut s).await?;
        }

        info!(
            subject = %key,
            downloaded = stats.downloaded(),
            found = stats.found(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "subject pass complete"
        );
        Ok(())
    }
}
