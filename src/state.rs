//! Durable state record for resumable mirror runs.
//!
//! The record survives process restarts and is the sole source of truth for
//! later inspection: which URLs were ever attempted, which downloaded, which
//! failed (and why), and per-subject cumulative counters.
//!
//! # Invariants
//!
//! - `seen ⊇ downloaded ∪ keys(failed)` after every mutation.
//! - A URL in `seen` is never re-attempted unless the record is cleared by an
//!   external actor (equivalent to starting from an empty state).
//! - Cumulative per-subject counters never decrease for the lifetime of the
//!   record.
//!
//! # Concurrency
//!
//! Fetch tasks run as real parallel tokio tasks, so the state lives behind
//! [`SharedState`] and every mutation happens inside one critical section.
//! The mutation helpers ([`MirrorState::record_download`],
//! [`MirrorState::record_failure`]) update set membership and counters
//! together so the partition invariant cannot be observed half-applied.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Shared handle to the in-memory state. All mutation goes through the lock.
pub type SharedState = Arc<Mutex<MirrorState>>;

/// Errors from persisting the state record. Loading never fails: a missing or
/// corrupt record degrades to an empty state with a logged warning.
#[derive(Debug, Error)]
pub enum StateError {
    /// Writing or renaming the record file failed.
    #[error("failed to write state record {path}: {source}")]
    Io {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The in-memory state could not be serialized.
    #[error("failed to serialize state record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-subject cumulative progress counters.
///
/// The `_total` counters accumulate across restarts; `downloaded` and `found`
/// are this-run values kept for compatibility with older readers of the
/// record and are unreliable as cumulative truth after a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectProgress {
    /// Size of the candidate space in the most recent pass.
    #[serde(default)]
    pub total_urls: u64,
    /// Lifetime successful downloads for this subject.
    #[serde(default)]
    pub downloaded_total: u64,
    /// Lifetime recorded failures for this subject.
    #[serde(default)]
    pub failed_total: u64,
    /// Lifetime attempted candidates for this subject.
    #[serde(default)]
    pub seen_total: u64,
    /// Whether the most recent pass ran all batches to completion.
    #[serde(default)]
    pub completed: bool,
    /// Timestamp of the last mutation touching this subject.
    #[serde(default)]
    pub timestamp: String,
    /// This-run downloads (legacy field).
    #[serde(default)]
    pub downloaded: u64,
    /// This-run newly found probes (legacy field).
    #[serde(default)]
    pub found: u64,
}

/// The full durable record: three URL collections, per-subject progress, and
/// a last-update timestamp.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MirrorState {
    /// URLs whose content was successfully persisted to storage.
    #[serde(rename = "downloaded_files", default)]
    pub downloaded: HashSet<String>,
    /// URL to failure-reason tag (`"404"`, decimal status, `"exception"`,
    /// `"content-mismatch"`).
    #[serde(rename = "failed_urls", default)]
    pub failed: HashMap<String, String>,
    /// Per-subject cumulative counters.
    #[serde(default)]
    pub progress: HashMap<String, SubjectProgress>,
    /// Every URL ever attempted, across all runs.
    #[serde(rename = "seen_urls", default)]
    pub seen: HashSet<String>,
    /// Timestamp of the last successful save.
    #[serde(default)]
    pub last_update: String,
}

impl MirrorState {
    /// Idempotent upsert of a subject's progress entry.
    ///
    /// Initializes counters to zero only when the entry is absent, updates
    /// `total_urls` when supplied, and never decreases existing cumulative
    /// counters.
    pub fn ensure_subject_progress(&mut self, key: &str, total_urls: Option<u64>) {
        let entry = self.progress.entry(key.to_string()).or_default();
        if let Some(total) = total_urls {
            entry.total_urls = total;
        }
        if entry.timestamp.is_empty() {
            entry.timestamp = now_timestamp();
        }
    }

    /// Records a successful download: set membership, subject counters, and
    /// the subject timestamp, in one step.
    ///
    /// Counters move only when the insert actually adds an entry, so
    /// re-recording an already-downloaded URL (the out-of-band-deletion
    /// re-fetch path) cannot drift the totals above the set sizes.
    pub fn record_download(&mut self, url: &str, subject: &str) {
        let newly_downloaded = self.downloaded.insert(url.to_string());
        let newly_seen = self.seen.insert(url.to_string());
        self.ensure_subject_progress(subject, None);
        if let Some(p) = self.progress.get_mut(subject) {
            if newly_downloaded {
                p.downloaded_total += 1;
            }
            if newly_seen {
                p.seen_total += 1;
            }
            p.timestamp = now_timestamp();
        }
    }

    /// Records a permanent-for-this-run failure with its reason tag.
    ///
    /// Same counting rule as [`record_download`](Self::record_download): a
    /// URL already in the map or the seen set does not increment again.
    pub fn record_failure(&mut self, url: &str, subject: &str, reason: &str) {
        let newly_failed = self
            .failed
            .insert(url.to_string(), reason.to_string())
            .is_none();
        let newly_seen = self.seen.insert(url.to_string());
        self.ensure_subject_progress(subject, None);
        if let Some(p) = self.progress.get_mut(subject) {
            if newly_failed {
                p.failed_total += 1;
            }
            if newly_seen {
                p.seen_total += 1;
            }
            p.timestamp = now_timestamp();
        }
    }

    /// Marks the start of a subject pass: sets the candidate-space total and
    /// forces `completed = false` so a stale success flag from an earlier run
    /// never masks an unfinished restart.
    pub fn begin_subject_pass(&mut self, key: &str, total_urls: u64) {
        self.ensure_subject_progress(key, Some(total_urls));
        if let Some(p) = self.progress.get_mut(key) {
            p.completed = false;
            p.timestamp = now_timestamp();
        }
    }

    /// Marks a subject pass complete and records the this-run legacy counts.
    pub fn complete_subject_pass(&mut self, key: &str, run_downloaded: u64, run_found: u64) {
        self.ensure_subject_progress(key, None);
        if let Some(p) = self.progress.get_mut(key) {
            p.completed = true;
            p.downloaded = run_downloaded;
            p.found = run_found;
            p.timestamp = now_timestamp();
        }
    }
}

/// Owner of the on-disk state record.
///
/// One running engine instance exclusively owns the record; collaborators may
/// only read it or clear it out-of-band (which this code treats the same as
/// a missing record).
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store for the record at `path`. Nothing is read until
    /// [`load`](Self::load).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the record path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record from disk.
    ///
    /// A missing file yields an empty state. A malformed or unreadable file
    /// is recovered as an empty state with a logged warning - state
    /// corruption is never fatal. Records written before `seen_urls` existed
    /// are backfilled with `downloaded ∪ keys(failed)`.
    pub async fn load(&self) -> MirrorState {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state record, starting empty");
                return MirrorState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read state record, starting empty");
                return MirrorState::default();
            }
        };

        let mut state: MirrorState = match serde_json::from_str(&text) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed state record, starting empty");
                return MirrorState::default();
            }
        };

        // Backward compatibility: older records had no seen_urls.
        if state.seen.is_empty() {
            state.seen.extend(state.downloaded.iter().cloned());
            state.seen.extend(state.failed.keys().cloned());
        }

        info!(
            downloaded = state.downloaded.len(),
            failed = state.failed.len(),
            seen = state.seen.len(),
            subjects = state.progress.len(),
            "state record loaded"
        );
        state
    }

    /// Atomically rewrites the full record.
    ///
    /// Serializes to a temp file next to the target and renames it into
    /// place, so a crash mid-write leaves the previous record intact. Updates
    /// `last_update` before writing.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if serialization or the write/rename fails.
    pub async fn save(&self, state: &mut MirrorState) -> Result<(), StateError> {
        state.last_update = now_timestamp();
        let bytes = serde_json::to_vec_pretty(state)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StateError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StateError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "state record saved");
        Ok(())
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
