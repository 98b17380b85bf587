//! Batch scheduler: fixed-size concurrency waves with checkpoint barriers.
//!
//! The ordered candidate list is split into contiguous batches. Every fetch
//! in a batch is spawned as its own task; the scheduler waits for the whole
//! batch (no partial early exit), checkpoints the state record, and logs
//! cumulative this-run counts. Checkpoints happen only at batch boundaries,
//! so a crash loses at most one batch's worth of new attempts - those URLs
//! stay unseen and are re-attempted on the next run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::candidates::Candidate;
use crate::fetch::{FetchEngine, RunStats};
use crate::state::{SharedState, StateError, StateStore};

/// Runs every candidate through the engine in fixed-size batches, saving the
/// state record after each batch.
///
/// Individual fetch failures never abort the batch or the run; a panicked
/// fetch task is logged and the batch continues.
///
/// # Errors
///
/// Returns [`StateError`] only if a checkpoint save fails - at that point
/// resumability is broken and continuing would silently widen the crash
/// window.
pub async fn run_batches(
    engine: &Arc<FetchEngine>,
    candidates: Vec<Candidate>,
    referer: &str,
    state: &SharedState,
    store: &StateStore,
    stats: &Arc<RunStats>,
    batch_size: usize,
) -> Result<(), StateError> {
    let total = candidates.len();
    let batch_size = batch_size.max(1);
    let mut processed = 0usize;
    let mut candidates = candidates.into_iter();

    loop {
        let batch: Vec<Candidate> = candidates.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        let batch_len = batch.len();

        let mut handles = Vec::with_capacity(batch_len);
        for candidate in batch {
            let engine = Arc::clone(engine);
            let state = Arc::clone(state);
            let stats = Arc::clone(stats);
            let referer = referer.to_string();
            handles.push(tokio::spawn(async move {
                engine.fetch_one(&candidate, &referer, &state, &stats).await;
            }));
        }

        // Strict barrier: the checkpoint happens-after every fetch in this
        // batch and happens-before the next batch starts.
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "fetch task panicked");
            }
        }

        {
            let mut s = state.lock().await;
            store.save(&mut s).await?;
        }

        processed += batch_len;
        info!(
            processed,
            total,
            percent = percent_of(processed, total),
            downloaded = stats.downloaded(),
            found = stats.found(),
            failed = stats.failed(),
            "batch checkpoint"
        );
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn percent_of(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}
