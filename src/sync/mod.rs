//! Background refresh of cached exchange snapshots.
//!
//! The [`RefreshScheduler`] emits ticks, the refresh loop turns each tick into
//! a cycle, and the [`RefreshWorker`] re-fetches every cached base currency
//! concurrently on its own task. Results are written back to the store here,
//! on the caller's side of the worker boundary.

pub mod scheduler;
pub mod worker;

pub use scheduler::{
    DEFAULT_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL, RefreshScheduler, Tick,
};
pub use worker::{RefreshFailure, RefreshReport, RefreshWorker};

use crate::core::error::Result;
use crate::store::PersistentStore;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Refreshes every stored snapshot once and persists the fresh ones.
///
/// A snapshot that cannot be written is moved to `failed`; the cycle errors
/// only when fetched snapshots exist and none of them could be stored.
pub async fn run_refresh_cycle(
    store: &PersistentStore,
    worker: &RefreshWorker,
) -> Result<RefreshReport> {
    let snapshots = store.get_all_snapshots().await?;
    if snapshots.is_empty() {
        debug!("Nothing cached yet, skipping refresh");
        return Ok(RefreshReport::default());
    }

    let fetched = worker.refresh_all(snapshots).await?;
    let mut report = RefreshReport {
        refreshed: Vec::with_capacity(fetched.refreshed.len()),
        failed: fetched.failed,
    };
    let mut last_error = None;
    for snapshot in fetched.refreshed {
        match store.upsert_snapshot(&snapshot).await {
            Ok(()) => report.refreshed.push(snapshot),
            Err(e) => {
                warn!(
                    base = snapshot.base_currency(),
                    error = %e,
                    "Could not store refreshed rates"
                );
                report.failed.push(RefreshFailure {
                    base_currency: snapshot.base_currency().to_string(),
                    reason: e.to_string(),
                });
                last_error = Some(e);
            }
        }
    }
    // Only a cycle that could not write anything counts as failed
    if report.refreshed.is_empty()
        && let Some(e) = last_error
    {
        return Err(e);
    }
    info!(
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        "Refresh cycle complete"
    );
    Ok(report)
}

/// Runs a refresh cycle for every tick until the tick stream closes. A failed
/// cycle is logged and the loop waits for the next tick.
pub fn spawn_refresh_loop(
    mut ticks: broadcast::Receiver<Tick>,
    store: Arc<PersistentStore>,
    worker: Arc<RefreshWorker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match ticks.recv().await {
                Ok(tick) => debug!(sequence = tick.sequence, "Refresh tick received"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Refresh loop fell behind, coalescing ticks");
                }
                Err(RecvError::Closed) => break,
            }
            if let Err(e) = run_refresh_cycle(&store, &worker).await {
                error!(error = %e, "Refresh cycle failed");
            }
        }
        debug!("Refresh loop finished");
    })
}
