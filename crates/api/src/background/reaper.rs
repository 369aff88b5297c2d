//! Periodic cleanup of stale maps.
//!
//! Maps idle past their per-map `delete_after_days` are soft-deleted, and
//! maps soft-deleted for the same window again are removed for good. Runs
//! on a fixed interval until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mapforge_core::storage::MapStorage;

/// Run the map reaper loop until `cancel` is triggered.
pub async fn run(storage: Arc<dyn MapStorage>, interval_secs: u64, cancel: CancellationToken) {
    tracing::info!(interval_secs, "Map reaper started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Map reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match storage.purge_expired().await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::info!(purged, "Map reaper: purged stale maps");
                        } else {
                            tracing::debug!("Map reaper: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Map reaper: sweep failed");
                    }
                }
            }
        }
    }
}
