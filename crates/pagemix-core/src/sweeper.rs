//! Periodic reclamation of expired store entries
//!
//! The sweeper runs on its own tokio task and touches the store only through
//! [`DocumentStore::sweep`], on the blocking pool so filesystem scans never
//! stall request handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::store::DocumentStore;

/// Start sweeping `store` every `period`, removing entries older than `ttl`
///
/// The first pass runs one `period` after the call. The task runs until it is
/// aborted or the runtime shuts down.
pub fn spawn_sweeper(store: Arc<DocumentStore>, period: Duration, ttl: Duration) -> JoinHandle<()> {
    tracing::info!(
        period_secs = period.as_secs_f64(),
        ttl_secs = ttl.as_secs_f64(),
        "Starting document sweeper"
    );

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let store = Arc::clone(&store);
            let pass = tokio::task::spawn_blocking(move || store.sweep(Utc::now(), ttl)).await;

            match pass {
                Ok(Ok(report)) => {
                    tracing::debug!(
                        scanned = report.scanned,
                        removed = report.removed,
                        "Sweep pass complete"
                    );
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "Sweep pass failed"),
                Err(e) => tracing::error!(error = %e, "Sweep task panicked"),
            }
        }
    })
}
