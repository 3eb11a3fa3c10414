//! Background pruning of payment records that never settled.

use std::time::Duration;

use super::AppState;
use crate::prelude::unix_now;

/// Run the cleanup loop indefinitely
pub async fn cleanup_loop(state: AppState, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        cleanup_expired(&state).await;
    }
}

/// Perform a single cleanup sweep, returning the number of records removed
async fn cleanup_expired(state: &AppState) -> usize {
    let cutoff = unix_now().saturating_sub(state.retention.as_secs());
    let removed = state.gate.tracker().prune(cutoff).await;

    if removed > 0 {
        let remaining = state.gate.tracker().len().await;
        tracing::info!(removed, remaining, "Cleanup completed");
    }
    removed
}
