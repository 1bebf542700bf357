//! Background task that deletes expired session rows.

use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::ShutdownSignal;

/// Delete expired sessions once, returning the number removed.
pub async fn sweep_sessions(repos: &dyn RepositoryProvider) -> DomainResult<u64> {
    let removed = repos.sessions().sweep_expired().await?;
    if removed > 0 {
        metrics::counter!("sessions_swept_total").increment(removed);
        info!(removed, "Expired sessions swept");
    } else {
        debug!("No expired sessions");
    }
    Ok(removed)
}

/// Start the session sweep background task.
pub fn start_session_sweep_task(
    repos: Arc<dyn RepositoryProvider>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "🧹 Session sweep task started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = sweep_sessions(repos.as_ref()).await {
                        warn!(error = %e, "Session sweep error");
                    }
                }
                _ = shutdown.wait() => {
                    info!("🧹 Session sweep task shutting down");
                    break;
                }
            }
        }

        info!("🧹 Session sweep task stopped");
    });
}
