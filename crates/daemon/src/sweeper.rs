use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::database::{Database, Namespace, StoreError};
use crate::models::PendingAllocation;

/// Cadence of the expiry sweep.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Delete every reservation whose deadline has passed at `now`.
///
/// A failed delete is logged and skipped.
pub async fn sweep_once(db: &Database, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
    let entries: Vec<(String, PendingAllocation)> = db.iterate(Namespace::Pending).await?;
    let mut report = SweepReport::default();

    for (id, pending) in entries {
        if !pending.is_expired(now) {
            continue;
        }

        match db.delete(Namespace::Pending, &id).await {
            Ok(()) => {
                tracing::info!(id = %id, "item was expired");
                report.removed += 1;
            }
            Err(e) => {
                tracing::error!(id = %id, error = %e, "failed to remove expired item");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run [`sweep_once`] every `period` until shutdown is signalled.
pub fn spawn(db: Database, period: Duration, mut shutdown_rx: watch::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep_once(&db, Utc::now()).await {
                        Ok(report) if report.removed > 0 || report.failed > 0 => {
                            tracing::info!(
                                removed = report.removed,
                                failed = report.failed,
                                "expiry sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("expiry sweeper stopping");
                    return;
                }
            }
        }
    })
}
