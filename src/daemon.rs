//! Periodic sweeps until shutdown.

use std::time::Duration;

use tidewatch_core::{ChainClient, NotificationSink, PendingStore, Reconciler};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs a sweep every `every` until `exit` is cancelled.
///
/// Each tick spawns its own sweep, so a sweep stuck in long backoff waits
/// doesn't hold back txs tracked after it started. Overlapping sweeps
/// don't double-monitor a tx; the reconciler skips ids already in flight.
pub async fn run<C, S, N>(
    reconciler: Reconciler<C, S, N>,
    every: Duration,
    exit: CancellationToken,
) where
    C: ChainClient,
    S: PendingStore,
    N: NotificationSink,
{
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sweeps = JoinSet::new();

    info!(interval_secs = every.as_secs(), "reconciliation daemon started");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let reconciler = reconciler.clone();
                sweeps.spawn(async move { reconciler.sweep().await });
                debug!(running = sweeps.len(), "sweep spawned");
            }
            Some(done) = sweeps.join_next() => {
                match done {
                    Ok(report) => debug!(
                        failed = report.failed(),
                        errored = report.errored(),
                        "sweep task done"
                    ),
                    Err(err) => error!(%err, "sweep task crashed"),
                }
            }
            _ = exit.cancelled() => {
                debug!("exit requested");
                break;
            }
        }
    }

    if !sweeps.is_empty() {
        // unresolved txs stay in the pending set for the next run
        warn!(running = sweeps.len(), "aborting in-flight sweeps");
        sweeps.shutdown().await;
    }

    info!("reconciliation daemon stopped");
}
