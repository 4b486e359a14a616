//! Reconciliation of the pending set against the chain.
//!
//! A sweep reads the pending set once, snapshots the chain height once and
//! then monitors every pending tx concurrently. Each monitor retries the
//! [`Prober`] with backoff until it reaches a verdict. Txs that failed to
//! land (reverted, never mined, or unresolved once the budget is spent) are
//! removed from the pending set and reported through the notification sink.
//! Successful txs are left alone; they're cleaned up by whatever confirms
//! them.

use std::{
    collections::HashSet,
    fmt::Display,
    sync::{Arc, Mutex, PoisonError},
};

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    backoff::{self, BackoffError, RetrySchedule, Step},
    config::MonitorConfig,
    BlockHeight, ChainClient, ChainError, FailureReason, LocalId, Notification, NotificationSink,
    PendingError, PendingStore, ProbeOutcome, Prober, TxHash,
};

/// How a single monitor settled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Mined without reverting; left for external confirmation
    Confirmed,

    /// Removed from the pending set
    Failed(FailureReason),

    /// Another monitor for the same id was already running
    Skipped,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("pending store error: {0}")]
    Store(#[from] PendingError),
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("can't read pending set: {0}")]
    Store(#[from] PendingError),

    #[error("can't fetch baseline height: {0}")]
    Chain(#[from] ChainError),
}

#[derive(Debug)]
enum RetryCause {
    NotFound,
    Network(ChainError),
}

impl Display for RetryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "tx not found yet"),
            Self::Network(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SweepReport {
    /// Height shared by txs without their own submission block
    pub baseline: Option<BlockHeight>,
    pub outcomes: Vec<(LocalId, Result<Disposition, MonitorError>)>,

    /// Set when the pending set or the baseline couldn't be read; in the
    /// latter case only txs with their own submission block were monitored
    pub error: Option<SweepError>,
}

impl SweepReport {
    fn aborted(error: SweepError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    fn count(&self, predicate: impl Fn(&Result<Disposition, MonitorError>) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, x)| predicate(x)).count()
    }

    pub fn confirmed(&self) -> usize {
        self.count(|x| matches!(x, Ok(Disposition::Confirmed)))
    }

    pub fn failed(&self) -> usize {
        self.count(|x| matches!(x, Ok(Disposition::Failed(_))))
    }

    pub fn skipped(&self) -> usize {
        self.count(|x| matches!(x, Ok(Disposition::Skipped)))
    }

    pub fn errored(&self) -> usize {
        self.count(|x| x.is_err())
    }

    pub fn disposition(&self, local_id: &str) -> Option<&Result<Disposition, MonitorError>> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == local_id)
            .map(|(_, x)| x)
    }
}

/// Ids with a monitor currently running
#[derive(Clone, Default)]
struct Inflight(Arc<Mutex<HashSet<LocalId>>>);

struct InflightClaim {
    inflight: Inflight,
    local_id: LocalId,
}

impl Inflight {
    fn claim(&self, local_id: &str) -> Option<InflightClaim> {
        let mut ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        if !ids.insert(local_id.to_owned()) {
            return None;
        }

        Some(InflightClaim {
            inflight: self.clone(),
            local_id: local_id.to_owned(),
        })
    }

    fn contains(&self, local_id: &str) -> bool {
        let ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        ids.contains(local_id)
    }
}

impl Drop for InflightClaim {
    fn drop(&mut self) {
        let mut ids = self
            .inflight
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        ids.remove(&self.local_id);
    }
}

#[derive(Clone)]
pub struct Reconciler<C, S, N> {
    chain: C,
    prober: Prober<C>,
    store: S,
    notifier: N,
    schedule: RetrySchedule,
    inflight: Inflight,
}

impl<C, S, N> Reconciler<C, S, N>
where
    C: ChainClient,
    S: PendingStore,
    N: NotificationSink,
{
    pub fn new(chain: C, store: S, notifier: N, config: &MonitorConfig) -> Self {
        Self {
            prober: Prober::new(chain.clone(), config.window_blocks),
            chain,
            store,
            notifier,
            schedule: RetrySchedule::from(&config.retry),
            inflight: Inflight::default(),
        }
    }

    pub fn with_schedule(self, schedule: RetrySchedule) -> Self {
        Self { schedule, ..self }
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    pub fn is_monitoring(&self, local_id: &str) -> bool {
        self.inflight.contains(local_id)
    }

    pub async fn monitor_one(
        &self,
        baseline: BlockHeight,
        local_id: &str,
        tx_hash: &TxHash,
    ) -> Result<Disposition, MonitorError> {
        self.monitor_one_with(&self.schedule, baseline, local_id, tx_hash)
            .await
    }

    /// Monitors a single tx until it settles, using a custom schedule.
    #[instrument(skip_all, fields(local_id = %local_id, tx.hash = %tx_hash, baseline = baseline))]
    pub async fn monitor_one_with(
        &self,
        schedule: &RetrySchedule,
        baseline: BlockHeight,
        local_id: &str,
        tx_hash: &TxHash,
    ) -> Result<Disposition, MonitorError> {
        let Some(_claim) = self.inflight.claim(local_id) else {
            debug!("monitor already in flight");
            return Ok(Disposition::Skipped);
        };

        let verdict = backoff::retry(schedule, move |attempt| async move {
            debug!(attempt, "probing tx");

            match self.prober.probe(baseline, tx_hash).await {
                Ok(ProbeOutcome::Success) => Step::Ready(None),
                Ok(ProbeOutcome::Reverted) => Step::Ready(Some(FailureReason::Reverted)),
                Ok(ProbeOutcome::NotMined) => Step::Ready(Some(FailureReason::NotMined)),
                Ok(ProbeOutcome::Undetermined) => Step::Retry(RetryCause::NotFound),
                Err(err) if err.is_transient() => Step::Retry(RetryCause::Network(err)),
                Err(err) => Step::Abort(err),
            }
        })
        .await;

        let reason = match verdict {
            Ok(None) => {
                debug!("tx mined, leaving it for confirmation");
                return Ok(Disposition::Confirmed);
            }
            Ok(Some(reason)) => reason,
            Err(BackoffError::Exhausted { attempts, last }) => {
                warn!(attempts, %last, "retries exhausted");
                FailureReason::Exhausted { attempts }
            }
            Err(BackoffError::Aborted(err)) => {
                error!(%err, "probe failed, tx stays pending");
                return Err(err.into());
            }
        };

        self.fail(local_id, *tx_hash, reason)
    }

    fn fail(
        &self,
        local_id: &str,
        tx_hash: TxHash,
        reason: FailureReason,
    ) -> Result<Disposition, MonitorError> {
        // only whoever actually removed the entry gets to notify
        if self.store.remove(local_id)? {
            warn!(%reason, "pending tx failed");

            self.notifier.notify(Notification::tx_pending_failed(
                local_id,
                tx_hash,
                reason.clone(),
            ));
        } else {
            debug!(%reason, "pending tx already removed");
        }

        Ok(Disposition::Failed(reason))
    }

    /// Monitors every pending tx concurrently and waits for all of them.
    ///
    /// Never fails: problems are logged and collected in the report.
    #[instrument(skip_all)]
    pub async fn sweep(&self) -> SweepReport {
        let pending = match self.store.read_all() {
            Ok(x) => x,
            Err(err) => {
                error!(%err, "can't read pending set");
                return SweepReport::aborted(err.into());
            }
        };

        if pending.is_empty() {
            debug!("no pending txs");
            return SweepReport::default();
        }

        let (baseline, error) = match self.chain.block_height().await {
            Ok(x) => (Some(x), None),
            Err(err) => {
                error!(%err, "can't fetch baseline height");
                (None, Some(SweepError::from(err)))
            }
        };

        // without a snapshot, only txs carrying their own submission block
        // can be monitored
        let runnable: Vec<_> = pending
            .into_values()
            .filter_map(|tx| Some((tx.submitted_block.or(baseline)?, tx)))
            .collect();

        if runnable.is_empty() {
            return SweepReport {
                baseline,
                outcomes: vec![],
                error,
            };
        }

        info!(pending = runnable.len(), ?baseline, "sweeping pending txs");

        let monitors = runnable.into_iter().map(move |(from, tx)| async move {
            let result = self.monitor_one(from, &tx.local_id, &tx.tx_hash).await;
            (tx.local_id, result)
        });

        let report = SweepReport {
            baseline,
            outcomes: join_all(monitors).await,
            error,
        };

        for (local_id, result) in report.outcomes.iter() {
            if let Err(err) = result {
                warn!(local_id = %local_id, %err, "monitor failed");
            }
        }

        info!(
            confirmed = report.confirmed(),
            failed = report.failed(),
            skipped = report.skipped(),
            errored = report.errored(),
            "sweep finished"
        );

        report
    }
}
