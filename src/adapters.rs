use tidewatch_core::{
    builtin::{BroadcastNotifier, EphemeralPending, LogNotifier},
    config::{NotifyConfig, StorageConfig},
    Notification, NotificationSink, PendingError, PendingSet, PendingStore, PendingTx,
};
use tidewatch_redb::RedbPending;
use tracing::debug;

use crate::notify::WebhookNotifier;

/// Where pending txs are kept
#[derive(Clone)]
#[non_exhaustive]
pub enum StoreAdapter {
    Redb(RedbPending),
    Ephemeral(EphemeralPending),
}

impl StoreAdapter {
    pub fn open(config: &StorageConfig) -> Result<Self, PendingError> {
        match config {
            StorageConfig::Redb(redb) => {
                if let Some(parent) = redb.path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| PendingError::Internal(Box::new(e)))?;
                }

                debug!(path = %redb.path.display(), "opening redb pending store");
                let store = RedbPending::open(&redb.path, redb)?;

                Ok(Self::Redb(store))
            }
            StorageConfig::InMemory => Ok(Self::Ephemeral(EphemeralPending::new())),
        }
    }
}

impl PendingStore for StoreAdapter {
    fn read_all(&self) -> Result<PendingSet, PendingError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.read_all()?,
            StoreAdapter::Ephemeral(x) => x.read_all()?,
        };

        Ok(out)
    }

    fn get(&self, local_id: &str) -> Result<Option<PendingTx>, PendingError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.get(local_id)?,
            StoreAdapter::Ephemeral(x) => x.get(local_id)?,
        };

        Ok(out)
    }

    fn insert(&self, tx: PendingTx) -> Result<(), PendingError> {
        match self {
            StoreAdapter::Redb(x) => x.insert(tx)?,
            StoreAdapter::Ephemeral(x) => x.insert(tx)?,
        };

        Ok(())
    }

    fn remove(&self, local_id: &str) -> Result<bool, PendingError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.remove(local_id)?,
            StoreAdapter::Ephemeral(x) => x.remove(local_id)?,
        };

        Ok(out)
    }
}

impl From<RedbPending> for StoreAdapter {
    fn from(value: RedbPending) -> Self {
        Self::Redb(value)
    }
}

impl From<EphemeralPending> for StoreAdapter {
    fn from(value: EphemeralPending) -> Self {
        Self::Ephemeral(value)
    }
}

/// A single notification sink
#[derive(Clone)]
#[non_exhaustive]
pub enum NotifierAdapter {
    Log(LogNotifier),
    Broadcast(BroadcastNotifier),
    Webhook(WebhookNotifier),
}

impl NotificationSink for NotifierAdapter {
    fn notify(&self, notification: Notification) {
        match self {
            NotifierAdapter::Log(x) => x.notify(notification),
            NotifierAdapter::Broadcast(x) => x.notify(notification),
            NotifierAdapter::Webhook(x) => x.notify(notification),
        }
    }
}

/// Delivers every notification to all of its sinks.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<NotifierAdapter>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<NotifierAdapter>) -> Self {
        Self { sinks }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut sinks = vec![];

        if config.log {
            sinks.push(NotifierAdapter::Log(LogNotifier));
        }

        if let Some(url) = &config.webhook_url {
            let webhook = WebhookNotifier::new(url);
            debug!(url = webhook.url(), "webhook notifications enabled");
            sinks.push(NotifierAdapter::Webhook(webhook));
        }

        Self { sinks }
    }

    pub fn with(mut self, sink: NotifierAdapter) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutNotifier {
    fn notify(&self, notification: Notification) {
        if self.sinks.is_empty() {
            debug!(local_id = %notification.local_id, "no notification sinks configured");
            return;
        }

        for sink in self.sinks.iter() {
            sink.notify(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tidewatch_core::{FailureReason, TxHash};

    #[tokio::test]
    async fn fanout_reaches_every_sink() {
        let first = BroadcastNotifier::default();
        let second = BroadcastNotifier::default();

        let mut first_rx = first.subscribe();
        let mut second_rx = second.subscribe();

        let fanout = FanoutNotifier::default()
            .with(NotifierAdapter::Broadcast(first))
            .with(NotifierAdapter::Log(LogNotifier))
            .with(NotifierAdapter::Broadcast(second));

        fanout.notify(Notification::tx_pending_failed(
            "a",
            TxHash::new([1; 32]),
            FailureReason::NotMined,
        ));

        assert_eq!(first_rx.next().await.unwrap().local_id, "a");
        assert_eq!(second_rx.next().await.unwrap().local_id, "a");
    }

    #[test]
    fn config_selects_sinks() {
        let fanout = FanoutNotifier::from_config(&NotifyConfig {
            webhook_url: Some("http://localhost:9999/hook".into()),
            log: true,
        });

        assert_eq!(fanout.len(), 2);

        let silent = FanoutNotifier::from_config(&NotifyConfig {
            webhook_url: None,
            log: false,
        });

        assert!(silent.is_empty());
    }

    #[test]
    fn in_memory_backend_opens_empty() {
        let store = StoreAdapter::open(&StorageConfig::InMemory).unwrap();

        assert!(matches!(store, StoreAdapter::Ephemeral(_)));
        assert!(store.read_all().unwrap().is_empty());
    }
}
