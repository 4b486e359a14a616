//! Built-in notification sinks.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{Notification, NotificationSink};

/// Reports notifications through the log and nowhere else.
#[derive(Clone, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        warn!(
            local_id = %notification.local_id,
            tx.hash = %notification.tx_hash,
            reason = %notification.reason,
            "pending transaction failed"
        );
    }
}

/// Fans notifications out to any number of in-process subscribers.
#[derive(Clone)]
pub struct BroadcastNotifier {
    updates: broadcast::Sender<Notification>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self { updates }
    }

    pub fn subscribe(&self) -> NotificationStream {
        NotificationStream {
            inner: BroadcastStream::new(self.updates.subscribe()),
        }
    }
}

impl NotificationSink for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        if self.updates.send(notification).is_err() {
            debug!("no notification receivers");
        }
    }
}

pub struct NotificationStream {
    inner: BroadcastStream<Notification>,
}

impl futures_core::Stream for NotificationStream {
    type Item = Notification;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use futures_util::StreamExt;

        loop {
            match self.inner.poll_next_unpin(cx) {
                std::task::Poll::Ready(Some(Ok(x))) => return std::task::Poll::Ready(Some(x)),
                std::task::Poll::Ready(Some(Err(err))) => {
                    warn!(%err, "notification subscriber lagged");
                }
                std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}
