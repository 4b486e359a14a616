//! Out-of-process notification delivery.

use std::{sync::Arc, time::Duration};

use tidewatch_core::{Notification, NotificationSink};
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs each notification as JSON to a fixed URL.
///
/// Delivery happens on a spawned task; failures are logged and dropped.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Arc<str>,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn deliver(http: reqwest::Client, url: Arc<str>, notification: Notification) {
        let local_id = notification.local_id.clone();

        let result = http
            .post(&*url)
            .json(&notification)
            .send()
            .await
            .and_then(|x| x.error_for_status());

        match result {
            Ok(_) => debug!(%local_id, "webhook delivered"),
            Err(err) => warn!(%local_id, %err, "webhook delivery failed"),
        }
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(local_id = %notification.local_id, "no runtime for webhook delivery");
            return;
        };

        runtime.spawn(Self::deliver(
            self.http.clone(),
            self.url.clone(),
            notification,
        ));
    }
}
