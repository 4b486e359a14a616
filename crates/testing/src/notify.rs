use std::sync::{Arc, Mutex};

use tidewatch_core::{Notification, NotificationSink};

/// Keeps every notification it receives, for later inspection.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn count_for(&self, local_id: &str) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|x| x.local_id == local_id)
            .count()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}
