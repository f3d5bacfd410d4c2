use std::collections::VecDeque;

use tokio::sync::Mutex;
use uuid::Uuid;

/// Whether a notification reports a success or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The store accepted the write.
    Success,
    /// A read or write failed.
    Error,
}

/// Dismissible message shown to users after a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Random identifier used for dismissal.
    pub id: Uuid,
    /// Success or failure.
    pub kind: NotificationKind,
    /// Text shown to the user.
    pub message: String,
}

/// Bounded queue of pending notifications; the oldest entry is dropped when full.
pub struct NotificationQueue {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl NotificationQueue {
    /// Empty queue keeping at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Queue a new notification and return it.
    pub async fn push(&self, kind: NotificationKind, message: impl Into<String>) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
        };

        let mut entries = self.entries.lock().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification.clone());
        notification
    }

    /// Pending notifications, oldest first.
    pub async fn list(&self) -> Vec<Notification> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Remove the notification with `id`, returning whether it was pending.
    pub async fn dismiss(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }
}
