//! Transient user-facing notifications.
//!
//! Notifying is fire-and-forget: nothing a notifier does can fail the caller.

use std::num::NonZeroUsize;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Shown for this long, then dismissed.
    pub duration: Duration,
    pub created_at: OffsetDateTime,
}

impl Notification {
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            severity,
            duration,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.created_at + self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed { id: Uuid },
}

/// Called inline by the code reporting an outcome; implementations must not
/// block or panic.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out to every subscriber and dismisses them after
/// their duration.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (sender, _) = broadcast::channel(capacity.get());
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let id = notification.id;
        let duration = notification.duration;

        info!(
            notification_id = %id,
            severity = notification.severity.as_str(),
            title = %notification.title,
            "Notification shown"
        );

        if self.sender.send(NotificationEvent::Shown(notification)).is_err() {
            debug!(notification_id = %id, "Notification had no subscribers");
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let sender = self.sender.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = sender.send(NotificationEvent::Dismissed { id });
                });
            }
            Err(err) => {
                warn!(
                    notification_id = %id,
                    error = %err,
                    "Auto-dismiss not scheduled: no async runtime"
                );
            }
        }
    }
}
