//! Platform notification abstraction.
//!
//! The scheduler only decides what to schedule. Delivery belongs to a
//! [`Notifier`]; [`OutboxNotifier`] is the local implementation, which keeps
//! pending notifications in the database until the daemon delivers them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::storage::Storage;

/// Errors reported by a notifier.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// A notification could not be scheduled.
    #[error("failed to schedule notification {id}: {message}")]
    ScheduleFailed {
        /// Notification id.
        id: i64,
        /// What went wrong.
        message: String,
    },

    /// Notifications could not be cancelled.
    #[error("failed to cancel notifications: {0}")]
    CancelFailed(String),

    /// The user has not granted notification permission.
    #[error("notification permission denied")]
    PermissionDenied,

    /// The notification backend is unavailable.
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Result type for notifier operations.
pub type Result<T> = std::result::Result<T, NotifierError>;

/// A timed notification handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Locally unique id, used to cancel it later.
    pub id: i64,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// When the notification should be shown.
    pub fires_at: DateTime<Utc>,
    /// Document the notification is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
}

/// A platform capable of showing timed notifications.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Schedule `notification` for its firing instant.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the notification.
    async fn schedule(&self, notification: &Notification) -> Result<()>;

    /// Cancel the notifications with the given ids. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot cancel.
    async fn cancel(&self, ids: &[i64]) -> Result<()>;

    /// Ids of every notification still waiting to fire.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot be queried.
    async fn pending(&self) -> Result<Vec<i64>>;
}

/// Notifier backed by the `outbox` table.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    storage: Arc<Storage>,
}

impl OutboxNotifier {
    /// Create a notifier writing to `storage`.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Remove and return every notification due at `now`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Unavailable`] if the outbox cannot be read.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        self.storage
            .take_due_notifications(now)
            .map_err(|e| NotifierError::Unavailable(e.to_string()))
    }

    /// Every pending notification, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Unavailable`] if the outbox cannot be read.
    pub fn list(&self) -> Result<Vec<Notification>> {
        self.storage
            .outbox()
            .map_err(|e| NotifierError::Unavailable(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for OutboxNotifier {
    async fn schedule(&self, notification: &Notification) -> Result<()> {
        self.storage
            .enqueue_notification(notification)
            .map_err(|e| NotifierError::ScheduleFailed {
                id: notification.id,
                message: e.to_string(),
            })?;
        debug!(
            "Queued notification {} for {}",
            notification.id, notification.fires_at
        );
        Ok(())
    }

    async fn cancel(&self, ids: &[i64]) -> Result<()> {
        self.storage
            .remove_notifications(ids)
            .map(|_| ())
            .map_err(|e| NotifierError::CancelFailed(e.to_string()))
    }

    async fn pending(&self) -> Result<Vec<i64>> {
        self.storage
            .outbox()
            .map(|notifications| notifications.into_iter().map(|n| n.id).collect())
            .map_err(|e| NotifierError::Unavailable(e.to_string()))
    }
}
