//! Notification service.

use serde::Serialize;
use sosmed_common::{AppError, AppResult, Identity};
use sosmed_db::repositories::{NotificationRepository, NotificationView};

/// Number of notifications returned by [`NotificationService::list`].
pub const NOTIFICATION_PAGE_SIZE: u64 = 5;

/// The caller's newest notifications.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationView>,
}

impl NotificationPage {
    /// User-facing summary message.
    #[must_use]
    pub fn message(&self) -> String {
        if self.notifications.is_empty() {
            "No notifications yet".to_string()
        } else {
            format!("you have {} notifications", self.notifications.len())
        }
    }
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self { notification_repo }
    }

    /// Newest notifications addressed to the caller.
    pub async fn list(&self, identity: &Identity) -> AppResult<NotificationPage> {
        let notifications = self
            .notification_repo
            .list_for_receiver(identity.user_id(), NOTIFICATION_PAGE_SIZE)
            .await?;

        Ok(NotificationPage { notifications })
    }

    /// Mark one of the caller's notifications as read.
    ///
    /// A notification addressed to someone else is reported exactly like a
    /// missing one.
    pub async fn mark_read(&self, identity: &Identity, notification_id: &str) -> AppResult<()> {
        if self
            .notification_repo
            .mark_read(notification_id, identity.user_id())
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound("notification not found".to_string()))
        }
    }
}
