//! Database repositories.

mod feed;
mod following;
mod notification;
mod post;
mod user;

pub use feed::{FeedComment, FeedEntry, FeedRepository};
pub use following::FollowingRepository;
pub use notification::{NotificationRepository, NotificationView, notify, retract};
pub use post::PostRepository;
pub use user::UserRepository;

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, SqlErr, TransactionTrait};
use sosmed_common::{AppError, AppResult};
use tracing::warn;

/// Whether a store error is a unique-constraint violation.
///
/// Falls back to the Postgres message text for errors that did not come
/// straight from the driver.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        || err.to_string().contains("duplicate key")
}

pub(crate) async fn begin(db: &DatabaseConnection) -> AppResult<DatabaseTransaction> {
    db.begin()
        .await
        .map_err(|e| AppError::database("failed to begin transaction", e))
}

pub(crate) async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    txn.commit()
        .await
        .map_err(|e| AppError::database("failed to commit transaction", e))
}

/// Roll back explicitly on an expected outcome such as a conflict.
pub(crate) async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        warn!(error = %e, "Failed to roll back transaction");
    }
}
