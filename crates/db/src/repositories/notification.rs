//! Notification repository and fan-out helpers.
//!
//! Notifications are never written on their own. [`notify`] and [`retract`]
//! take whatever connection the owning mutation runs on, so they join that
//! mutation's transaction and commit or roll back with it.

use std::sync::Arc;

use crate::entities::{Notification, notification, notification::NotificationAction};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, Set, Statement, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use serde::Serialize;
use sosmed_common::{AppError, AppResult, IdGenerator};

/// Insert a notification on `conn`.
///
/// Returns the new notification's ID.
pub async fn notify<C: ConnectionTrait>(
    conn: &C,
    id_gen: &IdGenerator,
    receiver_id: &str,
    actor_id: &str,
    action: NotificationAction,
    post_id: Option<&str>,
) -> Result<String, DbErr> {
    let id = id_gen.generate();
    let model = notification::ActiveModel {
        id: Set(id.clone()),
        receiver_id: Set(receiver_id.to_string()),
        actor_id: Set(actor_id.to_string()),
        action: Set(action),
        post_id: Set(post_id.map(ToString::to_string)),
        is_read: Set(false),
        created_at: Set(Utc::now().into()),
    };

    Notification::insert(model)
        .exec_without_returning(conn)
        .await?;

    Ok(id)
}

/// Delete the notifications `actor_id` produced with `action`.
///
/// `post_id` and `receiver_id` narrow the match when given.
pub async fn retract<C: ConnectionTrait>(
    conn: &C,
    actor_id: &str,
    action: NotificationAction,
    post_id: Option<&str>,
    receiver_id: Option<&str>,
) -> Result<u64, DbErr> {
    let mut query = Notification::delete_many()
        .filter(notification::Column::ActorId.eq(actor_id))
        .filter(notification::Column::Action.eq(action));

    if let Some(post_id) = post_id {
        query = query.filter(notification::Column::PostId.eq(post_id));
    }
    if let Some(receiver_id) = receiver_id {
        query = query.filter(notification::Column::ReceiverId.eq(receiver_id));
    }

    Ok(query.exec(conn).await?.rows_affected)
}

/// A notification joined with its actor's public profile.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub receiver_id: String,
    pub actor_id: String,
    pub action: NotificationAction,
    pub post_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTimeWithTimeZone,
    pub actor_name: String,
    pub actor_avatar: Option<String>,
}

/// Notification repository for read and read-state operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest notifications for a receiver.
    pub async fn list_for_receiver(
        &self,
        receiver_id: &str,
        limit: u64,
    ) -> AppResult<Vec<NotificationView>> {
        let sql = r#"
            SELECT
                n.id, n.receiver_id, n.actor_id, n.action, n.post_id, n.is_read, n.created_at,
                a.name AS actor_name, a.avatar_path AS actor_avatar
            FROM notification n
            JOIN "user" a ON a.id = n.actor_id
            WHERE n.receiver_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT $2
        "#;

        NotificationView::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [receiver_id.into(), (limit as i64).into()],
        ))
        .all(self.db.as_ref())
        .await
        .map_err(|e| AppError::database("failed to list notifications", e))
    }

    /// Mark a notification as read, only if it belongs to `receiver_id`.
    ///
    /// Returns `false` when no such notification exists for that receiver.
    pub async fn mark_read(&self, id: &str, receiver_id: &str) -> AppResult<bool> {
        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::ReceiverId.eq(receiver_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::database("failed to mark notification as read", e))?;

        Ok(result.rows_affected > 0)
    }
}
