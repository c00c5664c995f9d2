//! Following repository.

use std::sync::Arc;

use super::{begin, commit, is_unique_violation, notify, retract, rollback};
use crate::entities::{Following, following, notification::NotificationAction};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use sosmed_common::{AppError, AppResult, IdGenerator};
use tracing::debug;

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let count = Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::database("failed to check following", e))?;

        Ok(count > 0)
    }

    /// Follow a user and notify them.
    ///
    /// Following yourself is rejected before the store is touched.
    pub async fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<following::Model> {
        if follower_id == followee_id {
            return Err(AppError::InvalidArgument(
                "cannot follow yourself".to_string(),
            ));
        }

        let txn = begin(&self.db).await?;

        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let edge = match model.insert(&txn).await {
            Ok(edge) => edge,
            Err(e) if is_unique_violation(&e) => {
                rollback(txn).await;
                debug!(follower_id = %follower_id, followee_id = %followee_id, "Already following");
                return Err(AppError::AlreadyFollowing);
            }
            Err(e) => return Err(AppError::database("failed to insert following", e)),
        };

        notify(
            &txn,
            &self.id_gen,
            followee_id,
            follower_id,
            NotificationAction::Follow,
            None,
        )
        .await
        .map_err(|e| AppError::database("failed to insert notification", e))?;

        commit(txn).await?;
        Ok(edge)
    }

    /// Remove a follow edge and its notification.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let txn = begin(&self.db).await?;

        let removed = Following::delete_many()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::database("failed to delete following", e))?
            .rows_affected;

        if removed == 0 {
            rollback(txn).await;
            return Err(AppError::NotFollowing);
        }

        retract(
            &txn,
            follower_id,
            NotificationAction::Follow,
            None,
            Some(followee_id),
        )
        .await
        .map_err(|e| AppError::database("failed to delete notification", e))?;

        commit(txn).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, RuntimeErr};

    fn create_test_following(id: &str, follower_id: &str, followee_id: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn exec_ok(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_is_following_true() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        assert!(repo.is_following("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_following_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(0))
                }]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        assert!(!repo.is_following("user1", "user3").await.unwrap());
    }

    #[tokio::test]
    async fn test_follow() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_following("f1", "user1", "user2")]])
                .append_exec_results([exec_ok(1)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let edge = repo.follow("user1", "user2").await.unwrap();

        assert_eq!(edge.follower_id, "user1");
        assert_eq!(edge.followee_id, "user2");
    }

    #[tokio::test]
    async fn test_self_follow_never_reaches_store() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = FollowingRepository::new(db.clone());
        let err = repo.follow("user1", "user1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        drop(repo);
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_follow_twice_is_already_following() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "duplicate key value violates unique constraint \"idx_following_follower_followee\""
                        .into(),
                ))])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let err = repo.follow("user1", "user2").await.unwrap_err();

        assert!(matches!(err, AppError::AlreadyFollowing));
    }

    #[tokio::test]
    async fn test_follow_notification_failure_fails_follow() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_following("f1", "user1", "user2")]])
                .append_exec_errors([DbErr::Custom("connection lost".into())])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let err = repo.follow("user1", "user2").await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_unfollow() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_ok(1), exec_ok(1)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        repo.unfollow("user1", "user2").await.unwrap();
    }

    #[tokio::test]
    async fn test_unfollow_without_edge_is_not_following() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_ok(0)])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let err = repo.unfollow("user1", "user2").await.unwrap_err();

        assert!(matches!(err, AppError::NotFollowing));
    }
}
