//! Post repository: posts, likes and comments.
//!
//! Likes and comments run in one transaction together with their
//! notification fan-out. Any error before commit drops the transaction,
//! which rolls it back.

use std::sync::Arc;

use super::{begin, commit, is_unique_violation, notify, retract, rollback};
use crate::entities::{Post, PostLike, comment, notification::NotificationAction, post, post_like};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use sosmed_common::{AppError, AppResult, IdGenerator};
use tracing::debug;

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post.
    pub async fn create_post(
        &self,
        author_id: &str,
        content: &str,
        image_path: Option<&str>,
    ) -> AppResult<post::Model> {
        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            content: Set(content.to_string()),
            image_path: Set(image_path.map(ToString::to_string)),
            user_id: Set(author_id.to_string()),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::database("failed to insert post", e))
    }

    /// Author of a post that has not been deleted.
    pub async fn get_owner(&self, post_id: &str) -> AppResult<String> {
        let owner: Option<String> = Post::find_by_id(post_id)
            .filter(post::Column::DeletedAt.is_null())
            .select_only()
            .column(post::Column::UserId)
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::database("failed to find post owner", e))?;

        owner.ok_or_else(|| AppError::NotFound("post not found".to_string()))
    }

    /// Like a post and notify its owner.
    ///
    /// A second like by the same user fails with [`AppError::AlreadyLiked`]
    /// and leaves no trace, even when both likes race.
    pub async fn like_post(
        &self,
        post_id: &str,
        user_id: &str,
        post_owner_id: &str,
    ) -> AppResult<post_like::Model> {
        let txn = begin(&self.db).await?;

        let model = post_like::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let like = match model.insert(&txn).await {
            Ok(like) => like,
            Err(e) if is_unique_violation(&e) => {
                rollback(txn).await;
                debug!(post_id = %post_id, user_id = %user_id, "Post already liked");
                return Err(AppError::AlreadyLiked);
            }
            Err(e) => return Err(AppError::database("failed to insert like", e)),
        };

        if user_id != post_owner_id {
            notify(
                &txn,
                &self.id_gen,
                post_owner_id,
                user_id,
                NotificationAction::Like,
                Some(post_id),
            )
            .await
            .map_err(|e| AppError::database("failed to insert notification", e))?;
        }

        commit(txn).await?;
        Ok(like)
    }

    /// Remove a like and its notification.
    pub async fn unlike_post(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let txn = begin(&self.db).await?;

        let removed = PostLike::delete_many()
            .filter(post_like::Column::PostId.eq(post_id))
            .filter(post_like::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::database("failed to delete like", e))?
            .rows_affected;

        if removed == 0 {
            rollback(txn).await;
            return Err(AppError::NotFound("like not found".to_string()));
        }

        retract(&txn, user_id, NotificationAction::Like, Some(post_id), None)
            .await
            .map_err(|e| AppError::database("failed to delete notification", e))?;

        commit(txn).await
    }

    /// Comment on a post and notify its owner.
    pub async fn add_comment(
        &self,
        post_id: &str,
        user_id: &str,
        content: &str,
        post_owner_id: &str,
    ) -> AppResult<comment::Model> {
        let txn = begin(&self.db).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            content: Set(content.to_string()),
            post_id: Set(post_id.to_string()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        };

        let comment = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::database("failed to insert comment", e))?;

        if user_id != post_owner_id {
            notify(
                &txn,
                &self.id_gen,
                post_owner_id,
                user_id,
                NotificationAction::Comment,
                Some(post_id),
            )
            .await
            .map_err(|e| AppError::database("failed to insert notification", e))?;
        }

        commit(txn).await?;
        Ok(comment)
    }
}
