//! Feed repository.
//!
//! Builds a viewer's feed in a single round trip: posts by followed authors,
//! each with its author, like count and ordered comments aggregated as JSON.

use std::sync::Arc;

use sea_orm::{
    DatabaseConnection, DbBackend, FromQueryResult, Statement, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use sosmed_common::{AppError, AppResult};

/// A comment as shown inside a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedComment {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

/// One post in a viewer's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub content: String,
    pub image_path: Option<String>,
    pub user_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub like_count: i64,
    pub comments: Vec<FeedComment>,
}

#[derive(Debug, FromQueryResult)]
struct FeedRow {
    id: String,
    content: String,
    image_path: Option<String>,
    user_id: String,
    author_name: String,
    author_avatar: Option<String>,
    created_at: DateTimeWithTimeZone,
    like_count: i64,
    comments: serde_json::Value,
}

impl TryFrom<FeedRow> for FeedEntry {
    type Error = AppError;

    fn try_from(row: FeedRow) -> Result<Self, Self::Error> {
        let comments = serde_json::from_value(row.comments)
            .map_err(|e| AppError::database("failed to decode feed comments", e))?;

        Ok(Self {
            id: row.id,
            content: row.content,
            image_path: row.image_path,
            user_id: row.user_id,
            author_name: row.author_name,
            author_avatar: row.author_avatar,
            created_at: row.created_at,
            like_count: row.like_count,
            comments,
        })
    }
}

const FEED_SQL: &str = r#"
    SELECT
        p.id, p.content, p.image_path, p.user_id, p.created_at,
        u.name AS author_name,
        u.avatar_path AS author_avatar,
        (SELECT COUNT(*) FROM post_like l WHERE l.post_id = p.id) AS like_count,
        COALESCE(
            (
                SELECT JSON_AGG(
                    JSON_BUILD_OBJECT(
                        'id', c.id,
                        'content', c.content,
                        'user_id', c.user_id,
                        'user_name', cu.name,
                        'user_avatar', cu.avatar_path,
                        'created_at', c.created_at
                    )
                    ORDER BY c.created_at ASC, c.id ASC
                )
                FROM comment c
                JOIN "user" cu ON cu.id = c.user_id
                WHERE c.post_id = p.id AND c.deleted_at IS NULL
            ),
            '[]'::json
        ) AS comments
    FROM post p
    JOIN "user" u ON u.id = p.user_id
    WHERE p.deleted_at IS NULL
      AND p.user_id IN (SELECT f.followee_id FROM following f WHERE f.follower_id = $1)
    ORDER BY p.created_at DESC, p.id DESC
    LIMIT $2
"#;

/// Feed repository for read-only feed composition.
#[derive(Clone)]
pub struct FeedRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedRepository {
    /// Create a new feed repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest posts by authors `viewer_id` follows, excluding deleted posts
    /// and deleted comments.
    pub async fn get_feed(&self, viewer_id: &str, limit: u64) -> AppResult<Vec<FeedEntry>> {
        let rows = FeedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            FEED_SQL,
            [viewer_id.into(), (limit as i64).into()],
        ))
        .all(self.db.as_ref())
        .await
        .map_err(|e| AppError::database("failed to load feed", e))?;

        rows.into_iter().map(FeedEntry::try_from).collect()
    }
}
