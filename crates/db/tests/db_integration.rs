//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p sosmed-db --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `sosmed_test`)
//!   `TEST_DB_PASSWORD` (default: `sosmed_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use sosmed_common::AppError;
use sosmed_db::repositories::{
    FeedRepository, FollowingRepository, NotificationRepository, PostRepository, UserRepository,
};
use sosmed_db::test_utils::{TestDatabase, TestDbConfig};

async fn create_user(db: &TestDatabase, name: &str) -> String {
    UserRepository::new(db.shared())
        .create(&format!("{name}@example.com"), name, "hash")
        .await
        .unwrap()
        .id
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_likes_produce_one_row() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let owner = create_user(&db, "owner").await;
    let liker = create_user(&db, "liker").await;

    let posts = PostRepository::new(db.shared());
    let post = posts.create_post(&owner, "hello", None).await.unwrap();

    let (a, b) = tokio::join!(
        posts.like_post(&post.id, &liker, &owner),
        posts.like_post(&post.id, &liker, &owner),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::AlreadyLiked)))
            .count(),
        1
    );
    assert_eq!(db.count_rows("post_like", None).await.unwrap(), 1);
    assert_eq!(
        db.count_rows("notification", Some("action = 'like'"))
            .await
            .unwrap(),
        1
    );

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_failed_notification_rolls_back_like_and_comment() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let owner = create_user(&db, "owner").await;
    let actor = create_user(&db, "actor").await;

    let posts = PostRepository::new(db.shared());
    let post = posts.create_post(&owner, "hello", None).await.unwrap();

    // An unknown receiver violates the notification foreign key.
    let err = posts
        .like_post(&post.id, &actor, "01j00000000000000000000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(msg) if msg.starts_with("failed to insert notification")));

    let err = posts
        .add_comment(&post.id, &actor, "hi", "01j00000000000000000000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(msg) if msg.starts_with("failed to insert notification")));

    assert_eq!(db.count_rows("post_like", None).await.unwrap(), 0);
    assert_eq!(db.count_rows("comment", None).await.unwrap(), 0);
    assert_eq!(db.count_rows("notification", None).await.unwrap(), 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_unlike_removes_like_notification() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let owner = create_user(&db, "owner").await;
    let liker = create_user(&db, "liker").await;

    let posts = PostRepository::new(db.shared());
    let post = posts.create_post(&owner, "hello", None).await.unwrap();

    posts.like_post(&post.id, &liker, &owner).await.unwrap();
    posts.unlike_post(&post.id, &liker).await.unwrap();

    assert_eq!(db.count_rows("post_like", None).await.unwrap(), 0);
    assert_eq!(db.count_rows("notification", None).await.unwrap(), 0);

    let err = posts.unlike_post(&post.id, &liker).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_unfollow_symmetry() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let graph = FollowingRepository::new(db.shared());

    assert!(matches!(
        graph.follow(&alice, &alice).await,
        Err(AppError::InvalidArgument(_))
    ));

    graph.follow(&alice, &bob).await.unwrap();
    assert!(graph.is_following(&alice, &bob).await.unwrap());
    assert!(matches!(
        graph.follow(&alice, &bob).await,
        Err(AppError::AlreadyFollowing)
    ));

    graph.unfollow(&alice, &bob).await.unwrap();
    assert!(matches!(
        graph.unfollow(&alice, &bob).await,
        Err(AppError::NotFollowing)
    ));

    assert_eq!(db.count_rows("following", None).await.unwrap(), 0);
    assert_eq!(
        db.count_rows("notification", Some("action = 'follow'"))
            .await
            .unwrap(),
        0
    );

    db.drop_database().await.unwrap();
}

/// Make every notification delete fail, so a retract step aborts its transaction.
async fn block_notification_deletes(db: &TestDatabase) {
    db.connection()
        .execute_unprepared(
            "CREATE FUNCTION reject_notification_delete() RETURNS trigger AS $$
             BEGIN
                 RAISE EXCEPTION 'notification delete rejected';
             END;
             $$ LANGUAGE plpgsql",
        )
        .await
        .unwrap();
    db.connection()
        .execute_unprepared(
            "CREATE TRIGGER notification_no_delete BEFORE DELETE ON notification \
             FOR EACH ROW EXECUTE FUNCTION reject_notification_delete()",
        )
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_failed_retract_keeps_like_and_edge() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let owner = create_user(&db, "owner").await;
    let actor = create_user(&db, "actor").await;

    let posts = PostRepository::new(db.shared());
    let graph = FollowingRepository::new(db.shared());
    let post = posts.create_post(&owner, "hello", None).await.unwrap();
    posts.like_post(&post.id, &actor, &owner).await.unwrap();
    graph.follow(&actor, &owner).await.unwrap();

    block_notification_deletes(&db).await;

    let err = posts.unlike_post(&post.id, &actor).await.unwrap_err();
    assert!(matches!(err, AppError::Database(msg) if msg.starts_with("failed to delete notification")));

    let err = graph.unfollow(&actor, &owner).await.unwrap_err();
    assert!(matches!(err, AppError::Database(msg) if msg.starts_with("failed to delete notification")));

    assert_eq!(db.count_rows("post_like", None).await.unwrap(), 1);
    assert_eq!(db.count_rows("following", None).await.unwrap(), 1);
    assert!(graph.is_following(&actor, &owner).await.unwrap());
    assert_eq!(db.count_rows("notification", None).await.unwrap(), 2);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_shared_handle_reuses_pool() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");

    let first = db.shared();
    let second = db.shared();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    drop((first, second));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_feed_ordering_and_visibility() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let viewer = create_user(&db, "viewer").await;
    let author = create_user(&db, "author").await;
    let stranger = create_user(&db, "stranger").await;

    FollowingRepository::new(db.shared())
        .follow(&viewer, &author)
        .await
        .unwrap();

    let posts = PostRepository::new(db.shared());
    let p1 = posts.create_post(&author, "p1", None).await.unwrap();
    let p2 = posts.create_post(&author, "p2", None).await.unwrap();
    let p3 = posts.create_post(&author, "p3", None).await.unwrap();
    let deleted = posts.create_post(&author, "gone", None).await.unwrap();
    posts.create_post(&stranger, "not followed", None).await.unwrap();

    db.connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "UPDATE post SET deleted_at = NOW() WHERE id = $1",
            [deleted.id.clone().into()],
        ))
        .await
        .unwrap();

    posts.like_post(&p3.id, &viewer, &author).await.unwrap();
    posts.add_comment(&p3.id, &viewer, "first", &author).await.unwrap();
    posts.add_comment(&p3.id, &stranger, "second", &author).await.unwrap();

    let feed = FeedRepository::new(db.shared())
        .get_feed(&viewer, 10)
        .await
        .unwrap();

    let ids: Vec<&str> = feed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, [p3.id.as_str(), p2.id.as_str(), p1.id.as_str()]);
    assert_eq!(feed[0].like_count, 1);
    assert_eq!(feed[0].author_name, "author");
    let comments: Vec<&str> = feed[0].comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(comments, ["first", "second"]);
    assert_eq!(feed[0].comments[1].user_name, "stranger");

    assert!(matches!(
        posts.get_owner(&deleted.id).await,
        Err(AppError::NotFound(_))
    ));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_mark_read_is_scoped_to_receiver() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;

    FollowingRepository::new(db.shared())
        .follow(&alice, &bob)
        .await
        .unwrap();

    let notifications = NotificationRepository::new(db.shared());
    let list = notifications.list_for_receiver(&bob, 5).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].actor_name, "alice");

    assert!(!notifications.mark_read(&list[0].id, &carol).await.unwrap());
    assert_eq!(
        db.count_rows("notification", Some("is_read = true"))
            .await
            .unwrap(),
        0
    );

    assert!(notifications.mark_read(&list[0].id, &bob).await.unwrap());
    assert_eq!(
        db.count_rows("notification", Some("is_read = true"))
            .await
            .unwrap(),
        1
    );

    db.drop_database().await.unwrap();
}
