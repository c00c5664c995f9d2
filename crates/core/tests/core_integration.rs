//! Service integration tests.
//!
//! These tests require running `PostgreSQL` and Redis instances.
//! Run with: `cargo test -p sosmed-core --test core_integration -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sosmed_common::{CacheStore, Identity, MemoryCache, RedisCache, RetryPolicy, SharedCache};
use sosmed_core::{
    AddCommentInput, CreatePostInput, FeedCache, FeedService, FeedSource, FollowingService,
    NotificationService, PostService,
};
use sosmed_db::repositories::{
    FeedRepository, FollowingRepository, NotificationRepository, PostRepository, UserRepository,
};
use sosmed_db::test_utils::{TestDatabase, TestRedisConfig};
use std::sync::Arc;
use std::time::Duration;

struct Services {
    feed: FeedService,
    posts: PostService,
    following: FollowingService,
    notifications: NotificationService,
}

fn services(db: &TestDatabase, cache: SharedCache) -> Services {
    let feed_cache = FeedCache::new(
        Some(cache),
        "sosmed_test",
        Duration::from_secs(60),
        RetryPolicy::none(),
    );

    Services {
        feed: FeedService::new(FeedRepository::new(db.shared()), feed_cache.clone(), 10),
        posts: PostService::new(PostRepository::new(db.shared()), feed_cache.clone()),
        following: FollowingService::new(FollowingRepository::new(db.shared()), feed_cache),
        notifications: NotificationService::new(NotificationRepository::new(db.shared())),
    }
}

async fn create_user(db: &TestDatabase, name: &str) -> Identity {
    let user = UserRepository::new(db.shared())
        .create(&format!("{name}@example.com"), name, "hash")
        .await
        .unwrap();
    Identity::new(user.id)
}

fn post_input(content: &str) -> CreatePostInput {
    CreatePostInput {
        content: content.to_string(),
        image_path: None,
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_write_after_cached_read_is_visible() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let svc = services(&db, Arc::new(MemoryCache::new()));

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    svc.following.follow(&alice, bob.user_id()).await.unwrap();
    svc.posts.create_post(&bob, post_input("first")).await.unwrap();

    let first = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(first.source, FeedSource::Store);
    let second = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(second.source, FeedSource::Cache);
    assert_eq!(second.message(), Some("data from cache"));

    let post = svc.posts.create_post(&bob, post_input("second")).await.unwrap();

    let after = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(after.source, FeedSource::Store);
    assert_eq!(after.entries[0].id, post.id);

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_and_comment_refresh_cached_feed() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let svc = services(&db, Arc::new(MemoryCache::new()));

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    svc.following.follow(&alice, bob.user_id()).await.unwrap();
    let post = svc.posts.create_post(&bob, post_input("hello")).await.unwrap();

    let before = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(before.entries[0].like_count, 0);

    svc.posts.like_post(&alice, &post.id).await.unwrap();
    svc.posts
        .add_comment(
            &alice,
            AddCommentInput {
                post_id: post.id.clone(),
                content: "nice".to_string(),
            },
        )
        .await
        .unwrap();

    let after = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(after.source, FeedSource::Store);
    assert_eq!(after.entries[0].like_count, 1);
    assert_eq!(after.entries[0].comments.len(), 1);
    assert_eq!(after.entries[0].comments[0].content, "nice");

    let inbox = svc.notifications.list(&bob).await.unwrap();
    assert_eq!(inbox.notifications.len(), 3);
    assert_eq!(inbox.message(), "you have 3 notifications");

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_empty_feed_is_not_cached() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let memory = MemoryCache::new();
    let svc = services(&db, Arc::new(memory.clone()));

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let empty = svc.feed.get_feed(&alice).await.unwrap();
    assert!(empty.is_empty());
    assert_eq!(
        empty.message(),
        Some("No posts found. Follow some users to see their posts.")
    );
    assert!(memory.is_empty().await);

    // Following alone changes nothing until the followee posts.
    svc.following.follow(&alice, bob.user_id()).await.unwrap();
    svc.posts.create_post(&bob, post_input("now")).await.unwrap();

    let page = svc.feed.get_feed(&alice).await.unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.source, FeedSource::Store);

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_unfollow_drops_followee_from_cached_feed() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let svc = services(&db, Arc::new(MemoryCache::new()));

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    svc.following.follow(&alice, bob.user_id()).await.unwrap();
    svc.posts.create_post(&bob, post_input("hello")).await.unwrap();
    assert_eq!(svc.feed.get_feed(&alice).await.unwrap().entries.len(), 1);

    svc.following.unfollow(&alice, bob.user_id()).await.unwrap();

    assert!(svc.feed.get_feed(&alice).await.unwrap().is_empty());

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_cache_deletes() {
    let url = TestRedisConfig::default().redis_url();
    let cache = RedisCache::connect(&url).await.expect("Failed to connect to Redis");
    let prefix = format!("sosmed_test_{}:feed:", ulid::Ulid::new());
    let ttl = Duration::from_secs(60);

    for key in ["u1", "u10", "u2", "*"] {
        cache.set(&format!("{prefix}{key}"), "[1]", ttl).await.unwrap();
    }

    assert_eq!(
        cache.get(&format!("{prefix}u1")).await.unwrap().as_deref(),
        Some("[1]")
    );

    assert!(cache.delete(&format!("{prefix}u1")).await.unwrap());
    assert!(cache.exists(&format!("{prefix}u10")).await.unwrap());

    // A glob metacharacter in the prefix matches only itself.
    assert_eq!(cache.delete_prefix(&format!("{prefix}*")).await.unwrap(), 1);
    assert!(cache.exists(&format!("{prefix}u2")).await.unwrap());

    assert_eq!(cache.delete_prefix(&prefix).await.unwrap(), 2);
    assert!(!cache.exists(&format!("{prefix}u10")).await.unwrap());

    let counter = format!("{prefix}gen");
    assert_eq!(cache.incr(&counter).await.unwrap(), 1);
    assert_eq!(cache.incr(&counter).await.unwrap(), 2);
    assert!(cache.delete(&counter).await.unwrap());
}
