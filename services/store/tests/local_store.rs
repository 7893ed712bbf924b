use common::database::DatabaseConfig;
use store::{
    LocalStore, RecordStore, StoreError,
    models::{JUST_NOW, NewNotification, NewPost, NewUser},
    password::legacy_digest,
    schema::{DEMO_EMAIL, DEMO_PASSWORD, DEMO_USERNAME, SchemaManager},
};
use tempfile::TempDir;

async fn open(dir: &TempDir, schema: &SchemaManager) -> LocalStore {
    let config = DatabaseConfig::for_path(dir.path().join("checknshare.db"));
    LocalStore::open(&config, schema).await.unwrap()
}

async fn open_default(dir: &TempDir) -> LocalStore {
    open(dir, &SchemaManager::default()).await
}

#[tokio::test]
async fn test_alice_signs_up_and_logs_in() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let id = store
        .create_user(&NewUser::new("alice", "a@x.io", "secret1"))
        .await
        .unwrap();
    assert!(id > 0);
    assert!(store.user_exists("alice").await.unwrap());
    assert!(!store.user_exists("bob").await.unwrap());

    assert!(store.authenticate("alice", "nope").await.unwrap().is_none());

    let by_name = store.authenticate("alice", "secret1").await.unwrap().unwrap();
    assert_eq!(by_name.id, id);
    assert_eq!(by_name.email, "a@x.io");
    assert_ne!(by_name.password_hash, "secret1");

    let by_email = store.authenticate("a@x.io", "secret1").await.unwrap().unwrap();
    assert_eq!(by_email.id, id);
}

#[tokio::test]
async fn test_unknown_identifier_looks_like_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    assert!(store.authenticate("ghost", DEMO_PASSWORD).await.unwrap().is_none());
    assert!(store.authenticate(DEMO_USERNAME, "wrong").await.unwrap().is_none());
    assert!(store.authenticate(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap().is_some());
}

#[tokio::test]
async fn test_duplicate_username_or_email_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let same_name = store
        .create_user(&NewUser::new(DEMO_USERNAME, "other@example.com", "secret1"))
        .await;
    assert!(matches!(same_name, Err(StoreError::UniquenessViolation(_))));

    let same_email = store
        .create_user(&NewUser::new("other", DEMO_EMAIL, "secret1"))
        .await;
    assert!(matches!(same_email, Err(StoreError::UniquenessViolation(_))));
}

#[tokio::test]
async fn test_seeded_feed() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let feed = store.get_feed(Some(1)).await.unwrap();
    let images: Vec<_> = feed
        .iter()
        .map(|entry| entry.post.image_ref.as_deref().unwrap())
        .collect();
    assert_eq!(
        images,
        ["photo_placeholder_3", "photo_placeholder_2", "photo_placeholder_1"]
    );

    let counts: Vec<_> = feed.iter().map(|entry| entry.like_count).collect();
    assert_eq!(counts, [15, 10, 5]);
    assert!(feed.iter().all(|entry| entry.liked_by_viewer));
    assert!(feed.iter().all(|entry| entry.post.username == DEMO_USERNAME));
    assert_eq!(feed[2].post.location.as_deref(), Some("Paris, France"));
    assert_eq!(
        feed[2].post.location_address.as_deref(),
        Some("Adresse Exemple 0")
    );

    let anonymous = store.get_feed(None).await.unwrap();
    assert!(anonymous.iter().all(|entry| !entry.liked_by_viewer));
}

#[tokio::test]
async fn test_post_and_like_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let user = store
        .create_user(&NewUser::new("alice", "a@x.io", "secret1"))
        .await
        .unwrap();
    let post = store
        .create_post(&NewPost::new(user).with_image("1712000000000.jpg").with_location("Lyon"))
        .await
        .unwrap();

    let posts = store.get_all_posts().await.unwrap();
    assert_eq!(posts[0].id, post);
    assert_eq!(posts[0].username, "alice");
    assert_eq!(posts[0].location_address.as_deref(), Some("Lyon"));

    store.add_like(post, user).await.unwrap();
    assert_eq!(store.get_like_count(post).await.unwrap(), 1);

    assert!(!store.toggle_like(post, user).await.unwrap());
    assert_eq!(store.get_like_count(post).await.unwrap(), 0);
    assert!(!store.has_user_liked(post, user).await.unwrap());
}

#[tokio::test]
async fn test_toggle_twice_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;
    let post = store.create_post(&NewPost::new(1)).await.unwrap();

    assert!(store.toggle_like(post, 1).await.unwrap());
    assert!(store.has_user_liked(post, 1).await.unwrap());
    assert!(!store.toggle_like(post, 1).await.unwrap());
    assert!(!store.has_user_liked(post, 1).await.unwrap());
}

#[tokio::test]
async fn test_add_like_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;
    let post = store.create_post(&NewPost::new(1)).await.unwrap();

    let first = store.add_like(post, 1).await.unwrap();
    let second = store.add_like(post, 1).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.get_like_count(post).await.unwrap(), 1);

    assert_eq!(store.remove_like(post, 1).await.unwrap(), 1);
    assert_eq!(store.remove_like(post, 1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_like_on_missing_post_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    assert!(store.add_like(999, 1).await.is_err());
    assert_eq!(store.get_like_count(999).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_post_removes_its_likes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let seeded = store.get_all_posts().await.unwrap();
    let target = seeded.iter().find(|p| p.image_ref.as_deref() == Some("photo_placeholder_2"));
    let target = target.unwrap().id;
    assert_eq!(store.get_like_count(target).await.unwrap(), 10);

    assert_eq!(store.delete_post(target).await.unwrap(), 1);
    assert_eq!(store.get_like_count(target).await.unwrap(), 0);
    assert!(store.get_post(target).await.unwrap().is_none());
    assert!(store.get_all_posts().await.unwrap().iter().all(|p| p.id != target));

    assert_eq!(store.delete_post(target).await.unwrap(), 0);
}

#[tokio::test]
async fn test_post_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let alice = store
        .create_user(&NewUser::new("alice", "a@x.io", "secret1"))
        .await
        .unwrap();
    let first = store
        .create_post(&NewPost::new(alice).with_location("Lyon"))
        .await
        .unwrap();
    let second = store
        .create_post(&NewPost::new(alice).with_image("1712000000000.jpg"))
        .await
        .unwrap();

    let post = store.get_post(first).await.unwrap().unwrap();
    assert_eq!(post.username, "alice");
    assert_eq!(post.location.as_deref(), Some("Lyon"));
    assert!(store.get_post(999).await.unwrap().is_none());

    let mine: Vec<_> = store
        .get_posts_by_user(alice)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(mine, [second, first]);

    assert_eq!(store.get_posts_by_user(1).await.unwrap().len(), 3);
    assert!(store.get_posts_by_user(42).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_legacy_digest_logs_in_and_is_upgraded() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
        .bind("legacy")
        .bind("legacy@example.com")
        .bind(legacy_digest("oldpass"))
        .execute(store.pool())
        .await
        .unwrap();

    assert!(store.authenticate("legacy", "wrongpass").await.unwrap().is_none());

    let user = store.authenticate("legacy", "oldpass").await.unwrap().unwrap();
    assert!(user.password_hash.starts_with("$argon2id$"));

    let stored: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(stored, user.password_hash);
    assert!(store.authenticate("legacy@example.com", "oldpass").await.unwrap().is_some());
}

#[tokio::test]
async fn test_schema_bump_reseeds() {
    let dir = tempfile::tempdir().unwrap();

    let store = open_default(&dir).await;
    store
        .create_user(&NewUser::new("alice", "a@x.io", "secret1"))
        .await
        .unwrap();
    store.create_post(&NewPost::new(1)).await.unwrap();
    store.close().await;

    let reopened = open_default(&dir).await;
    assert!(reopened.user_exists("alice").await.unwrap());
    assert_eq!(reopened.get_all_posts().await.unwrap().len(), 4);
    reopened.close().await;

    let bumped = open(&dir, &SchemaManager::new(4)).await;
    assert!(!bumped.user_exists("alice").await.unwrap());
    assert!(bumped.user_exists(DEMO_USERNAME).await.unwrap());
    assert_eq!(bumped.get_all_posts().await.unwrap().len(), 3);
    assert_eq!(bumped.get_all_notifications(None).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_concurrent_toggles_serialise() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;
    let post = store.create_post(&NewPost::new(1)).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.toggle_like(post, 1).await })
        })
        .collect();

    let mut liked = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            liked += 1;
        }
    }

    assert_eq!(liked, 4);
    assert_eq!(store.get_like_count(post).await.unwrap(), 0);
}

#[tokio::test]
async fn test_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    let seeded = store.get_all_notifications(Some(1)).await.unwrap();
    assert_eq!(seeded.len(), 4);
    assert_eq!(seeded[0].actor_name, "Thomas Laurent");
    assert_eq!(seeded[3].actor_name, "Marie Dubois");
    assert!(seeded.iter().all(|n| !n.is_read));

    let id = store
        .create_notification(&NewNotification {
            recipient_user_id: 1,
            actor_name: "Alex Martin".to_string(),
            action_text: "a aimé votre photo".to_string(),
            location: Some("Lyon".to_string()),
            profile_image: None,
        })
        .await
        .unwrap();

    let all = store.get_all_notifications(None).await.unwrap();
    assert_eq!(all[0].id, id);
    assert_eq!(all[0].time_ago, JUST_NOW);

    assert_eq!(store.mark_notification_as_read(id).await.unwrap(), 1);
    assert_eq!(store.mark_notification_as_read(9_999).await.unwrap(), 0);

    let all = store.get_all_notifications(Some(1)).await.unwrap();
    assert!(all[0].is_read);
    assert!(store.get_all_notifications(Some(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_check_and_any_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_default(&dir).await;

    assert!(store.health_check().await.unwrap());
    assert_eq!(store.get_any_user_id().await.unwrap(), Some(1));
    assert_eq!(store.get_user(1).await.unwrap().unwrap().username, DEMO_USERNAME);
    assert!(store.get_user(42).await.unwrap().is_none());
}
