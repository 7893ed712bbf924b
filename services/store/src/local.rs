//! Record store over the embedded SQLite database

use async_trait::async_trait;
use common::database::{self, DatabaseConfig, init_pool};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::StoreResult,
    models::{FeedEntry, NewNotification, NewPost, NewUser, Notification, Post, User},
    record_store::RecordStore,
    repositories::{LikeRepository, NotificationRepository, PostRepository, UserRepository},
    schema::{SchemaManager, SchemaState},
};

/// Local record store
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    users: UserRepository,
    posts: PostRepository,
    likes: LikeRepository,
    notifications: NotificationRepository,
}

impl LocalStore {
    /// Open the database file and bring its schema to the expected version
    pub async fn open(config: &DatabaseConfig, schema: &SchemaManager) -> StoreResult<Self> {
        let pool = init_pool(config).await?;
        let state = schema.prepare(&pool).await?;

        if state != SchemaState::Current {
            info!("Database schema prepared: {:?}", state);
        }

        Ok(Self::from_pool(pool))
    }

    /// Wrap a pool whose schema is already prepared
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            likes: LikeRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn authenticate(&self, identifier: &str, password: &str) -> StoreResult<Option<User>> {
        self.users.authenticate(identifier, password).await
    }

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<i64> {
        self.users.create(new_user).await
    }

    async fn user_exists(&self, username: &str) -> StoreResult<bool> {
        self.users.exists(username).await
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn get_any_user_id(&self) -> StoreResult<Option<i64>> {
        self.users.first_id().await
    }

    async fn create_post(&self, new_post: &NewPost) -> StoreResult<i64> {
        self.posts.create(new_post).await
    }

    async fn get_all_posts(&self) -> StoreResult<Vec<Post>> {
        self.posts.get_all().await
    }

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>> {
        self.posts.find_by_id(post_id).await
    }

    async fn get_posts_by_user(&self, user_id: i64) -> StoreResult<Vec<Post>> {
        self.posts.find_by_user(user_id).await
    }

    async fn delete_post(&self, post_id: i64) -> StoreResult<u64> {
        self.posts.delete(post_id).await
    }

    async fn get_like_count(&self, post_id: i64) -> StoreResult<i64> {
        self.likes.count(post_id).await
    }

    async fn has_user_liked(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        self.likes.exists(post_id, user_id).await
    }

    async fn add_like(&self, post_id: i64, user_id: i64) -> StoreResult<i64> {
        self.likes.add(post_id, user_id).await
    }

    async fn remove_like(&self, post_id: i64, user_id: i64) -> StoreResult<u64> {
        self.likes.remove(post_id, user_id).await
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        self.likes.toggle(post_id, user_id).await
    }

    async fn get_all_notifications(
        &self,
        recipient_user_id: Option<i64>,
    ) -> StoreResult<Vec<Notification>> {
        self.notifications.get_all(recipient_user_id).await
    }

    async fn create_notification(&self, new_notification: &NewNotification) -> StoreResult<i64> {
        self.notifications.create(new_notification).await
    }

    async fn mark_notification_as_read(&self, notification_id: i64) -> StoreResult<u64> {
        self.notifications.mark_as_read(notification_id).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(database::health_check(&self.pool).await?)
    }

    async fn get_feed(&self, viewer: Option<i64>) -> StoreResult<Vec<FeedEntry>> {
        self.posts.get_feed(viewer).await
    }
}
