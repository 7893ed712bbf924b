//! The record store facade
//!
//! Front ends talk to users, posts, likes and notifications only through
//! [`RecordStore`]. [`LocalStore`](crate::local::LocalStore) implements it over
//! the embedded SQLite file and [`RestStore`](crate::remote::RestStore) over a
//! hosted PostgREST API; which one is used is decided once, at composition time.

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    models::{FeedEntry, NewNotification, NewPost, NewUser, Notification, Post, User},
};

/// Persistence facade over users, posts, likes and notifications
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Match `identifier` against username or email and check the password
    ///
    /// Returns `None` both for unknown identifiers and wrong passwords.
    async fn authenticate(&self, identifier: &str, password: &str) -> StoreResult<Option<User>>;

    /// Register a user, returning the new id
    async fn create_user(&self, new_user: &NewUser) -> StoreResult<i64>;

    async fn user_exists(&self, username: &str) -> StoreResult<bool>;

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Lowest existing user id; only meant for the development identity fallback
    async fn get_any_user_id(&self) -> StoreResult<Option<i64>>;

    async fn create_post(&self, new_post: &NewPost) -> StoreResult<i64>;

    /// All posts joined with their owner's username, newest first
    async fn get_all_posts(&self) -> StoreResult<Vec<Post>>;

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>>;

    /// Posts owned by `user_id`, newest first
    async fn get_posts_by_user(&self, user_id: i64) -> StoreResult<Vec<Post>>;

    /// Delete a post after removing its likes; returns posts removed (0 or 1)
    async fn delete_post(&self, post_id: i64) -> StoreResult<u64>;

    async fn get_like_count(&self, post_id: i64) -> StoreResult<i64>;

    async fn has_user_liked(&self, post_id: i64, user_id: i64) -> StoreResult<bool>;

    /// Idempotent: liking twice keeps a single like and returns its id
    async fn add_like(&self, post_id: i64, user_id: i64) -> StoreResult<i64>;

    async fn remove_like(&self, post_id: i64, user_id: i64) -> StoreResult<u64>;

    /// Flip the like state of `(post_id, user_id)` and return the new state
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> StoreResult<bool>;

    /// Notifications, optionally for a single recipient, newest id first
    async fn get_all_notifications(
        &self,
        recipient_user_id: Option<i64>,
    ) -> StoreResult<Vec<Notification>>;

    async fn create_notification(&self, new_notification: &NewNotification) -> StoreResult<i64>;

    /// Rows updated; 0 when the id does not exist
    async fn mark_notification_as_read(&self, notification_id: i64) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<bool>;

    /// Posts with their like count and whether `viewer` likes them
    async fn get_feed(&self, viewer: Option<i64>) -> StoreResult<Vec<FeedEntry>> {
        let posts = self.get_all_posts().await?;
        let mut feed = Vec::with_capacity(posts.len());

        for post in posts {
            let like_count = self.get_like_count(post.id).await?;
            let liked_by_viewer = match viewer {
                Some(user_id) => self.has_user_liked(post.id, user_id).await?,
                None => false,
            };
            feed.push(FeedEntry {
                post,
                like_count,
                liked_by_viewer,
            });
        }

        Ok(feed)
    }
}
