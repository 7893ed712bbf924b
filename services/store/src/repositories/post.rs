//! Post repository for database operations

use sqlx::{FromRow, Row, SqlitePool, sqlite::SqliteRow};
use tracing::{debug, info};

use crate::{
    error::StoreResult,
    models::{FeedEntry, NewPost, Post, post::now_timestamp},
};

/// Post repository
#[derive(Clone)]
pub struct PostRepository {
    pool: SqlitePool,
}

impl PostRepository {
    /// Create a new post repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post
    ///
    /// The owner is not checked here; the foreign key rejects unknown users.
    pub async fn create(&self, new_post: &NewPost) -> StoreResult<i64> {
        info!("Creating post for user {}", new_post.user_id);

        let result = sqlx::query(
            r#"
            INSERT INTO posts (user_id, image_ref, location, location_address, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_post.user_id)
        .bind(&new_post.image_ref)
        .bind(&new_post.location)
        .bind(new_post.resolved_address())
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get all posts with their owner's username, newest first
    pub async fn get_all(&self) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.user_id, u.username, p.image_ref, p.location,
                   p.location_address, p.created_at
            FROM posts p
            JOIN users u ON p.user_id = u.id
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Retrieved {} posts", posts.len());
        Ok(posts)
    }

    /// Get the feed as seen by `viewer`, newest first
    pub async fn get_feed(&self, viewer: Option<i64>) -> StoreResult<Vec<FeedEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.user_id, u.username, p.image_ref, p.location,
                   p.location_address, p.created_at,
                   (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
                   EXISTS(
                       SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?
                   ) AS liked_by_viewer
            FROM posts p
            JOIN users u ON p.user_id = u.id
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;

        let feed = rows.iter().map(feed_entry).collect::<Result<Vec<_>, _>>()?;
        Ok(feed)
    }

    /// Find a post by ID
    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.user_id, u.username, p.image_ref, p.location,
                   p.location_address, p.created_at
            FROM posts p
            JOIN users u ON p.user_id = u.id
            WHERE p.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Posts owned by `user_id`, newest first
    pub async fn find_by_user(&self, user_id: i64) -> StoreResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.user_id, u.username, p.image_ref, p.location,
                   p.location_address, p.created_at
            FROM posts p
            JOIN users u ON p.user_id = u.id
            WHERE p.user_id = ?
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        debug!("Retrieved {} posts for user {}", posts.len(), user_id);
        Ok(posts)
    }

    /// Delete a post and every like on it
    ///
    /// Likes go first, in the same transaction as the post row.
    pub async fn delete(&self, id: i64) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let likes = sqlx::query("DELETE FROM likes WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let posts = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!("Deleted post {} ({} likes removed)", id, likes);
        Ok(posts)
    }
}

fn feed_entry(row: &SqliteRow) -> Result<FeedEntry, sqlx::Error> {
    Ok(FeedEntry {
        post: Post::from_row(row)?,
        like_count: row.try_get("like_count")?,
        liked_by_viewer: row.try_get("liked_by_viewer")?,
    })
}
