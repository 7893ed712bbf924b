//! Like repository for database operations

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Like repository
#[derive(Clone)]
pub struct LikeRepository {
    pool: SqlitePool,
}

impl LikeRepository {
    /// Create a new like repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of likes on a post
    pub async fn count(&self, post_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Whether `user_id` likes `post_id`
    pub async fn exists(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = ? AND user_id = ?)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Add a like, returning its id
    ///
    /// Idempotent: the conditional insert is a single statement, so a second
    /// call for the same pair returns the existing like instead of a new row.
    pub async fn add(&self, post_id: i64, user_id: i64) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (post_id, user_id)
            SELECT ?1, ?2
            WHERE NOT EXISTS (SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2)
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            info!("User {} liked post {}", user_id, post_id);
            return Ok(result.last_insert_rowid());
        }

        debug!("User {} already likes post {}", user_id, post_id);
        let id: Option<i64> =
            sqlx::query_scalar("SELECT MIN(id) FROM likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        id.ok_or_else(|| {
            StoreError::NotFound(format!("like on post {} by user {}", post_id, user_id))
        })
    }

    /// Remove every like `user_id` has on `post_id`
    pub async fn remove(&self, post_id: i64, user_id: i64) -> StoreResult<u64> {
        let removed = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!("User {} unliked post {} ({} rows)", user_id, post_id, removed);
        Ok(removed)
    }

    /// Flip the like state, returning the new state
    ///
    /// The transaction opens with the delete, so it holds the write lock from
    /// its first statement and concurrent toggles serialise behind it.
    pub async fn toggle(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = if removed > 0 {
            false
        } else {
            sqlx::query("INSERT INTO likes (post_id, user_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            true
        };

        tx.commit().await?;

        info!("User {} toggled like on post {}: now {}", user_id, post_id, liked);
        Ok(liked)
    }
}
