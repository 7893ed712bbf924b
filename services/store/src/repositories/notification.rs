//! Notification repository for database operations

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::StoreResult,
    models::{JUST_NOW, NewNotification, Notification},
};

/// Notification repository
#[derive(Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Notifications, optionally for one recipient, newest id first
    pub async fn get_all(&self, recipient_user_id: Option<i64>) -> StoreResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_user_id, actor_name, action_text, location,
                   time_ago, profile_image, is_read
            FROM notifications
            WHERE ?1 IS NULL OR recipient_user_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(recipient_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Create an unread notification stamped "just now"
    pub async fn create(&self, new_notification: &NewNotification) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications
                (recipient_user_id, actor_name, action_text, location, time_ago, profile_image, is_read)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(new_notification.recipient_user_id)
        .bind(&new_notification.actor_name)
        .bind(&new_notification.action_text)
        .bind(&new_notification.location)
        .bind(JUST_NOW)
        .bind(&new_notification.profile_image)
        .execute(&self.pool)
        .await?;

        info!(
            "Notification for user {} from {}",
            new_notification.recipient_user_id, new_notification.actor_name
        );
        Ok(result.last_insert_rowid())
    }

    /// Mark one notification as read; 0 when the id is unknown
    pub async fn mark_as_read(&self, id: i64) -> StoreResult<u64> {
        let updated = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated)
    }
}
