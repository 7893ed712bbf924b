//! Post model and related functionality

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Storage format of `created_at`; sorts lexically in chronological order
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format shown next to a post in the feed
pub const DISPLAY_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Post entity joined with the owner's username
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    /// Bundled asset identifier (`photo_placeholder_1`) or stored photo file name
    pub image_ref: Option<String>,
    pub location: Option<String>,
    pub location_address: Option<String>,
    pub created_at: String,
}

impl Post {
    /// Creation time in the `dd-MM-yyyy HH:mm` display format
    ///
    /// Timestamps that do not parse are returned untouched.
    pub fn display_created_at(&self) -> String {
        NaiveDateTime::parse_from_str(&self.created_at, TIMESTAMP_FORMAT)
            .map(|ts| ts.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|_| self.created_at.clone())
    }
}

/// New post creation payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: i64,
    pub image_ref: Option<String>,
    pub location: Option<String>,
    /// Resolved address; defaults to `location` when not given
    pub location_address: Option<String>,
}

impl NewPost {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.location_address = Some(address.into());
        self
    }

    /// Address to persist: the resolved one, or the free-text label
    pub fn resolved_address(&self) -> Option<&str> {
        self.location_address
            .as_deref()
            .or(self.location.as_deref())
    }
}

/// A post as shown in the feed of a given viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

/// Current UTC time in the storage format
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
