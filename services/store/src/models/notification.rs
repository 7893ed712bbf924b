//! Notification model and related functionality

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// `time_ago` label given to freshly created notifications
pub const JUST_NOW: &str = "à l'instant";

/// Notification entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_user_id: i64,
    pub actor_name: String,
    pub action_text: String,
    pub location: Option<String>,
    pub time_ago: String,
    pub profile_image: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub is_read: bool,
}

/// New notification creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_user_id: i64,
    pub actor_name: String,
    pub action_text: String,
    pub location: Option<String>,
    pub profile_image: Option<String>,
}

/// Accepts `true`/`false` as well as the `0`/`1` integers older tables use
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
