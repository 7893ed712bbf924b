//! Record store over a hosted PostgREST API
//!
//! Resources are `users`, `posts`, `likes` and `notifications` under
//! `{url}/rest/v1/`, with the same column names as the embedded schema.
//! Every request carries the project API key in the `apikey` and
//! `Authorization` headers.
//!
//! The API offers no multi-statement transactions, so `delete_post`,
//! `add_like` and `toggle_like` are sequences of single requests here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    error::{StoreError, StoreResult},
    models::{
        JUST_NOW, NewNotification, NewPost, NewUser, Notification, Post, User,
        post::now_timestamp,
    },
    password::PasswordHasher,
    record_store::RecordStore,
};

const POST_COLUMNS: &str =
    "id,user_id,image_ref,location,location_address,created_at,users!inner(username)";
const USER_COLUMNS: &str = "id,username,email,password_hash,created_at";

/// Hosted backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Project API key
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Remote record store
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    hasher: PasswordHasher,
}

#[derive(Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Deserialize)]
struct Author {
    username: String,
}

#[derive(Deserialize)]
struct PostRow {
    id: i64,
    user_id: i64,
    image_ref: Option<String>,
    location: Option<String>,
    location_address: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    users: Author,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            user_id: row.user_id,
            username: row.users.username,
            image_ref: row.image_ref,
            location: row.location,
            location_address: row.location_address,
            created_at: row.created_at.unwrap_or_default(),
        }
    }
}

impl RestStore {
    /// Build a client carrying the API key on every request
    pub fn new(config: &RemoteConfig) -> StoreResult<Self> {
        if config.url.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(StoreError::Configuration(
                "remote backend needs both a URL and an API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| StoreError::Configuration(format!("Invalid API key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| StoreError::Configuration(format!("Invalid API key: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!("Remote record store configured for {}", config.url);
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            hasher: PasswordHasher::new(),
        })
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, resource))
    }

    /// Rows of `resource` matching `query`
    async fn select<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        debug!("GET {} {:?}", resource, query);
        let response = self.request(Method::GET, resource).query(query).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Exact number of rows matching `filters`, read from `Content-Range`
    ///
    /// Only one row is transferred, so the server's row cap does not apply.
    async fn count(&self, resource: &str, filters: &[(&str, String)]) -> StoreResult<i64> {
        debug!("COUNT {} {:?}", resource, filters);
        let response = self
            .request(Method::GET, resource)
            .query(&[("select", "id"), ("limit", "1")])
            .query(filters)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check(response).await?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|range| range.to_str().ok())
            .and_then(range_total)
            .ok_or_else(|| StoreError::RemoteStatus {
                status: response.status().as_u16(),
                body: "response carries no Content-Range total".to_string(),
            })
    }

    /// Insert one row and return the stored representation
    async fn insert<T: DeserializeOwned>(
        &self,
        resource: &str,
        body: serde_json::Value,
    ) -> StoreResult<Vec<T>> {
        debug!("POST {}", resource);
        let response = self
            .request(Method::POST, resource)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Patch matching rows and return them
    async fn update<T: DeserializeOwned>(
        &self,
        resource: &str,
        filters: &[(&str, String)],
        body: serde_json::Value,
    ) -> StoreResult<Vec<T>> {
        debug!("PATCH {} {:?}", resource, filters);
        let response = self
            .request(Method::PATCH, resource)
            .query(filters)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Delete matching rows and return them
    async fn delete<T: DeserializeOwned>(
        &self,
        resource: &str,
        filters: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        debug!("DELETE {} {:?}", resource, filters);
        let response = self
            .request(Method::DELETE, resource)
            .query(filters)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    fn pair_filter(post_id: i64, user_id: i64) -> [(&'static str, String); 2] {
        [("post_id", eq(post_id)), ("user_id", eq(user_id))]
    }

    fn first_id(rows: Vec<IdRow>, what: &str) -> StoreResult<i64> {
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::NotFound(format!("{} was not returned by the backend", what)))
    }
}

/// PostgREST equality filter
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`
fn range_total(range: &str) -> Option<i64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}

/// Double-quote a value for use inside an `or=(...)` filter
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Turn non-success statuses into errors
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Remote backend answered {}: {}", status, body);

    if status == StatusCode::CONFLICT {
        Err(StoreError::UniquenessViolation(body))
    } else {
        Err(StoreError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn authenticate(&self, identifier: &str, password: &str) -> StoreResult<Option<User>> {
        let users: Vec<User> = self
            .select(
                "users",
                &[
                    ("select", USER_COLUMNS.to_string()),
                    (
                        "or",
                        format!(
                            "(username.eq.{0},email.eq.{0})",
                            quoted(identifier)
                        ),
                    ),
                    ("order", "id.asc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let Some(mut user) = users.into_iter().next() else {
            debug!("Authentication failed: no such user");
            return Ok(None);
        };

        if !self.hasher.verify(password, &user.password_hash) {
            debug!("Authentication failed: password mismatch");
            return Ok(None);
        }

        if PasswordHasher::needs_rehash(&user.password_hash) {
            let password_hash = self.hasher.hash(password)?;
            let updated: StoreResult<Vec<IdRow>> = self
                .update(
                    "users",
                    &[("id", eq(user.id))],
                    json!({ "password_hash": password_hash }),
                )
                .await;
            match updated {
                Ok(_) => user.password_hash = password_hash,
                Err(e) => warn!("Could not upgrade password hash for user {}: {}", user.id, e),
            }
        }

        info!("User authenticated: {}", user.username);
        Ok(Some(user))
    }

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<i64> {
        info!("Creating new user: {}", new_user.username);
        let password_hash = self.hasher.hash(&new_user.password)?;
        let rows: Vec<IdRow> = self
            .insert(
                "users",
                json!({
                    "username": new_user.username,
                    "email": new_user.email,
                    "password_hash": password_hash,
                }),
            )
            .await?;
        Self::first_id(rows, "new user")
    }

    async fn user_exists(&self, username: &str) -> StoreResult<bool> {
        let rows: Vec<IdRow> = self
            .select(
                "users",
                &[
                    ("select", "id".to_string()),
                    ("username", eq(username)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let users: Vec<User> = self
            .select(
                "users",
                &[("select", USER_COLUMNS.to_string()), ("id", eq(id))],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn get_any_user_id(&self) -> StoreResult<Option<i64>> {
        let rows: Vec<IdRow> = self
            .select(
                "users",
                &[
                    ("select", "id".to_string()),
                    ("order", "id.asc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }

    async fn create_post(&self, new_post: &NewPost) -> StoreResult<i64> {
        info!("Creating post for user {}", new_post.user_id);
        let rows: Vec<IdRow> = self
            .insert(
                "posts",
                json!({
                    "user_id": new_post.user_id,
                    "image_ref": new_post.image_ref,
                    "location": new_post.location,
                    "location_address": new_post.resolved_address(),
                    "created_at": now_timestamp(),
                }),
            )
            .await?;
        Self::first_id(rows, "new post")
    }

    async fn get_all_posts(&self) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> = self
            .select(
                "posts",
                &[
                    ("select", POST_COLUMNS.to_string()),
                    ("order", "created_at.desc,id.desc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn get_post(&self, post_id: i64) -> StoreResult<Option<Post>> {
        let rows: Vec<PostRow> = self
            .select(
                "posts",
                &[("select", POST_COLUMNS.to_string()), ("id", eq(post_id))],
            )
            .await?;
        Ok(rows.into_iter().next().map(Post::from))
    }

    async fn get_posts_by_user(&self, user_id: i64) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> = self
            .select(
                "posts",
                &[
                    ("select", POST_COLUMNS.to_string()),
                    ("user_id", eq(user_id)),
                    ("order", "created_at.desc,id.desc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn delete_post(&self, post_id: i64) -> StoreResult<u64> {
        let likes: Vec<IdRow> = self.delete("likes", &[("post_id", eq(post_id))]).await?;
        let posts: Vec<IdRow> = self.delete("posts", &[("id", eq(post_id))]).await?;
        info!("Deleted post {} ({} likes removed)", post_id, likes.len());
        Ok(posts.len() as u64)
    }

    async fn get_like_count(&self, post_id: i64) -> StoreResult<i64> {
        self.count("likes", &[("post_id", eq(post_id))]).await
    }

    async fn has_user_liked(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        let [post, user] = Self::pair_filter(post_id, user_id);
        let rows: Vec<IdRow> = self
            .select(
                "likes",
                &[("select", "id".to_string()), post, user, ("limit", "1".to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn add_like(&self, post_id: i64, user_id: i64) -> StoreResult<i64> {
        let [post, user] = Self::pair_filter(post_id, user_id);
        let existing: Vec<IdRow> = self
            .select(
                "likes",
                &[
                    ("select", "id".to_string()),
                    post,
                    user,
                    ("order", "id.asc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        if let Some(row) = existing.into_iter().next() {
            debug!("User {} already likes post {}", user_id, post_id);
            return Ok(row.id);
        }

        let rows: Vec<IdRow> = self
            .insert("likes", json!({ "post_id": post_id, "user_id": user_id }))
            .await?;
        info!("User {} liked post {}", user_id, post_id);
        Self::first_id(rows, "new like")
    }

    async fn remove_like(&self, post_id: i64, user_id: i64) -> StoreResult<u64> {
        let rows: Vec<IdRow> = self
            .delete("likes", &Self::pair_filter(post_id, user_id))
            .await?;
        Ok(rows.len() as u64)
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        if self.remove_like(post_id, user_id).await? > 0 {
            info!("User {} unliked post {}", user_id, post_id);
            return Ok(false);
        }

        self.add_like(post_id, user_id).await?;
        Ok(true)
    }

    async fn get_all_notifications(
        &self,
        recipient_user_id: Option<i64>,
    ) -> StoreResult<Vec<Notification>> {
        let mut query = vec![("select", "*".to_string()), ("order", "id.desc".to_string())];
        if let Some(recipient) = recipient_user_id {
            query.push(("recipient_user_id", eq(recipient)));
        }
        self.select("notifications", &query).await
    }

    async fn create_notification(&self, new_notification: &NewNotification) -> StoreResult<i64> {
        let rows: Vec<IdRow> = self
            .insert(
                "notifications",
                json!({
                    "recipient_user_id": new_notification.recipient_user_id,
                    "actor_name": new_notification.actor_name,
                    "action_text": new_notification.action_text,
                    "location": new_notification.location,
                    "time_ago": JUST_NOW,
                    "profile_image": new_notification.profile_image,
                    "is_read": false,
                }),
            )
            .await?;
        Self::first_id(rows, "new notification")
    }

    async fn mark_notification_as_read(&self, notification_id: i64) -> StoreResult<u64> {
        let rows: Vec<IdRow> = self
            .update(
                "notifications",
                &[("id", eq(notification_id))],
                json!({ "is_read": true }),
            )
            .await?;
        Ok(rows.len() as u64)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let reachable: StoreResult<Vec<IdRow>> = self
            .select(
                "users",
                &[("select", "id".to_string()), ("limit", "1".to_string())],
            )
            .await;
        match reachable {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Remote backend health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, api_key: &str) -> RemoteConfig {
        RemoteConfig {
            url: url.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_quoted_escapes_reserved_characters() {
        assert_eq!(quoted("alice"), "\"alice\"");
        assert_eq!(quoted("a,b)"), "\"a,b)\"");
        assert_eq!(quoted("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quoted("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn test_range_total() {
        assert_eq!(range_total("0-0/2500"), Some(2500));
        assert_eq!(range_total("*/0"), Some(0));
        assert_eq!(range_total("0-9/*"), None);
        assert_eq!(range_total("garbage"), None);
    }

    #[test]
    fn test_new_requires_url_and_key() {
        assert!(matches!(
            RestStore::new(&config("", "key")),
            Err(StoreError::Configuration(_))
        ));
        assert!(matches!(
            RestStore::new(&config("https://example.supabase.co", " ")),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_new_strips_trailing_slash() {
        let store = RestStore::new(&config("https://example.supabase.co/", "key")).unwrap();
        assert_eq!(store.base_url, "https://example.supabase.co");
    }

    #[test]
    fn test_post_row_flattens_author() {
        let row: PostRow = serde_json::from_value(json!({
            "id": 4,
            "user_id": 2,
            "image_ref": "1712000000000.jpg",
            "location": "Lyon",
            "location_address": null,
            "created_at": "2024-04-01 10:00:00",
            "users": { "username": "bob" }
        }))
        .unwrap();

        let post = Post::from(row);
        assert_eq!(post.username, "bob");
        assert_eq!(post.image_ref.as_deref(), Some("1712000000000.jpg"));
        assert_eq!(post.location_address, None);
    }
}
