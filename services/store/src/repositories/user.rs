//! User repository for database operations

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::{
    error::StoreResult,
    models::{NewUser, User},
    password::PasswordHasher,
};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    hasher: PasswordHasher,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hasher: PasswordHasher::new(),
        }
    }

    /// Create a new user
    ///
    /// Duplicate usernames or emails surface as `StoreError::UniquenessViolation`.
    pub async fn create(&self, new_user: &NewUser) -> StoreResult<i64> {
        info!("Creating new user: {}", new_user.username);

        let password_hash = self.hasher.hash(&new_user.password)?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Find a user by username or email
    pub async fn find_by_username_or_email(&self, username_or_email: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by username or email: {}", username_or_email);

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = ?1 OR email = ?1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(username_or_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        debug!("Finding user by ID: {}", id);

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Verify a user's password
    pub fn verify_password(&self, user: &User, password: &str) -> bool {
        self.hasher.verify(password, &user.password_hash)
    }

    /// Authenticate by username or email
    ///
    /// Unknown identifiers and wrong passwords both yield `None`. Accounts
    /// still carrying a legacy digest are rehashed on success.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(mut user) = self.find_by_username_or_email(identifier).await? else {
            debug!("Authentication failed: no such user");
            return Ok(None);
        };

        if !self.verify_password(&user, password) {
            debug!("Authentication failed: password mismatch");
            return Ok(None);
        }

        if PasswordHasher::needs_rehash(&user.password_hash) {
            match self.rehash(user.id, password).await {
                Ok(hash) => user.password_hash = hash,
                Err(e) => warn!("Could not upgrade password hash for user {}: {}", user.id, e),
            }
        }

        info!("User authenticated: {}", user.username);
        Ok(Some(user))
    }

    async fn rehash(&self, id: i64, password: &str) -> StoreResult<String> {
        let password_hash = self.hasher.hash(password)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!("Upgraded legacy password hash for user {}", id);
        Ok(password_hash)
    }

    /// Check whether a username is taken
    pub async fn exists(&self, username: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Lowest existing user id, if any
    pub async fn first_id(&self) -> StoreResult<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM users ORDER BY id ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(id)
    }
}
