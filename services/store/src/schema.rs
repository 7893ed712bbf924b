//! Schema management for the embedded store
//!
//! The schema version lives in `PRAGMA user_version`. A database at the
//! expected version only gets the idempotent `CREATE TABLE IF NOT EXISTS`
//! pass; a fresh one is created and seeded; any other version is dropped
//! wholesale, recreated and reseeded. There is no incremental migration path.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::{error::StoreResult, password::PasswordHasher};

/// Schema version expected by this release
pub const SCHEMA_VERSION: u32 = 3;

pub const DEMO_USERNAME: &str = "test";
pub const DEMO_EMAIL: &str = "test@example.com";
pub const DEMO_PASSWORD: &str = "test123";

const DEMO_IMAGES: [&str; 3] = [
    "photo_placeholder_1",
    "photo_placeholder_2",
    "photo_placeholder_3",
];

const DEMO_NOTIFICATIONS: [(&str, &str, &str, &str); 4] = [
    ("Marie Dubois", "a publié une photo", "Tour Eiffel, Paris", "5 min"),
    (
        "Alex Martin",
        "a publié une photo",
        "Le Comptoir du Relais, Paris",
        "1h",
    ),
    (
        "Sophie Bernard",
        "a commenté votre photo",
        "Musée du Louvre, Paris",
        "2h",
    ),
    (
        "Thomas Laurent",
        "a aimé votre photo",
        "Arc de Triomphe, Paris",
        "3h",
    ),
];

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_POSTS: &str = r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        image_ref TEXT,
        location TEXT,
        location_address TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY(user_id) REFERENCES users(id)
    )
"#;

const CREATE_LIKES: &str = r#"
    CREATE TABLE IF NOT EXISTS likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        FOREIGN KEY(post_id) REFERENCES posts(id),
        FOREIGN KEY(user_id) REFERENCES users(id)
    )
"#;

const CREATE_LIKES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_likes_post_user ON likes (post_id, user_id)";

const CREATE_NOTIFICATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipient_user_id INTEGER NOT NULL,
        actor_name TEXT NOT NULL,
        action_text TEXT NOT NULL,
        location TEXT,
        time_ago TEXT NOT NULL,
        profile_image TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(recipient_user_id) REFERENCES users(id)
    )
"#;

/// Children before parents so foreign keys never dangle mid-drop
const DROP_ORDER: [&str; 4] = ["likes", "notifications", "posts", "users"];

/// What `prepare` found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No schema yet (`user_version` 0)
    Absent,
    /// Already at the expected version
    Current,
    /// Written by another version; recreated from scratch
    Stale { found: u32 },
}

impl SchemaState {
    pub fn classify(found: u32, expected: u32) -> Self {
        if found == 0 {
            SchemaState::Absent
        } else if found == expected {
            SchemaState::Current
        } else {
            SchemaState::Stale { found }
        }
    }
}

/// Creates, upgrades and seeds the four relations
#[derive(Clone)]
pub struct SchemaManager {
    expected_version: u32,
    hasher: PasswordHasher,
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new(SCHEMA_VERSION)
    }
}

impl SchemaManager {
    pub fn new(expected_version: u32) -> Self {
        Self {
            expected_version: expected_version.max(1),
            hasher: PasswordHasher::new(),
        }
    }

    pub fn expected_version(&self) -> u32 {
        self.expected_version
    }

    /// Bring the database to the expected version
    ///
    /// Runs in a single transaction; a failure leaves the file untouched.
    /// The write lock is taken before the version is read, so processes
    /// opening the same file queue on the busy timeout.
    pub async fn prepare(&self, pool: &SqlitePool) -> StoreResult<SchemaState> {
        let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

        let found: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&mut *tx)
            .await?;
        let state =
            SchemaState::classify(u32::try_from(found).unwrap_or(0), self.expected_version);

        match state {
            SchemaState::Absent => {
                info!("Creating schema at version {}", self.expected_version);
                create_tables(&mut tx).await?;
                self.seed(&mut tx).await?;
                self.stamp_version(&mut tx).await?;
            }
            SchemaState::Stale { found } => {
                warn!(
                    "Schema version {} differs from expected {}; dropping and recreating all tables",
                    found, self.expected_version
                );
                drop_tables(&mut tx).await?;
                create_tables(&mut tx).await?;
                self.seed(&mut tx).await?;
                self.stamp_version(&mut tx).await?;
            }
            SchemaState::Current => {
                create_tables(&mut tx).await?;
            }
        }

        tx.commit().await?;
        Ok(state)
    }

    async fn stamp_version(&self, tx: &mut Transaction<'_, Sqlite>) -> StoreResult<()> {
        // PRAGMA arguments cannot be bound
        sqlx::query(&format!("PRAGMA user_version = {}", self.expected_version))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Demo user, three posts with 5/10/15 likes, four notifications
    async fn seed(&self, tx: &mut Transaction<'_, Sqlite>) -> StoreResult<()> {
        let password_hash = self.hasher.hash(DEMO_PASSWORD)?;
        let user_id =
            sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
                .bind(DEMO_USERNAME)
                .bind(DEMO_EMAIL)
                .bind(&password_hash)
                .execute(&mut **tx)
                .await?
                .last_insert_rowid();

        for (i, image) in DEMO_IMAGES.iter().enumerate() {
            let post_id = sqlx::query(
                "INSERT INTO posts (user_id, image_ref, location, location_address) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(*image)
            .bind("Paris, France")
            .bind(format!("Adresse Exemple {}", i))
            .execute(&mut **tx)
            .await?
            .last_insert_rowid();

            // Seeded counts come from the single demo user, so they bypass add_like
            for _ in 0..(i + 1) * 5 {
                sqlx::query("INSERT INTO likes (post_id, user_id) VALUES (?, ?)")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        for (actor, action, location, time_ago) in DEMO_NOTIFICATIONS {
            sqlx::query(
                r#"
                INSERT INTO notifications
                    (recipient_user_id, actor_name, action_text, location, time_ago, profile_image, is_read)
                VALUES (?, ?, ?, ?, ?, NULL, 0)
                "#,
            )
            .bind(user_id)
            .bind(actor)
            .bind(action)
            .bind(location)
            .bind(time_ago)
            .execute(&mut **tx)
            .await?;
        }

        info!(
            "Seeded demo user '{}' with {} posts and {} notifications",
            DEMO_USERNAME,
            DEMO_IMAGES.len(),
            DEMO_NOTIFICATIONS.len()
        );
        Ok(())
    }
}

async fn create_tables(tx: &mut Transaction<'_, Sqlite>) -> StoreResult<()> {
    for statement in [
        CREATE_USERS,
        CREATE_POSTS,
        CREATE_LIKES,
        CREATE_LIKES_INDEX,
        CREATE_NOTIFICATIONS,
    ] {
        sqlx::query(statement).execute(&mut **tx).await?;
    }
    Ok(())
}

async fn drop_tables(tx: &mut Transaction<'_, Sqlite>) -> StoreResult<()> {
    for table in DROP_ORDER {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::{DatabaseConfig, init_pool};

    #[test]
    fn test_classify() {
        assert_eq!(SchemaState::classify(0, 3), SchemaState::Absent);
        assert_eq!(SchemaState::classify(3, 3), SchemaState::Current);
        assert_eq!(SchemaState::classify(2, 3), SchemaState::Stale { found: 2 });
        assert_eq!(SchemaState::classify(4, 3), SchemaState::Stale { found: 4 });
    }

    #[test]
    fn test_version_zero_is_not_allowed() {
        assert_eq!(SchemaManager::new(0).expected_version(), 1);
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_walks_the_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&DatabaseConfig::for_path(dir.path().join("schema.db")))
            .await
            .unwrap();

        let manager = SchemaManager::new(3);
        assert_eq!(manager.prepare(&pool).await.unwrap(), SchemaState::Absent);
        assert_eq!(manager.prepare(&pool).await.unwrap(), SchemaState::Current);

        assert_eq!(count(&pool, "users").await, 1);
        assert_eq!(count(&pool, "posts").await, 3);
        assert_eq!(count(&pool, "likes").await, 5 + 10 + 15);
        assert_eq!(count(&pool, "notifications").await, 4);

        let bumped = SchemaManager::new(4);
        assert_eq!(
            bumped.prepare(&pool).await.unwrap(),
            SchemaState::Stale { found: 3 }
        );
        assert_eq!(count(&pool, "users").await, 1);

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 4);
    }

    #[tokio::test]
    async fn test_concurrent_prepare_on_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::for_path(dir.path().join("race.db"));
        let first = init_pool(&config).await.unwrap();
        let second = init_pool(&config).await.unwrap();

        let manager = SchemaManager::default();
        let (a, b) = tokio::join!(manager.prepare(&first), manager.prepare(&second));

        let mut states = [a.unwrap(), b.unwrap()];
        states.sort_by_key(|state| *state != SchemaState::Absent);
        assert_eq!(states, [SchemaState::Absent, SchemaState::Current]);
        assert_eq!(count(&first, "users").await, 1);
        assert_eq!(count(&second, "posts").await, 3);
    }

    #[tokio::test]
    async fn test_current_schema_recreates_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&DatabaseConfig::for_path(dir.path().join("ensure.db")))
            .await
            .unwrap();

        let manager = SchemaManager::default();
        manager.prepare(&pool).await.unwrap();

        sqlx::query("DROP TABLE likes").execute(&pool).await.unwrap();
        sqlx::query("DROP TABLE posts").execute(&pool).await.unwrap();

        assert_eq!(manager.prepare(&pool).await.unwrap(), SchemaState::Current);
        assert_eq!(count(&pool, "posts").await, 0);
        assert_eq!(count(&pool, "likes").await, 0);
        assert_eq!(count(&pool, "users").await, 1);
    }
}
