//! Layered settings
//!
//! Built-in defaults (the database section seeded from `DATABASE_*` through
//! [`DatabaseConfig::from_env`]), then an optional `checknshare.toml`, then
//! `CHECKNSHARE__SECTION__KEY` environment variables
//! (e.g. `CHECKNSHARE__DATABASE__URL`, `CHECKNSHARE__BACKEND=remote`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::database::DatabaseConfig;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{
    error::{StoreError, StoreResult},
    identity::IdentityResolver,
    remote::RemoteConfig,
    schema::{SCHEMA_VERSION, SchemaManager},
    session::SessionStore,
};

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "checknshare.toml";
const ENV_PREFIX: &str = "CHECKNSHARE";

/// Which record store implementation to compose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    /// Seconds
    pub busy_timeout: u64,
    pub schema_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    /// Act as any existing user when nobody is logged in
    pub dev_fallback: bool,
}

/// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub backend: BackendKind,
    pub database: DatabaseSettings,
    pub remote: RemoteSettings,
    pub session: SessionSettings,
    pub identity: IdentitySettings,
}

impl Settings {
    /// Load settings from `path` (required) or the default file (optional)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let database = DatabaseConfig::from_env().context("Invalid DATABASE_* environment")?;

        let settings = Config::builder()
            .set_default("backend", "local")?
            .set_default("database.url", database.database_url)?
            .set_default("database.max_connections", i64::from(database.max_connections))?
            .set_default("database.busy_timeout", i64::try_from(database.busy_timeout)?)?
            .set_default("database.schema_version", i64::from(SCHEMA_VERSION))?
            .set_default("remote.timeout_secs", 10_i64)?
            .set_default("session.path", "checknshare-session.json")?
            .set_default("identity.dev_fallback", cfg!(debug_assertions))?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;

        if settings.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        Ok(settings)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            busy_timeout: self.database.busy_timeout,
        }
    }

    pub fn schema_manager(&self) -> SchemaManager {
        SchemaManager::new(self.database.schema_version)
    }

    /// Remote settings; URL and API key are mandatory for the remote backend
    pub fn remote_config(&self) -> StoreResult<RemoteConfig> {
        let url = self.remote.url.clone().ok_or_else(|| {
            StoreError::Configuration("remote.url is required for the remote backend".to_string())
        })?;
        let api_key = self.remote.api_key.clone().ok_or_else(|| {
            StoreError::Configuration(
                "remote.api_key is required for the remote backend".to_string(),
            )
        })?;

        Ok(RemoteConfig {
            url,
            api_key,
            timeout_secs: self.remote.timeout_secs,
        })
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(&self.session.path)
    }

    pub fn identity_resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.identity.dev_fallback)
    }
}
