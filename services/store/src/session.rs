//! Persisted login session
//!
//! The session is a small JSON document (`userId`, `username`, `email`,
//! `isLoggedIn`) written at login and cleared at logout. A missing or
//! unreadable file means nobody is logged in.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::StoreResult, models::User};

/// Login session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_logged_in: bool,
}

impl Session {
    /// Session for a freshly authenticated user
    pub fn logged_in(user: &User) -> Self {
        Self {
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            email: Some(user.email.clone()),
            is_logged_in: true,
        }
    }

    /// The session's user id, if it describes a logged-in user
    pub fn active_user_id(&self) -> Option<i64> {
        if self.is_logged_in { self.user_id } else { None }
    }
}

/// JSON file holding the current [`Session`]
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Session {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", self.path.display());
                return Session::default();
            }
            Err(e) => {
                warn!("Failed to read session file {}: {}", self.path.display(), e);
                return Session::default();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", self.path.display(), e);
                Session::default()
            }
        }
    }

    pub async fn save(&self, session: &Session) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(session).map_err(std::io::Error::from)?;
        tokio::fs::write(&self.path, body).await?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Forget the session; clearing an absent session is not an error
    pub async fn clear(&self) -> StoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.io".to_string(),
            password_hash: String::new(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_active_user_id_requires_login_flag() {
        let mut session = Session::logged_in(&user());
        assert_eq!(session.active_user_id(), Some(7));

        session.is_logged_in = false;
        assert_eq!(session.active_user_id(), None);
        assert_eq!(Session::default().active_user_id(), None);
    }

    #[test]
    fn test_session_uses_camel_case_keys() {
        let value = serde_json::to_value(Session::logged_in(&user())).unwrap();
        assert_eq!(value["userId"], 7);
        assert_eq!(value["isLoggedIn"], true);
        assert_eq!(value["username"], "alice");
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().await, Session::default());

        let session = Session::logged_in(&user());
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await, session);

        store.clear().await.unwrap();
        assert_eq!(store.load().await, Session::default());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert_eq!(SessionStore::new(path).load().await, Session::default());
    }
}
