//! Current-user resolution

use tracing::debug;

use crate::{error::StoreResult, record_store::RecordStore, session::Session};

/// Where the current user id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// A logged-in session
    Session(i64),
    /// Any existing user, picked because nobody is logged in
    DevFallback(i64),
}

impl Identity {
    pub fn user_id(&self) -> i64 {
        match self {
            Identity::Session(id) | Identity::DevFallback(id) => *id,
        }
    }
}

/// Resolves the acting user from the session, with an optional fallback
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    dev_fallback: bool,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl IdentityResolver {
    pub fn new(dev_fallback: bool) -> Self {
        Self { dev_fallback }
    }

    /// The acting user, or `None` when nobody is logged in and the
    /// fallback is disabled or the store has no users
    pub async fn current_user_id(
        &self,
        session: &Session,
        store: &dyn RecordStore,
    ) -> StoreResult<Option<Identity>> {
        if let Some(id) = session.active_user_id() {
            return Ok(Some(Identity::Session(id)));
        }

        if !self.dev_fallback {
            return Ok(None);
        }

        let fallback = store.get_any_user_id().await?;
        if let Some(id) = fallback {
            debug!("No active session; acting as user {}", id);
        }
        Ok(fallback.map(Identity::DevFallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{local::LocalStore, schema::SchemaManager};
    use common::database::DatabaseConfig;

    async fn seeded_store(dir: &tempfile::TempDir) -> LocalStore {
        let config = DatabaseConfig::for_path(dir.path().join("identity.db"));
        LocalStore::open(&config, &SchemaManager::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_session_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir).await;
        let session = Session {
            user_id: Some(42),
            is_logged_in: true,
            ..Session::default()
        };

        let identity = IdentityResolver::new(true)
            .current_user_id(&session, &store)
            .await
            .unwrap();
        assert_eq!(identity, Some(Identity::Session(42)));
    }

    #[tokio::test]
    async fn test_fallback_is_gated() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir).await;
        let logged_out = Session::default();

        let disabled = IdentityResolver::new(false)
            .current_user_id(&logged_out, &store)
            .await
            .unwrap();
        assert_eq!(disabled, None);

        let enabled = IdentityResolver::new(true)
            .current_user_id(&logged_out, &store)
            .await
            .unwrap();
        assert_eq!(enabled, Some(Identity::DevFallback(1)));
        assert_eq!(enabled.map(|i| i.user_id()), Some(1));
    }
}
