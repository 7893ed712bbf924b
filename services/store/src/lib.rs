//! Persistence and authentication for CheckNShare
//!
//! Users, photo posts, likes and notifications live behind the
//! [`RecordStore`] facade. Two implementations exist: [`LocalStore`] over an
//! embedded SQLite file and [`RestStore`] over a hosted PostgREST API.
//!
//! # Example
//!
//! ```no_run
//! use store::{RecordStore, settings::Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let store = store::connect_backend(&settings).await?;
//!
//!     for entry in store.get_feed(None).await? {
//!         println!("{} ({} likes)", entry.post.username, entry.like_count);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::info;

pub mod error;
pub mod identity;
pub mod local;
pub mod models;
pub mod password;
pub mod record_store;
pub mod remote;
pub mod repositories;
pub mod schema;
pub mod session;
pub mod settings;
pub mod validation;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use record_store::RecordStore;
pub use remote::RestStore;

use settings::{BackendKind, Settings};

/// Compose the configured backend
pub async fn connect_backend(settings: &Settings) -> StoreResult<Arc<dyn RecordStore>> {
    match settings.backend {
        BackendKind::Local => {
            info!("Using local record store at {}", settings.database.url);
            let store =
                LocalStore::open(&settings.database_config(), &settings.schema_manager()).await?;
            Ok(Arc::new(store))
        }
        BackendKind::Remote => {
            let store = RestStore::new(&settings.remote_config()?)?;
            Ok(Arc::new(store))
        }
    }
}
