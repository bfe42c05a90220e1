//! Record storage contract and its two backends.
//!
//! Module tree:
//!   store/local.rs  - JSON slot on local disk, durable across restarts
//!   store/remote.rs - hosted table reached over HTTP
//!
//! Callers hold an `Arc<dyn RecordStore>` from [`open_store`] and never branch
//! on which backend sits behind it.

mod local;
mod remote;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{ProfileDraft, ProfileRecord};

pub use local::{LocalStore, SLOT_KEY};
pub use remote::{RemoteConfig, RemoteStore};

/// Which backend a store is, for diagnostics and the UI header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Local,
    Remote,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order in which `list_all` hands records back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Oldest first, as records were created.
    InsertionOrder,
    /// Newest first by `created_at`, ordered by the service.
    NewestFirst,
}

/// Persistence contract shared by every backend.
pub trait RecordStore: Send + Sync {
    /// All stored records, in [`RecordStore::ordering`] order.
    fn list_all(&self) -> Result<Vec<ProfileRecord>>;

    /// Validate and persist a draft; the store assigns `id` and `created_at`.
    fn create(&self, draft: ProfileDraft) -> Result<ProfileRecord>;

    /// Remove one record. `NotFound` when nothing has that id.
    fn delete(&self, id: &str) -> Result<()>;

    fn ordering(&self) -> ListOrder;

    fn backend(&self) -> StoreBackend;
}

/// Everything needed to open either backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
    pub remote_url: Option<String>,
    pub remote_key: Option<String>,
    pub remote_table: String,
    pub remote_timeout: Duration,
}

/// Open the backend named by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Local => {
            let store = LocalStore::open(&config.data_dir);
            Ok(Arc::new(store))
        }
        StoreBackend::Remote => {
            let url = config.remote_url.clone().ok_or_else(|| {
                crate::VaultError::unavailable("remote backend selected but no remote URL set")
            })?;
            let mut remote = RemoteConfig::new(url, config.remote_table.clone())
                .with_timeout(config.remote_timeout);
            if let Some(key) = &config.remote_key {
                remote = remote.with_api_key(key.clone());
            }
            Ok(Arc::new(RemoteStore::new(remote)?))
        }
    }
}
