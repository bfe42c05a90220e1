//! CyberVault library: profile records, their stores, search, and the directory
//! controller the terminal UI drives.

pub mod config;
pub mod controller;
pub mod error;
pub mod notice;
pub mod record;
pub mod screen;
pub mod search;
pub mod store;
mod telemetry;
pub mod worker;

pub use controller::{
    Applied, Confirm, DeleteOutcome, DirectoryController, Mutation, MutationOutcome,
};
pub use error::{Result, VaultError};
pub use notice::{NoticeCenter, NoticeKind, Notifier, SilentNotifier};
pub use record::{ProfileDraft, ProfileRecord};
pub use search::{filter, SearchQuery};
pub use store::{open_store, ListOrder, RecordStore, StoreBackend, StoreConfig};
pub use telemetry::{init_tracing, session_span, tracing_log_path};
