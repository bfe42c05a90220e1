//! Durable single-slot store on local disk.
//!
//! The whole record list lives as one JSON array in
//! `<data_dir>/cybervault_users.json`. Opening only resolves the path; the
//! slot is read on first use and cached. It is rewritten wholesale after
//! every create/delete through a temp file + rename, so a crash mid-write
//! never leaves a truncated slot behind.
//!
//! An unreadable slot surfaces as `StoreUnavailable` from every call and is
//! re-read on the next one. Mutations are refused until a read succeeds, so
//! a bad slot is never overwritten.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{ListOrder, RecordStore, StoreBackend};
use crate::error::{Result, VaultError};
use crate::record::{ProfileDraft, ProfileRecord};

/// Namespace key of the slot; also the file stem on disk.
pub const SLOT_KEY: &str = "cybervault_users";

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    /// `None` until the slot has been read successfully.
    records: Mutex<Option<Vec<ProfileRecord>>>,
}

impl LocalStore {
    /// Point at the slot under `data_dir`. Nothing is read yet.
    #[must_use]
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(format!("{SLOT_KEY}.json"));
        tracing::debug!(path = %path.display(), "local slot configured");
        Self {
            path,
            records: Mutex::new(None),
        }
    }

    /// Location of the slot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the cache. A poisoned cache may hold a half-applied mutation, so
    /// it is dropped and the slot re-read on next use.
    fn cache(&self, op: &'static str) -> MutexGuard<'_, Option<Vec<ProfileRecord>>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(
                    op,
                    path = %self.path.display(),
                    "local cache poisoned; reloading slot"
                );
                self.records.clear_poison();
                let mut guard = poisoned.into_inner();
                *guard = None;
                guard
            }
        }
    }
}

/// Cached records, reading the slot first if it has not been loaded.
fn loaded<'a>(
    cache: &'a mut Option<Vec<ProfileRecord>>,
    path: &Path,
) -> Result<&'a mut Vec<ProfileRecord>> {
    if cache.is_none() {
        let records = read_slot(path)?;
        tracing::debug!(path = %path.display(), count = records.len(), "loaded local slot");
        *cache = Some(records);
    }
    cache
        .as_mut()
        .ok_or_else(|| VaultError::unavailable("local slot not loaded"))
}

impl RecordStore for LocalStore {
    fn list_all(&self) -> Result<Vec<ProfileRecord>> {
        let mut cache = self.cache("list_all");
        Ok(loaded(&mut cache, &self.path)?.clone())
    }

    fn create(&self, draft: ProfileDraft) -> Result<ProfileRecord> {
        let draft = draft.normalized();
        draft.validate()?;

        let mut cache = self.cache("create");
        let records = loaded(&mut cache, &self.path)?;
        let created_at = Utc::now();
        let id = unique_id(created_at.timestamp_millis(), records);
        let record = ProfileRecord::from_draft(draft, id, created_at);

        let mut next = records.clone();
        next.push(record.clone());
        write_slot(&self.path, &next)?;
        *records = next;

        tracing::info!(id = %record.id, "created local record");
        Ok(record)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut cache = self.cache("delete");
        let records = loaded(&mut cache, &self.path)?;
        let Some(index) = records.iter().position(|r| r.id == id) else {
            return Err(VaultError::not_found(id));
        };

        let mut next = records.clone();
        next.remove(index);
        write_slot(&self.path, &next)?;
        *records = next;

        tracing::info!(id, "deleted local record");
        Ok(())
    }

    fn ordering(&self) -> ListOrder {
        ListOrder::InsertionOrder
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Local
    }
}

/// Millisecond-timestamp id, bumped past any id already taken.
fn unique_id(millis: i64, records: &[ProfileRecord]) -> String {
    let mut candidate = millis;
    loop {
        let id = candidate.to_string();
        if !records.iter().any(|r| r.id == id) {
            return id;
        }
        candidate += 1;
    }
}

fn read_slot(path: &Path) -> Result<Vec<ProfileRecord>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(VaultError::unavailable(format!(
                "cannot read {}: {err}",
                path.display()
            )))
        }
    };
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).map_err(|err| {
        VaultError::unavailable(format!("corrupt slot {}: {err}", path.display()))
    })
}

fn write_slot(path: &Path, records: &[ProfileRecord]) -> Result<()> {
    persist(path, records).map_err(|err| {
        tracing::error!(path = %path.display(), error = %err, "failed to write local slot");
        VaultError::unavailable(format!("cannot write {}: {err}", path.display()))
    })
}

fn persist(path: &Path, records: &[ProfileRecord]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_vec(records).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
