//! Hosted table store reached over a PostgREST-style HTTP API.
//!
//! Rows travel as snake_case JSON. Inserts and deletes ask for
//! `return=representation` so the service echoes the affected rows; an empty
//! delete echo means nothing matched the id.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::{ListOrder, RecordStore, StoreBackend};
use crate::error::{Result, VaultError};
use crate::record::{ProfileDraft, ProfileRecord};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the hosted table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    pub table: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            table: table.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }
}

pub struct RemoteStore {
    config: RemoteConfig,
    client: Client,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("url", &self.config.table_url())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VaultError::unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn request(&self, method: reqwest::Method) -> RequestBuilder {
        let mut req = self.client.request(method, self.config.table_url());
        if let Some(key) = &self.config.api_key {
            req = req.header("apikey", key.as_str());
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {key}")) {
                req = req.header(AUTHORIZATION, bearer);
            }
        }
        req
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let response = req.send().map_err(|e| transport_error(what, &e))?;
        let response = check_status(response, what)?;
        response
            .json()
            .map_err(|e| VaultError::unavailable(format!("{what}: undecodable response: {e}")))
    }
}

impl RecordStore for RemoteStore {
    fn list_all(&self) -> Result<Vec<ProfileRecord>> {
        let req = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let rows: Vec<RemoteRow> = self.send(req, "list")?;
        tracing::debug!(count = rows.len(), "listed remote records");
        Ok(rows.into_iter().map(ProfileRecord::from).collect())
    }

    fn create(&self, draft: ProfileDraft) -> Result<ProfileRecord> {
        let draft = draft.normalized();
        draft.validate()?;

        let body = InsertRow::new(&draft, Utc::now());
        let req = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(&body);
        let rows: Vec<RemoteRow> = self.send(req, "create")?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| VaultError::unavailable("create: service returned no row"))?;
        tracing::info!(id = %row.id, "created remote record");
        Ok(row.into())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let req = self
            .request(reqwest::Method::DELETE)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))]);
        let deleted: Vec<serde_json::Value> = self.send(req, "delete")?;
        if deleted.is_empty() {
            return Err(VaultError::not_found(id));
        }
        tracing::info!(id, "deleted remote record");
        Ok(())
    }

    fn ordering(&self) -> ListOrder {
        ListOrder::NewestFirst
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Remote
    }
}

fn transport_error(what: &str, err: &reqwest::Error) -> VaultError {
    tracing::warn!(operation = what, error = %err, "remote request failed");
    if err.is_timeout() {
        VaultError::unavailable(format!("{what}: request timed out"))
    } else {
        VaultError::unavailable(format!("{what}: {err}"))
    }
}

fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::warn!(operation = what, %status, "remote store rejected request");
    Err(VaultError::unavailable(format!(
        "{what} failed with status {status}: {body}"
    )))
}

/// A table row as the service returns it.
#[derive(Debug, Deserialize)]
struct RemoteRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    full_name: String,
    email: String,
    phone_number: String,
    #[serde(default)]
    age: Option<u8>,
    #[serde(default)]
    nin: Option<String>,
    #[serde(default)]
    driving_license: Option<String>,
    #[serde(default)]
    residence_address: Option<String>,
    #[serde(default)]
    photo: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RemoteRow> for ProfileRecord {
    fn from(row: RemoteRow) -> Self {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            age: row.age,
            national_id: blank_to_none(row.nin),
            driving_license: blank_to_none(row.driving_license),
            residence_address: blank_to_none(row.residence_address),
            photo: blank_to_none(row.photo),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert payload. `id` is left to the service.
#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    full_name: &'a str,
    email: &'a str,
    phone_number: &'a str,
    age: Option<u8>,
    nin: Option<&'a str>,
    driving_license: Option<&'a str>,
    residence_address: Option<&'a str>,
    photo: Option<&'a str>,
    created_at: DateTime<Utc>,
}

impl<'a> InsertRow<'a> {
    fn new(draft: &'a ProfileDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            full_name: &draft.full_name,
            email: &draft.email,
            phone_number: &draft.phone_number,
            age: draft.age,
            nin: draft.national_id.as_deref(),
            driving_license: draft.driving_license.as_deref(),
            residence_address: draft.residence_address.as_deref(),
            photo: draft.photo.as_deref(),
            created_at,
        }
    }
}

/// Tables keyed by bigint or uuid both come back as a string id.
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported id value: {other}"
        ))),
    }
}
