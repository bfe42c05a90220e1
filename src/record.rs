//! Profile record schema and the draft used to create one.
//!
//! The serialized form matches what the browser build of CyberVault kept in
//! its `cybervault_users` slot: camelCase keys, the national id under `nin`,
//! and empty strings standing in for unset optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, VaultError};

/// Upper bound accepted for `age`.
pub const MAX_AGE: u8 = 150;

/// A stored profile. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(
        rename = "nin",
        alias = "nationalId",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub national_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub driving_license: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub residence_address: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    /// Stamp a validated draft with its store-assigned identity.
    #[must_use]
    pub fn from_draft(draft: ProfileDraft, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            full_name: draft.full_name,
            email: draft.email,
            phone_number: draft.phone_number,
            age: draft.age,
            national_id: draft.national_id,
            driving_license: draft.driving_license,
            residence_address: draft.residence_address,
            photo: draft.photo,
            created_at,
            updated_at: None,
        }
    }
}

/// Create input: a record without `id`, `createdAt`, or `updatedAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub age: Option<u8>,
    pub national_id: Option<String>,
    pub driving_license: Option<String>,
    pub residence_address: Option<String>,
    pub photo: Option<String>,
}

impl ProfileDraft {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            phone_number: phone_number.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_age(mut self, age: u8) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn with_national_id(mut self, nin: impl Into<String>) -> Self {
        self.national_id = Some(nin.into());
        self
    }

    #[must_use]
    pub fn with_driving_license(mut self, license: impl Into<String>) -> Self {
        self.driving_license = Some(license.into());
        self
    }

    #[must_use]
    pub fn with_residence_address(mut self, address: impl Into<String>) -> Self {
        self.residence_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Check required fields in form order, then the `age` range.
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(VaultError::missing("fullName"));
        }
        if self.email.trim().is_empty() {
            return Err(VaultError::missing("email"));
        }
        if self.phone_number.trim().is_empty() {
            return Err(VaultError::missing("phoneNumber"));
        }
        if self.age.is_some_and(|age| age > MAX_AGE) {
            return Err(VaultError::Validation {
                field: "age",
                reason: "must be between 0 and 150",
            });
        }
        Ok(())
    }

    /// Trim every text field and drop optionals left blank.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            age: self.age,
            national_id: non_blank(self.national_id),
            driving_license: non_blank(self.driving_license),
            residence_address: non_blank(self.residence_address),
            photo: non_blank(self.photo),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
