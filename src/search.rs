//! Linear substring search over the cached record list.
//!
//! Name and email match case-insensitively; phone number, national id, and
//! driving license match the query exactly as typed. Cheap enough to rerun on
//! every keystroke.

use crate::record::ProfileRecord;

/// A prepared query. Holds the lowercase form so it is computed once per
/// search instead of once per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    folded: String,
}

impl SearchQuery {
    pub fn new(query: &str) -> Self {
        Self {
            raw: query.to_string(),
            folded: query.to_lowercase(),
        }
    }

    /// True when the query trims to nothing and every record is visible.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn matches(&self, record: &ProfileRecord) -> bool {
        if self.is_blank() {
            return true;
        }
        record.full_name.to_lowercase().contains(&self.folded)
            || record.email.to_lowercase().contains(&self.folded)
            || record.phone_number.contains(&self.raw)
            || contains_raw(record.national_id.as_deref(), &self.raw)
            || contains_raw(record.driving_license.as_deref(), &self.raw)
    }
}

fn contains_raw(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|value| value.contains(needle))
}

/// Keep the records matching `query`, preserving their relative order.
pub fn filter<'a, I>(records: I, query: &str) -> Vec<&'a ProfileRecord>
where
    I: IntoIterator<Item = &'a ProfileRecord>,
{
    let query = SearchQuery::new(query);
    records
        .into_iter()
        .filter(|record| query.matches(record))
        .collect()
}
