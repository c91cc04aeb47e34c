//! Stored records and their identity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Resolved field values keyed by field name.
pub type Fields = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

/// Surrogate identifier assigned to every record on creation.
///
/// # Examples
///
/// ```
/// use plugseed::RecordId;
///
/// let id = RecordId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses the hyphenated UUID form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A persisted row of some entity type.
///
/// `fields` holds scalar values and resolved single references
/// ([`Value::Ref`]); `links` holds multi-reference sets, which are never part
/// of the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Surrogate identity.
    pub id: RecordId,
    /// Label of the owning entity type (`app.Model`).
    pub entity: String,
    /// Field values.
    pub fields: Fields,
    /// Multi-reference sets keyed by field name.
    #[serde(default)]
    pub links: BTreeMap<String, Vec<RecordId>>,
}

impl Record {
    /// Creates a record with a fresh id and no links.
    #[must_use]
    pub fn new(entity: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: RecordId::new(),
            entity: entity.into(),
            fields,
            links: BTreeMap::new(),
        }
    }

    /// Returns the value of a field, treating absent fields as null.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Returns the linked ids of a multi-reference field.
    #[must_use]
    pub fn linked(&self, field: &str) -> &[RecordId] {
        self.links.get(field).map_or(&[], Vec::as_slice)
    }

    /// True when every filter entry equals the stored value.
    #[must_use]
    pub fn matches(&self, filter: &Fields) -> bool {
        filter.iter().all(|(k, v)| self.get(k) == v)
    }

    /// True when `field` holds a resolved reference to `target`.
    #[must_use]
    pub fn references(&self, field: &str, target: RecordId) -> bool {
        self.get(field).as_record() == Some(target)
    }
}
