//! Entity types and their static field classification.
//!
//! Every entity type carries a table saying, for each of its fields, whether
//! it is a scalar, a single reference or a multi reference. The upserter
//! dispatches on that table; nothing is inferred from the values themselves.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, SchemaError, SeedResult, ValidationError};
use crate::value::Value;

/// Declared type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    String,
    /// RFC 3339 timestamp stored as a string.
    Timestamp,
    List,
    /// Any non-reference value.
    Json,
}

impl ScalarType {
    /// Human-readable name used in validation errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::List => "list",
            Self::Json => "json",
        }
    }

    /// True if `value` (non-null) has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::Int => matches!(value, Value::Int(_)),
            Self::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            Self::String | Self::Timestamp => matches!(value, Value::String(_)),
            Self::List => matches!(value, Value::List(_)),
            Self::Json => !matches!(value, Value::Ref(_)),
        }
    }
}

/// What the store does to referencing records when the target is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Cascade,
    SetNull,
    Restrict,
}

/// Relationship kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Scalar {
        ty: ScalarType,
    },
    /// Identifies exactly one record of `target`.
    Reference {
        target: String,
        on_delete: OnDelete,
    },
    /// A set of records of `target`, applied only at creation time.
    MultiReference {
        target: String,
    },
}

impl FieldKind {
    /// The referenced entity label, if this is a reference of either kind.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Scalar { .. } => None,
            Self::Reference { target, .. } | Self::MultiReference { target } => Some(target),
        }
    }

    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    #[must_use]
    pub const fn is_multi_reference(&self) -> bool {
        matches!(self, Self::MultiReference { .. })
    }
}

/// A single field declaration with its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl FieldDef {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
            unique: false,
            max_length: None,
            choices: Vec::new(),
            pattern: None,
        }
    }

    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::with_kind(name, FieldKind::Scalar { ty })
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Int)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::List)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Json)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarType::Timestamp)
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::Reference {
                target: target.into(),
                on_delete: OnDelete::Cascade,
            },
        )
    }

    pub fn multi_reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::MultiReference {
                target: target.into(),
            },
        )
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the delete rule of a single-reference field. No-op otherwise.
    #[must_use]
    pub fn on_delete(mut self, rule: OnDelete) -> Self {
        if let FieldKind::Reference { on_delete, .. } = &mut self.kind {
            *on_delete = rule;
        }
        self
    }
}

/// How records of an entity type are identified by a bare key value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum PrimaryKey {
    /// The store-assigned [`RecordId`](crate::RecordId).
    #[default]
    Surrogate,
    /// A declared field whose value is unique per record.
    Field(String),
}

/// A named collection of records with a static field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub app: String,
    pub model: String,
    #[serde(default)]
    pub primary_key: PrimaryKey,
    pub fields: Vec<FieldDef>,
}

impl EntityType {
    pub fn new(app: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            model: model.into(),
            primary_key: PrimaryKey::Surrogate,
            fields: Vec::new(),
        }
    }

    /// Uses `field` as the primary key instead of the surrogate id.
    #[must_use]
    pub fn keyed_by(mut self, field: impl Into<String>) -> Self {
        self.primary_key = PrimaryKey::Field(field.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// The `app.Model` label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.app, self.model)
    }

    /// Looks up a field declaration.
    #[must_use]
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Like [`EntityType::field_def`], failing on undeclared names.
    pub fn require_field(&self, name: &str) -> Result<&FieldDef, ValidationError> {
        self.field_def(name).ok_or_else(|| ValidationError::UnknownField {
            entity: self.label(),
            field: name.to_string(),
        })
    }

    fn check(&self, labels: &HashSet<String>) -> Result<(), SchemaError> {
        let label = self.label();
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: label,
                    field: field.name.clone(),
                });
            }
            if let Some(target) = field.kind.target() {
                if !labels.contains(target) {
                    return Err(SchemaError::UnknownTarget {
                        entity: label,
                        field: field.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
            if matches!(
                field.kind,
                FieldKind::Reference {
                    on_delete: OnDelete::SetNull,
                    ..
                }
            ) && !field.nullable
            {
                return Err(SchemaError::SetNullOnRequired {
                    entity: label,
                    field: field.name.clone(),
                });
            }
            if let Some(pattern) = &field.pattern {
                regex::Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                    entity: label.clone(),
                    field: field.name.clone(),
                    reason: e.to_string(),
                })?;
            }
        }
        if let PrimaryKey::Field(pk) = &self.primary_key {
            if self.field_def(pk).is_none() {
                return Err(SchemaError::UnknownPrimaryKey {
                    entity: label,
                    field: pk.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}

/// A validated set of entity types keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    types: BTreeMap<String, EntityType>,
}

impl Schema {
    /// Builds a schema, checking every declaration against the others.
    pub fn new(types: impl IntoIterator<Item = EntityType>) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for ty in types {
            let label = ty.label();
            if map.contains_key(&label) {
                return Err(SchemaError::DuplicateEntity { label });
            }
            map.insert(label, ty);
        }

        let labels: HashSet<String> = map.keys().cloned().collect();
        for ty in map.values() {
            ty.check(&labels)?;
        }
        Ok(Self { types: map })
    }

    /// Resolves an `app.Model` label.
    pub fn get(&self, label: &str) -> SeedResult<&EntityType> {
        self.types.get(label).ok_or_else(|| {
            NotFoundError::EntityType {
                label: label.to_string(),
            }
            .into()
        })
    }

    /// All registered entity types in label order.
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Fields anywhere in the schema whose reference targets `label`.
    pub fn referrers<'a>(
        &'a self,
        label: &'a str,
    ) -> impl Iterator<Item = (&'a EntityType, &'a FieldDef)> + 'a {
        self.types.values().flat_map(move |ty| {
            ty.fields
                .iter()
                .filter(move |f| f.kind.target() == Some(label))
                .map(move |f| (ty, f))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> EntityType {
        EntityType::new("api_app", "PythonModule")
            .field(FieldDef::string("module").max_length(120))
            .field(FieldDef::string("base_path"))
    }

    #[test]
    fn scalar_type_acceptance() {
        assert!(ScalarType::Float.accepts(&Value::Int(3)));
        assert!(!ScalarType::Int.accepts(&Value::Float(3.0)));
        assert!(ScalarType::Timestamp.accepts(&Value::from("2024-02-09T10:52:17Z")));
        assert!(ScalarType::Json.accepts(&Value::List(vec![])));
        assert!(!ScalarType::Json.accepts(&Value::Ref(crate::RecordId::new())));
    }

    #[test]
    fn schema_resolves_labels() {
        let schema = Schema::new([module()]).unwrap();
        let ty = schema.get("api_app.PythonModule").unwrap();
        assert_eq!(ty.label(), "api_app.PythonModule");
        assert!(schema.get("api_app.Missing").unwrap_err().is_not_found());
    }

    #[test]
    fn schema_rejects_unknown_reference_target() {
        let param = EntityType::new("api_app", "Parameter")
            .field(FieldDef::reference("python_module", "api_app.PythonModule"));
        let err = Schema::new([param]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTarget { .. }));
    }

    #[test]
    fn schema_rejects_duplicates() {
        assert!(matches!(
            Schema::new([module(), module()]),
            Err(SchemaError::DuplicateEntity { .. })
        ));

        let doubled = module().field(FieldDef::string("module"));
        assert!(matches!(
            Schema::new([doubled]),
            Err(SchemaError::DuplicateField { .. })
        ));
    }

    #[test]
    fn schema_rejects_bad_primary_key_and_set_null() {
        let keyed = module().keyed_by("name");
        assert!(matches!(
            Schema::new([keyed]),
            Err(SchemaError::UnknownPrimaryKey { .. })
        ));

        let owner = EntityType::new("api_app", "Owned").field(
            FieldDef::reference("module", "api_app.PythonModule").on_delete(OnDelete::SetNull),
        );
        assert!(matches!(
            Schema::new([module(), owner]),
            Err(SchemaError::SetNullOnRequired { .. })
        ));
    }

    #[test]
    fn schema_rejects_invalid_pattern() {
        let bad = module().field(FieldDef::string("code").pattern("(unclosed"));
        assert!(matches!(
            Schema::new([bad]),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn referrers_lists_incoming_references() {
        let param = EntityType::new("api_app", "Parameter")
            .field(FieldDef::string("name"))
            .field(FieldDef::reference("python_module", "api_app.PythonModule"));
        let schema = Schema::new([module(), param]).unwrap();
        let refs: Vec<_> = schema
            .referrers("api_app.PythonModule")
            .map(|(ty, f)| format!("{}.{}", ty.model, f.name))
            .collect();
        assert_eq!(refs, vec!["Parameter.python_module"]);
    }
}
