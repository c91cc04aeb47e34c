//! Declarative record upsert.
//!
//! Given a [`Shape`] and an entity type, the upserter resolves every
//! single-reference field (depth-first, creating referenced records from
//! nested shapes as needed), then gets or creates the record using all
//! non-multi-reference fields as an exact-match filter.

use tracing::debug;

use crate::error::{NotFoundError, SeedResult, ValidationError};
use crate::record::{Fields, Record, RecordId};
use crate::registry::{EntityHandle, Registry};
use crate::schema::FieldKind;
use crate::shape::Shape;
use crate::storage::StorageError;
use crate::value::Value;

/// Get-or-create driver bound to a registry.
#[derive(Debug, Clone, Copy)]
pub struct Upserter<'r> {
    registry: &'r Registry,
}

impl<'r> Upserter<'r> {
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolves one field value of a shape destined for `entity`.
    ///
    /// - Non-reference fields are returned unchanged.
    /// - Falsy single-reference values are returned unchanged.
    /// - A nested shape is upserted against the referenced type and replaced
    ///   by a reference to the resulting record.
    /// - Anything else is an identity key of the referenced type; it must
    ///   exist.
    pub fn resolve_reference(
        &self,
        entity: &EntityHandle<'r>,
        field: &str,
        value: Value,
    ) -> SeedResult<Value> {
        let def = entity.ty().require_field(field)?;
        let FieldKind::Reference { target, .. } = &def.kind else {
            return Ok(value);
        };
        if !value.is_truthy() {
            return Ok(value);
        }

        let target = self.registry.entity(target)?;
        match value {
            Value::Shape(shape) => {
                let (record, _) = self.upsert(&target, shape)?;
                Ok(Value::Ref(record.id))
            }
            key => {
                let record = self.lookup(&target, field, &key)?;
                Ok(Value::Ref(record.id))
            }
        }
    }

    /// Gets or creates the record described by `shape`.
    ///
    /// Returns the record and whether it already existed. Multi-reference
    /// fields take no part in matching and are only applied to a newly
    /// created record.
    pub fn upsert(&self, entity: &EntityHandle<'r>, shape: Shape) -> SeedResult<(Record, bool)> {
        let mut multi = Vec::new();
        let mut resolved = Fields::new();
        for (field, value) in shape {
            if entity.ty().require_field(&field)?.kind.is_multi_reference() {
                multi.push((field, value));
            } else {
                let value = self.resolve_reference(entity, &field, value)?;
                resolved.insert(field, value);
            }
        }

        let mut found = entity.filter(&resolved)?;
        match found.len() {
            0 => {}
            1 => {
                let record = found.remove(0);
                debug!(entity = %entity.ty(), id = %record.id, "record already present");
                return Ok((record, true));
            }
            count => {
                return Err(StorageError::MultipleMatches {
                    entity: entity.label(),
                    filter: crate::registry::render_filter(&resolved),
                    count,
                }
                .into());
            }
        }

        let mut record = entity.create(resolved)?;
        for (field, value) in multi {
            let ids = self.link_targets(entity, &field, value)?;
            entity.set_links(&mut record, &field, ids)?;
        }
        Ok((record, false))
    }

    /// [`Upserter::upsert`] by entity label.
    pub fn upsert_into(&self, label: &str, shape: Shape) -> SeedResult<(Record, bool)> {
        let entity = self.registry.entity(label)?;
        self.upsert(&entity, shape)
    }

    fn lookup(&self, target: &EntityHandle<'r>, field: &str, key: &Value) -> SeedResult<Record> {
        target.find_by_identity(key)?.ok_or_else(|| {
            NotFoundError::Reference {
                entity: target.label(),
                field: field.to_string(),
                key: key.to_string(),
            }
            .into()
        })
    }

    // Multi-reference members are identity keys (or already-resolved refs);
    // nested shapes are not resolved in this position.
    fn link_targets(
        &self,
        entity: &EntityHandle<'r>,
        field: &str,
        value: Value,
    ) -> SeedResult<Vec<RecordId>> {
        let def = entity.ty().require_field(field)?;
        let Some(target) = def.kind.target() else {
            return Ok(Vec::new());
        };
        let target = self.registry.entity(target)?;

        let members = match value {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            other => {
                return Err(ValidationError::TypeMismatch {
                    entity: entity.label(),
                    field: field.to_string(),
                    expected: "list",
                    actual: other.type_name(),
                }
                .into());
            }
        };

        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            if member.is_shape() {
                return Err(ValidationError::TypeMismatch {
                    entity: entity.label(),
                    field: field.to_string(),
                    expected: "identity key",
                    actual: "shape",
                }
                .into());
            }
            let id = self.lookup(&target, field, &member)?.id;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
