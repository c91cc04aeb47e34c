//! Registry of live entity types over a backing store.
//!
//! The registry is what a migration runner hands to a migration step: it
//! resolves `app.Model` labels to [`EntityHandle`]s that read, create and
//! delete records with the schema's rules applied.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{NotFoundError, SeedResult, ValidationError};
use crate::record::{Fields, Record, RecordId};
use crate::schema::{EntityType, FieldKind, OnDelete, PrimaryKey, Schema};
use crate::storage::{RecordStore, StorageError};
use crate::validation;
use crate::value::Value;

/// Renders a filter for error messages.
pub(crate) fn render_filter(filter: &Fields) -> String {
    let json: serde_json::Map<String, serde_json::Value> = filter
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(json).to_string()
}

/// Schema plus store.
#[derive(Clone)]
pub struct Registry {
    schema: Arc<Schema>,
    store: Arc<dyn RecordStore>,
}

impl Registry {
    /// Create a registry over the given schema and store.
    #[must_use]
    pub fn new(schema: Schema, store: Arc<dyn RecordStore>) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Resolves an `app.Model` label to a live handle.
    pub fn entity(&self, label: &str) -> SeedResult<EntityHandle<'_>> {
        let ty = self.schema.get(label)?;
        Ok(EntityHandle { registry: self, ty })
    }

    /// Resolves a label split into app and model name.
    pub fn model(&self, app: &str, model: &str) -> SeedResult<EntityHandle<'_>> {
        self.entity(&format!("{app}.{model}"))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.schema.types().map(EntityType::label).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A live entity type: its declaration plus access to its records.
#[derive(Clone, Copy)]
pub struct EntityHandle<'r> {
    registry: &'r Registry,
    ty: &'r EntityType,
}

impl<'r> EntityHandle<'r> {
    #[must_use]
    pub fn ty(&self) -> &'r EntityType {
        self.ty
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.ty.label()
    }

    fn store(&self) -> &'r dyn RecordStore {
        self.registry.store()
    }

    /// Records matching every filter entry exactly.
    pub fn filter(&self, filter: &Fields) -> SeedResult<Vec<Record>> {
        Ok(self.store().find(&self.label(), filter)?)
    }

    pub fn exists(&self, filter: &Fields) -> SeedResult<bool> {
        Ok(!self.filter(filter)?.is_empty())
    }

    /// The single record matching `filter`.
    ///
    /// Fails with [`NotFoundError::Record`] when nothing matches and with
    /// [`StorageError::MultipleMatches`] when the filter is ambiguous.
    pub fn get(&self, filter: &Fields) -> SeedResult<Record> {
        let mut found = self.filter(filter)?;
        match found.len() {
            0 => Err(NotFoundError::Record {
                entity: self.label(),
                filter: render_filter(filter),
            }
            .into()),
            1 => Ok(found.remove(0)),
            count => Err(StorageError::MultipleMatches {
                entity: self.label(),
                filter: render_filter(filter),
                count,
            }
            .into()),
        }
    }

    /// Looks a record up by its primary-key value.
    ///
    /// For surrogate keys `key` may be a [`Value::Ref`] or a UUID string.
    /// Returns `Ok(None)` when no record has that identity.
    pub fn find_by_identity(&self, key: &Value) -> SeedResult<Option<Record>> {
        match &self.ty.primary_key {
            PrimaryKey::Surrogate => {
                let id = match key {
                    Value::Ref(id) => Some(*id),
                    Value::String(s) => RecordId::parse(s),
                    _ => None,
                };
                match id {
                    Some(id) => Ok(self.store().get(&self.label(), id)?),
                    None => Ok(None),
                }
            }
            PrimaryKey::Field(field) => {
                if let Value::Ref(id) = key {
                    return Ok(self.store().get(&self.label(), *id)?);
                }
                let mut filter = Fields::new();
                filter.insert(field.clone(), key.clone());
                let mut found = self.filter(&filter)?;
                match found.len() {
                    0 => Ok(None),
                    1 => Ok(Some(found.remove(0))),
                    count => Err(StorageError::MultipleMatches {
                        entity: self.label(),
                        filter: render_filter(&filter),
                        count,
                    }
                    .into()),
                }
            }
        }
    }

    /// Creates a record: fills defaults, validates, checks uniqueness and
    /// persists it.
    pub fn create(&self, mut fields: Fields) -> SeedResult<Record> {
        validation::apply_defaults(self.ty, &mut fields);
        validation::full_clean(self.ty, &fields)?;
        self.check_unique(&fields)?;

        let record = Record::new(self.label(), fields);
        self.store().insert(record.clone())?;
        debug!(entity = %self.ty, id = %record.id, "record created");
        Ok(record)
    }

    fn check_unique(&self, fields: &Fields) -> SeedResult<()> {
        let pk = match &self.ty.primary_key {
            PrimaryKey::Field(f) => Some(f.as_str()),
            PrimaryKey::Surrogate => None,
        };
        for def in &self.ty.fields {
            if !(def.unique || pk == Some(def.name.as_str())) {
                continue;
            }
            let Some(value) = fields.get(&def.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut filter = Fields::new();
            filter.insert(def.name.clone(), value.clone());
            if self.exists(&filter)? {
                return Err(ValidationError::Duplicate {
                    entity: self.label(),
                    field: def.name.clone(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Replaces the members of a multi-reference field.
    pub fn set_links(
        &self,
        record: &mut Record,
        field: &str,
        ids: Vec<RecordId>,
    ) -> SeedResult<()> {
        let def = self.ty.require_field(field)?;
        if !def.kind.is_multi_reference() {
            return Err(ValidationError::TypeMismatch {
                entity: self.label(),
                field: field.to_string(),
                expected: "multi-reference",
                actual: "field",
            }
            .into());
        }
        record.links.insert(field.to_string(), ids);
        self.store().update(record.clone())?;
        Ok(())
    }

    /// Every record of this type.
    pub fn all(&self) -> SeedResult<Vec<Record>> {
        Ok(self.store().scan(&self.label())?)
    }

    pub fn count(&self) -> SeedResult<usize> {
        Ok(self.store().count(&self.label())?)
    }

    /// Deletes a record and applies the schema's delete rules to everything
    /// that references it. Returns the number of records removed.
    pub fn delete(&self, record: &Record) -> SeedResult<usize> {
        let removed = self.delete_cascading(record.id)?;
        debug!(entity = %self.ty, id = %record.id, removed, "record deleted");
        Ok(removed)
    }

    fn delete_cascading(&self, id: RecordId) -> SeedResult<usize> {
        let label = self.label();
        if self.store().get(&label, id)?.is_none() {
            return Err(NotFoundError::Record {
                entity: label,
                filter: format!("{{\"id\":\"{id}\"}}"),
            }
            .into());
        }

        // Nothing is written until the whole cascade tree has been checked.
        let mut plan = DeletePlan::default();
        self.plan_delete(id, &mut plan)?;
        if let Some(hit) = plan.restricted.iter().find(|r| !plan.ids.contains(&r.row)) {
            return Err(StorageError::Restricted(format!(
                "{} {} is referenced by {}.{} of {}",
                hit.target_entity, hit.target, hit.entity, hit.field, hit.row
            ))
            .into());
        }
        plan.apply(self.store())
    }

    fn plan_delete(&self, id: RecordId, plan: &mut DeletePlan) -> SeedResult<()> {
        if !plan.ids.insert(id) {
            return Ok(());
        }
        let label = self.label();
        plan.doomed.push((label.clone(), id));

        for (referrer, def) in self.registry.schema().referrers(&label) {
            let handle = EntityHandle {
                registry: self.registry,
                ty: referrer,
            };
            for row in handle.all()? {
                match &def.kind {
                    FieldKind::Reference { on_delete, .. } if row.references(&def.name, id) => {
                        match on_delete {
                            OnDelete::Cascade => handle.plan_delete(row.id, plan)?,
                            OnDelete::SetNull => {
                                plan.nulls.push((row.entity, row.id, def.name.clone()));
                            }
                            OnDelete::Restrict => plan.restricted.push(Restriction {
                                target_entity: label.clone(),
                                target: id,
                                entity: row.entity,
                                field: def.name.clone(),
                                row: row.id,
                            }),
                        }
                    }
                    FieldKind::MultiReference { .. } if row.linked(&def.name).contains(&id) => {
                        plan.prunes.push((row.entity, row.id, def.name.clone()));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// A `Restrict` reference found while planning a delete.
struct Restriction {
    target_entity: String,
    target: RecordId,
    entity: String,
    field: String,
    row: RecordId,
}

/// Every change one delete implies, gathered before any of them is written.
#[derive(Default)]
struct DeletePlan {
    doomed: Vec<(String, RecordId)>,
    ids: HashSet<RecordId>,
    restricted: Vec<Restriction>,
    nulls: Vec<(String, RecordId, String)>,
    prunes: Vec<(String, RecordId, String)>,
}

impl DeletePlan {
    fn apply(&self, store: &dyn RecordStore) -> SeedResult<usize> {
        for (entity, id, field) in &self.nulls {
            if self.ids.contains(id) {
                continue;
            }
            if let Some(mut row) = store.get(entity, *id)? {
                row.fields.insert(field.clone(), Value::Null);
                store.update(row)?;
            }
        }
        for (entity, id, field) in &self.prunes {
            if self.ids.contains(id) {
                continue;
            }
            if let Some(mut row) = store.get(entity, *id)? {
                if let Some(linked) = row.links.get_mut(field) {
                    linked.retain(|member| !self.ids.contains(member));
                }
                store.update(row)?;
            }
        }
        // Referencing rows go before the records they point at.
        for (entity, id) in self.doomed.iter().rev() {
            store.delete(entity, *id)?;
        }
        Ok(self.doomed.len())
    }
}

impl std::fmt::Debug for EntityHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.label()).finish()
    }
}
