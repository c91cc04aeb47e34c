//! Seed migrations.
//!
//! A [`SeedSet`] names one primary record plus ordered groups of dependent
//! records. Applying it forward is idempotent at the top level: if the
//! primary record already exists (matched by its natural key) nothing at all
//! is seeded. The step is not atomic, so a crash between the primary record
//! and its dependents leaves the dependents missing for good; reruns see the
//! primary record and skip.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SeedError, SeedResult, ValidationError};
use crate::record::Fields;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::upsert::Upserter;
use crate::value::Value;

/// Shapes to ensure for one entity type, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedGroup {
    /// Entity label (`app.Model`).
    pub entity: String,
    pub shapes: Vec<Shape>,
}

impl SeedGroup {
    pub fn new(entity: impl Into<String>, shapes: Vec<Shape>) -> Self {
        Self {
            entity: entity.into(),
            shapes,
        }
    }
}

/// The fixed set of records a seed migration is responsible for.
///
/// The primary entity label is declared next to the shape, never inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedSet {
    /// Entity label of the primary record.
    pub entity: String,
    /// Field of the primary shape used for the existence check and reverse.
    pub natural_key: String,
    pub primary: Shape,
    /// Applied in order, only when the primary record was created.
    #[serde(default)]
    pub dependents: Vec<SeedGroup>,
}

/// Result of [`run_forward_migration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The primary record was already present; nothing was touched.
    Skipped,
    /// Seeding ran. Counts cover top-level shapes only.
    Applied { created: usize, existing: usize },
}

impl SeedSet {
    pub fn new(entity: impl Into<String>, natural_key: impl Into<String>, primary: Shape) -> Self {
        Self {
            entity: entity.into(),
            natural_key: natural_key.into(),
            primary,
            dependents: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dependents(mut self, group: SeedGroup) -> Self {
        self.dependents.push(group);
        self
    }

    /// The natural-key filter for the primary record.
    pub fn natural_key_filter(&self) -> SeedResult<Fields> {
        let value = self
            .primary
            .get(&self.natural_key)
            .cloned()
            .ok_or_else(|| ValidationError::MissingField {
                entity: self.entity.clone(),
                field: self.natural_key.clone(),
            })?;
        let mut filter = Fields::new();
        filter.insert(self.natural_key.clone(), value);
        Ok(filter)
    }

    /// Natural-key value of the primary record.
    #[must_use]
    pub fn name(&self) -> Option<&Value> {
        self.primary.get(&self.natural_key)
    }

    /// Stable digest of the seed data, hex encoded.
    ///
    /// Changes whenever any entity label, key or value changes, so a runner
    /// can notice seed data edited after the step was applied.
    pub fn fingerprint(&self) -> SeedResult<String> {
        let canonical = serde_json::to_vec(self)
            .map_err(|e| SeedError::internal(format!("serialize seed set: {e}")))?;
        Ok(blake3::hash(&canonical).to_hex().to_string())
    }
}

/// Applies a seed set.
///
/// Skips entirely when the primary record exists. Otherwise upserts the
/// primary record and, only if it was newly created, every dependent group
/// in order. Errors abort the run with whatever was already written left in
/// place.
pub fn run_forward_migration(registry: &Registry, seed: &SeedSet) -> SeedResult<ForwardOutcome> {
    let primary = registry.entity(&seed.entity)?;
    let key = seed.natural_key_filter()?;
    if primary.exists(&key)? {
        info!(entity = %seed.entity, key = ?seed.name(), "seed already applied, skipping");
        return Ok(ForwardOutcome::Skipped);
    }

    let upserter = Upserter::new(registry);
    let (record, existed) = upserter.upsert(&primary, seed.primary.clone())?;
    let mut created = usize::from(!existed);
    let mut existing = usize::from(existed);
    if existed {
        debug!(entity = %seed.entity, id = %record.id, "primary matched an existing record");
        return Ok(ForwardOutcome::Applied { created, existing });
    }

    for group in &seed.dependents {
        let entity = registry.entity(&group.entity)?;
        for shape in &group.shapes {
            let (_, existed) = upserter.upsert(&entity, shape.clone())?;
            if existed {
                existing += 1;
            } else {
                created += 1;
            }
        }
    }

    info!(entity = %seed.entity, key = ?seed.name(), created, existing, "seed applied");
    Ok(ForwardOutcome::Applied { created, existing })
}

/// Reverts a seed set by deleting the primary record by natural key.
///
/// Fails with a not-found error if the record is absent. Dependents are
/// handled by the store's delete rules only. Returns the number of records
/// removed.
pub fn run_reverse_migration(registry: &Registry, seed: &SeedSet) -> SeedResult<usize> {
    let primary = registry.entity(&seed.entity)?;
    let record = primary.get(&seed.natural_key_filter()?)?;
    let removed = primary.delete(&record)?;
    info!(entity = %seed.entity, key = ?seed.name(), removed, "seed reverted");
    Ok(removed)
}

/// Identity of a migration step: owning app plus step name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MigrationId {
    pub app: String,
    pub name: String,
}

impl MigrationId {
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.name)
    }
}

/// A migration step as seen by a runner.
pub trait Migration: Send + Sync {
    fn id(&self) -> &MigrationId;

    /// Steps that must be applied before this one.
    fn dependencies(&self) -> &[MigrationId];

    /// Whether the runner may wrap the step in a single transaction.
    fn atomic(&self) -> bool;

    fn forward(&self, registry: &Registry) -> SeedResult<()>;

    fn backward(&self, registry: &Registry) -> SeedResult<()>;
}

/// A migration step that applies one [`SeedSet`]. Never atomic.
#[derive(Debug, Clone)]
pub struct SeedMigration {
    id: MigrationId,
    dependencies: Vec<MigrationId>,
    seed: SeedSet,
}

impl SeedMigration {
    pub fn new(id: MigrationId, dependencies: Vec<MigrationId>, seed: SeedSet) -> Self {
        Self {
            id,
            dependencies,
            seed,
        }
    }

    #[must_use]
    pub const fn seed(&self) -> &SeedSet {
        &self.seed
    }
}

impl Migration for SeedMigration {
    fn id(&self) -> &MigrationId {
        &self.id
    }

    fn dependencies(&self) -> &[MigrationId] {
        &self.dependencies
    }

    fn atomic(&self) -> bool {
        false
    }

    fn forward(&self, registry: &Registry) -> SeedResult<()> {
        info!(migration = %self.id, "applying");
        run_forward_migration(registry, &self.seed).map(|_| ())
    }

    fn backward(&self, registry: &Registry) -> SeedResult<()> {
        info!(migration = %self.id, "reverting");
        run_reverse_migration(registry, &self.seed).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::schema::{EntityType, FieldDef, Schema};
    use crate::storage::InMemoryRecordStore;

    fn registry() -> Registry {
        let plugin = EntityType::new("app", "Plugin")
            .keyed_by("name")
            .field(FieldDef::string("name"));
        let option = EntityType::new("app", "Option")
            .field(FieldDef::string("name"))
            .field(FieldDef::reference("plugin", "app.Plugin"));
        let schema = Schema::new([plugin, option]).unwrap();
        Registry::new(schema, Arc::new(InMemoryRecordStore::new()))
    }

    fn seed() -> SeedSet {
        SeedSet::new("app.Plugin", "name", Shape::new().with("name", "P")).with_dependents(
            SeedGroup::new(
                "app.Option",
                vec![
                    Shape::new().with("name", "a").with("plugin", "P"),
                    Shape::new().with("name", "b").with("plugin", "P"),
                ],
            ),
        )
    }

    #[test]
    fn forward_then_forward_is_a_noop() {
        let reg = registry();
        assert_eq!(
            run_forward_migration(&reg, &seed()).unwrap(),
            ForwardOutcome::Applied { created: 3, existing: 0 }
        );
        assert_eq!(run_forward_migration(&reg, &seed()).unwrap(), ForwardOutcome::Skipped);
        assert_eq!(reg.entity("app.Option").unwrap().count().unwrap(), 2);
    }

    #[test]
    fn missing_natural_key_is_a_validation_error() {
        let reg = registry();
        let bad = SeedSet::new("app.Plugin", "title", Shape::new().with("name", "P"));
        assert!(run_forward_migration(&reg, &bad).unwrap_err().is_validation());
    }

    #[test]
    fn reverse_removes_primary_and_cascades() {
        let reg = registry();
        run_forward_migration(&reg, &seed()).unwrap();
        assert_eq!(run_reverse_migration(&reg, &seed()).unwrap(), 3);
        assert!(run_reverse_migration(&reg, &seed()).unwrap_err().is_not_found());
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = seed().fingerprint().unwrap();
        assert_eq!(a, seed().fingerprint().unwrap());
        assert_eq!(a.len(), 64);

        let mut edited = seed();
        edited.primary.set("name", "Q");
        assert_ne!(a, edited.fingerprint().unwrap());
    }

    #[test]
    fn seed_migration_metadata() {
        let m = SeedMigration::new(
            MigrationId::new("app", "0002_seed"),
            vec![MigrationId::new("app", "0001_initial")],
            seed(),
        );
        assert_eq!(m.id().to_string(), "app.0002_seed");
        assert_eq!(m.dependencies()[0].to_string(), "app.0001_initial");
        assert!(!m.atomic());

        let reg = registry();
        m.forward(&reg).unwrap();
        m.backward(&reg).unwrap();
        assert!(m.backward(&reg).unwrap_err().is_not_found());
    }
}
