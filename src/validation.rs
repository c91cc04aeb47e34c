//! Pre-persistence validation ("full clean").
//!
//! Checks a candidate record's fields against its entity type. Uniqueness
//! needs the store and is checked by the registry right after this pass.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use chrono::DateTime;

use crate::error::{SeedError, SeedResult, ValidationError};
use crate::record::Fields;
use crate::schema::{EntityType, FieldDef, FieldKind, ScalarType};
use crate::value::Value;

const REGEX_CACHE_MAX: usize = 256;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, regex::Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> SeedResult<regex::Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| SeedError::internal("regex cache lock poisoned"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    // Patterns are checked when the schema is built, so this only fails for
    // hand-assembled field definitions.
    let compiled = regex::Regex::new(pattern)
        .map_err(|e| SeedError::internal(format!("invalid field pattern '{pattern}': {e}")))?;

    let mut guard = cache
        .write()
        .map_err(|_| SeedError::internal("regex cache lock poisoned"))?;
    if guard.len() >= REGEX_CACHE_MAX {
        guard.clear();
    }
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

/// Fills declared defaults for fields the caller did not supply.
pub fn apply_defaults(ty: &EntityType, fields: &mut Fields) {
    for def in &ty.fields {
        if fields.contains_key(&def.name) {
            continue;
        }
        if let Some(default) = &def.default {
            fields.insert(def.name.clone(), Value::from_json(default.clone()));
        }
    }
}

/// Validates every field of a candidate record.
///
/// Multi-reference fields must not appear in `fields`; they are applied
/// separately after the record exists.
pub fn full_clean(ty: &EntityType, fields: &Fields) -> SeedResult<()> {
    for name in fields.keys() {
        let def = ty.require_field(name)?;
        if def.kind.is_multi_reference() {
            return Err(mismatch(ty, def, "scalar or reference", "multi-reference").into());
        }
    }

    for def in &ty.fields {
        if def.kind.is_multi_reference() {
            continue;
        }
        match fields.get(&def.name) {
            None | Some(Value::Null) => {
                if !def.nullable {
                    return Err(ValidationError::MissingField {
                        entity: ty.label(),
                        field: def.name.clone(),
                    }
                    .into());
                }
            }
            Some(value) => clean_field(ty, def, value)?,
        }
    }
    Ok(())
}

fn mismatch(
    ty: &EntityType,
    def: &FieldDef,
    expected: &'static str,
    actual: &'static str,
) -> ValidationError {
    ValidationError::TypeMismatch {
        entity: ty.label(),
        field: def.name.clone(),
        expected,
        actual,
    }
}

fn clean_field(ty: &EntityType, def: &FieldDef, value: &Value) -> SeedResult<()> {
    match &def.kind {
        FieldKind::Reference { .. } => {
            if !value.is_ref() {
                return Err(mismatch(ty, def, "ref", value.type_name()).into());
            }
        }
        FieldKind::MultiReference { .. } => {}
        FieldKind::Scalar { ty: scalar } => {
            if !scalar.accepts(value) {
                return Err(mismatch(ty, def, scalar.name(), value.type_name()).into());
            }
            if let Some(s) = value.as_str() {
                clean_text(ty, def, *scalar, s)?;
            }
        }
    }
    Ok(())
}

fn clean_text(ty: &EntityType, def: &FieldDef, scalar: ScalarType, s: &str) -> SeedResult<()> {
    if let Some(max) = def.max_length {
        if s.chars().count() > max {
            return Err(ValidationError::FieldTooLong {
                entity: ty.label(),
                field: def.name.clone(),
                max_length: max,
            }
            .into());
        }
    }

    if !def.choices.is_empty() && !def.choices.iter().any(|c| c == s) {
        return Err(ValidationError::InvalidChoice {
            entity: ty.label(),
            field: def.name.clone(),
            value: s.to_string(),
        }
        .into());
    }

    if let Some(pattern) = &def.pattern {
        if !cached_regex(pattern)?.is_match(s) {
            return Err(ValidationError::PatternMismatch {
                entity: ty.label(),
                field: def.name.clone(),
                value: s.to_string(),
                pattern: pattern.clone(),
            }
            .into());
        }
    }

    if scalar == ScalarType::Timestamp && DateTime::parse_from_rfc3339(s).is_err() {
        return Err(ValidationError::InvalidTimestamp {
            entity: ty.label(),
            field: def.name.clone(),
            value: s.to_string(),
        }
        .into());
    }
    Ok(())
}
