//! Record Shapes: the declarative input to an upsert.

use serde::{Deserialize, Serialize};

use crate::error::{SeedError, SeedResult};
use crate::value::Value;

/// An ordered mapping from field name to [`Value`].
///
/// Field order is preserved and is the order in which references are
/// resolved. Setting a field that is already present replaces its value in
/// place.
///
/// # Examples
///
/// ```
/// use plugseed::Shape;
///
/// let module = Shape::new()
///     .with("module", "doc_info.DocInfo")
///     .with("base_path", "api_app.analyzers_manager.file_analyzers");
/// let analyzer = Shape::new().with("name", "Doc_Info").with("python_module", module);
///
/// assert_eq!(analyzer.fields().next().map(|(k, _)| k), Some("name"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<(String, Value)>);

impl Shape {
    /// Creates an empty shape.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style [`Shape::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field, replacing any previous value for the same name.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds a shape from a JSON object; anything else is rejected.
    pub fn from_json(json: serde_json::Value) -> SeedResult<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(SeedError::internal(format!(
                "a record shape must be a JSON object, got {other}"
            ))),
        }
    }

    pub(crate) fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        )
    }

    /// Renders the shape as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl IntoIterator for Shape {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Shape {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut shape = Self::new();
        for (k, v) in iter {
            shape.set(k, v);
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_replaces_in_place() {
        let mut shape = Shape::new().with("a", 1).with("b", 2);
        shape.set("a", 3);
        let order: Vec<_> = shape.fields().map(|(k, _)| k.to_string()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(shape.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn from_json_preserves_declaration_order() {
        let shape = Shape::from_json(json!({
            "name": "additional_passwords_to_check",
            "type": "list",
            "analyzer_config": "Doc_Info",
        }))
        .unwrap();
        let order: Vec<_> = shape.fields().map(|(k, _)| k.to_string()).collect();
        assert_eq!(order, vec!["name", "type", "analyzer_config"]);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(Shape::from_json(json!(["not", "a", "shape"])).is_err());
    }

    #[test]
    fn to_json_renders_nested_shapes() {
        let shape = Shape::new().with("inner", Shape::new().with("x", true));
        assert_eq!(shape.to_json(), json!({"inner": {"x": true}}));
    }
}
