//! Field values.
//!
//! A [`Value`] is what a Record Shape carries for each field before
//! resolution, and what a stored record carries after it. Nested shapes are
//! only meaningful in single-reference position; [`Value::Ref`] only appears
//! once a reference has been resolved against the store.

use serde::{Deserialize, Serialize};

use crate::record::RecordId;
use crate::shape::Shape;

/// Possible values of a record field.
///
/// # Examples
///
/// ```
/// use plugseed::Value;
///
/// let name = Value::from("Doc_Info");
/// let none = Value::Null;
///
/// assert!(name.is_truthy());
/// assert!(!none.is_truthy());
/// assert_eq!(name.type_name(), "string");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Shape(Shape),
    Ref(RecordId),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_))
    }

    pub const fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// Falsy values are `null`, `false`, zero, the empty string, the empty
    /// list and the empty shape. References are always truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::String(v) => !v.is_empty(),
            Self::List(v) => !v.is_empty(),
            Self::Shape(v) => !v.is_empty(),
            Self::Ref(_) => true,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_shape(&self) -> Option<&Shape> {
        match self {
            Self::Shape(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_record(&self) -> Option<RecordId> {
        match self {
            Self::Ref(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Shape(_) => "shape",
            Self::Ref(_) => "ref",
        }
    }

    /// Converts plain JSON into a value. Objects become nested shapes.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(v) => Self::Bool(v),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(v) => Self::String(v),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Shape(Shape::from_json_map(map)),
        }
    }

    /// Renders the value as plain JSON (references as their UUID string).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Self::Null => Json::Null,
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::from(*v),
            Self::Float(v) => Json::from(*v),
            Self::String(v) => Json::String(v.clone()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Shape(shape) => shape.to_json(),
            Self::Ref(id) => Json::String(id.to_string()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ref(id) => write!(f, "ref:{id}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<RecordId> for Value {
    fn from(v: RecordId) -> Self {
        Self::Ref(v)
    }
}

impl From<Shape> for Value {
    fn from(v: Shape) -> Self {
        Self::Shape(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
