//! The primitive value domain.
//!
//! Field values are primitive: integer, string, boolean, or absent.
//! Composite or callable values have no representation here at all —
//! unlike the scripting host this system embeds in, the Rust type system
//! makes "silently drop non-primitives" a non-issue for in-process
//! callers. Only the codec (which parses untyped text) and any future
//! foreign-value bridge need to reject non-primitives explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A primitive field value, or the explicit absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Str(String),
    Bool(bool),
    Absent,
}

impl Value {
    /// The type tag of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Integer(_) => FieldType::Integer,
            Value::Str(_) => FieldType::String,
            Value::Bool(_) => FieldType::Boolean,
            Value::Absent => FieldType::Absent,
        }
    }

    /// True if this value is [`Value::Absent`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Render as the string the codec and FNV hasher operate over.
    ///
    /// Integers render in decimal (the codec re-encodes as hex
    /// separately, for wire framing only — hashing uses the plain
    /// decimal/boolean/string text).
    pub fn to_hash_string(&self) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Absent => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hash_string())
    }
}

/// A primitive type tag, including the special `Absent` tag used in
/// multi-tag schema fields to mean "this field may be omitted."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    String,
    Boolean,
    Absent,
}

/// The typed primary key of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Str(String),
    Integer(i64),
}

impl Key {
    /// This key's [`KeyType`].
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Str(_) => KeyType::String,
            Key::Integer(_) => KeyType::Integer,
        }
    }

    /// Render the key the way a string-keyed peer-shorthand comparison
    /// and the codec both need: `tostring(key)`.
    pub fn to_string_repr(&self) -> String {
        match self {
            Key::Str(s) => s.clone(),
            Key::Integer(n) => n.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_repr())
    }
}

/// A table's declared primary-key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Integer,
}
