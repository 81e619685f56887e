//! Table schemas and the schema-copy projection.
//!
//! A schema maps field name to either a single accepted primitive-type
//! tag or a set of accepted tags (including [`FieldType::Absent`]). The
//! field ordering the codec walks is the schema's lexicographic key
//! order, which is why [`Schema`] and [`RowData`] are both backed by
//! [`std::collections::BTreeMap`] rather than a hash map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::{FieldType, Value};

/// A row's field data, keyed by field name in lexicographic order.
pub type RowData = BTreeMap<String, Value>;

/// The set of type tags a single field accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSchema {
    /// Exactly one accepted primitive type.
    Single(FieldType),
    /// Any of several accepted types (e.g. `{string, absent}`).
    Multi(Vec<FieldType>),
}

impl FieldSchema {
    /// The accepted tags, as a slice-like iterator.
    pub fn accepted(&self) -> Vec<FieldType> {
        match self {
            FieldSchema::Single(t) => vec![*t],
            FieldSchema::Multi(ts) => ts.clone(),
        }
    }

    fn accepts(&self, t: FieldType) -> bool {
        match self {
            FieldSchema::Single(tag) => *tag == t,
            FieldSchema::Multi(tags) => tags.contains(&t),
        }
    }
}

/// A table's schema: field name -> accepted type tag(s).
///
/// Absence of a schema (`Option<Schema>::None` at the call site) means
/// "accept any primitive-typed field by name." Since
/// [`Value`] cannot represent a non-primitive to begin with, the
/// "drop non-primitives" half of that rule has no work to do in this
/// crate; it only matters to callers that construct `Value` from an
/// external, untyped source (the codec).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema(BTreeMap<String, FieldSchema>);

impl Schema {
    /// Build a schema from `(field, accepted tags)` pairs, validating
    /// that every declared tag is a primitive-type tag. `FieldType` is
    /// closed over exactly the four primitive/absent tags, so this
    /// validation is really about rejecting an empty `Multi` set.
    pub fn new(fields: impl IntoIterator<Item = (String, FieldSchema)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (name, schema) in fields {
            if let FieldSchema::Multi(tags) = &schema {
                if tags.is_empty() {
                    return Err(CoreError::SchemaNonPrimitiveTag {
                        field: name,
                        tag: "<empty>".to_string(),
                    });
                }
            }
            map.insert(name, schema);
        }
        Ok(Schema(map))
    }

    /// Fields in the lexicographic order the codec walks.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSchema)> {
        self.0.iter()
    }

    /// Look up a single field's accepted tags.
    pub fn get(&self, field: &str) -> Option<&FieldSchema> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Project `input` into the fields a table's schema declares, checking
/// each field's value against its accepted type tags.
///
/// With `Some(schema)`: iterate the schema's fields in lexicographic
/// order; for each, read the corresponding value out of `input`
/// (defaulting to [`Value::Absent`] when the field is missing), check it
/// against the field's accepted tags, and copy it into the output.
///
/// With `None`: shallow-copy every field of `input` verbatim (every
/// `Value` is already primitive by construction, so nothing is
/// filtered).
pub fn schema_copy(schema: Option<&Schema>, input: &RowData) -> Result<RowData> {
    match schema {
        None => Ok(input.clone()),
        Some(schema) => {
            let mut out = RowData::new();
            for (field, field_schema) in schema.fields() {
                let value = input.get(field).cloned().unwrap_or(Value::Absent);
                let actual = value.field_type();
                if !field_schema.accepts(actual) {
                    return Err(CoreError::TypeMismatch {
                        field: field.clone(),
                        expected: field_schema.accepted(),
                        actual,
                    });
                }
                out.insert(field.clone(), value);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_users() -> Schema {
        Schema::new([
            ("age".to_string(), FieldSchema::Single(FieldType::Integer)),
            ("name".to_string(), FieldSchema::Single(FieldType::String)),
        ])
        .unwrap()
    }

    #[test]
    fn schema_copy_projects_in_lexicographic_order() {
        let schema = schema_users();
        let mut input = RowData::new();
        input.insert("name".to_string(), Value::Str("Bob".into()));
        input.insert("age".to_string(), Value::Integer(25));

        let projected = schema_copy(Some(&schema), &input).unwrap();
        let keys: Vec<&String> = projected.keys().collect();
        assert_eq!(keys, vec!["age", "name"]);
    }

    #[test]
    fn schema_copy_rejects_type_mismatch() {
        let schema = schema_users();
        let mut input = RowData::new();
        input.insert("name".to_string(), Value::Str("Bob".into()));
        input.insert("age".to_string(), Value::Str("not a number".into()));

        let err = schema_copy(Some(&schema), &input).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { field, .. } if field == "age"));
    }

    #[test]
    fn schema_copy_defaults_missing_field_to_absent() {
        let schema = Schema::new([(
            "theme".to_string(),
            FieldSchema::Multi(vec![FieldType::String, FieldType::Absent]),
        )])
        .unwrap();
        let input = RowData::new();

        let projected = schema_copy(Some(&schema), &input).unwrap();
        assert_eq!(projected.get("theme"), Some(&Value::Absent));
    }

    #[test]
    fn no_schema_shallow_copies_everything() {
        let mut input = RowData::new();
        input.insert("anything".to_string(), Value::Bool(true));
        let projected = schema_copy(None, &input).unwrap();
        assert_eq!(projected, input);
    }
}
