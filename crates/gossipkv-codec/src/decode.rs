//! Deserialization: textual wire form -> per-table decoded rows.
//!
//! Structural problems (unclosed braces, a malformed clock, a reference
//! to a table that wasn't declared locally) are fatal for the whole
//! call: [`deserialize`] buffers every row it decodes and only returns
//! them once the document has parsed completely, so "nothing is
//! applied" on a structural failure is true by construction, not by
//! convention. Per-row problems (a key that doesn't parse under the
//! table's key type, missing version fields, a field value that fails
//! the table's schema) are collected into a [`RowWarning`] list instead
//! and simply drop that one row without aborting the rest of the
//! document.

use std::collections::HashMap;

use gossipkv_core::{FieldSchema, FieldType, Key, KeyType, Row, RowData, Schema, Value, Version};

use crate::error::{CodecError, Result};
use crate::hex;
use crate::tokenizer::{self, Node};

/// A table declared locally, against which [`deserialize`] validates
/// incoming rows. Deserialization requires the table to have been
/// declared locally with a matching schema; there is no schema-
/// inference path for an unknown table.
pub struct DecodeTable<'a> {
    pub name: &'a str,
    pub key_type: KeyType,
    pub schema: &'a Schema,
}

/// A non-fatal problem with a single decoded row. The row that produced
/// it is skipped; every other row in the document is still decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowWarning {
    /// The row's key didn't parse as the table's declared key type.
    MalformedKey { table: String, raw: String },
    /// The row had fewer than the three required version-fields
    /// entries (values, clock, peer) — the degenerate `{;}`-shaped row.
    MissingVersionFields { table: String },
    /// The row's `version` clock or peer didn't parse.
    InvalidVersion { table: String, reason: String },
    /// A field value didn't decode under the field's accepted type tags.
    FieldDecodeFailed { table: String, field: String, raw: String },
}

/// One successfully decoded row, paired with its key.
pub struct DecodedRow {
    pub key: Key,
    pub row: Row,
}

/// The result of a full document decode: the database-level clock,
/// every declared table's successfully decoded rows, and any per-row
/// warnings collected along the way.
pub struct DecodeOutcome {
    pub clock: u64,
    pub tables: HashMap<String, Vec<DecodedRow>>,
    pub warnings: Vec<RowWarning>,
}

/// Parse `input` against the locally declared `tables`. Fatal structural
/// errors (unclosed braces, a malformed clock, an undeclared table name)
/// return `Err` and nothing from `input` is reflected in the caller's
/// state. Row-level problems are reported via
/// [`DecodeOutcome::warnings`] instead of aborting the decode.
pub fn deserialize(input: &str, tables: &[DecodeTable<'_>]) -> Result<DecodeOutcome> {
    let Node::Group(mut top) = tokenizer::parse(input)? else {
        return Err(CodecError::MalformedDocument);
    };
    if top.is_empty() {
        return Err(CodecError::MalformedDocument);
    }
    let rest = top.split_off(1);
    let clock = decode_clock(top.into_iter().next().unwrap())?;

    let mut decoded_tables = HashMap::new();
    let mut warnings = Vec::new();

    let mut iter = rest.into_iter();
    loop {
        let Some(name_node) = iter.next() else { break };
        let name = match name_node {
            Node::Atom(s) => s,
            Node::Group(_) => return Err(CodecError::MalformedDocument),
        };
        let Some(rows_node) = iter.next() else {
            return Err(CodecError::MalformedDocument);
        };
        let Node::Group(row_children) = rows_node else {
            return Err(CodecError::MalformedRow(name));
        };

        let decl = tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CodecError::UndefinedTable(name.clone()))?;

        let rows = decode_table_rows(decl, row_children, &mut warnings)?;
        decoded_tables.insert(name, rows);
    }

    Ok(DecodeOutcome {
        clock,
        tables: decoded_tables,
        warnings,
    })
}

fn decode_clock(node: Node) -> Result<u64> {
    match node {
        Node::Atom(s) => hex::decode_u64(&s).ok_or(CodecError::MalformedClock(s)),
        Node::Group(_) => Err(CodecError::MalformedDocument),
    }
}

fn decode_table_rows(
    decl: &DecodeTable<'_>,
    children: Vec<Node>,
    warnings: &mut Vec<RowWarning>,
) -> Result<Vec<DecodedRow>> {
    let mut rows = Vec::new();
    let mut iter = children.into_iter();
    loop {
        let Some(key_node) = iter.next() else { break };
        let key_raw = match key_node {
            Node::Atom(s) => s,
            Node::Group(_) => return Err(CodecError::MalformedRow(decl.name.to_string())),
        };
        let Some(body_node) = iter.next() else {
            return Err(CodecError::MalformedRow(decl.name.to_string()));
        };
        let Node::Group(body) = body_node else {
            return Err(CodecError::MalformedRow(decl.name.to_string()));
        };

        let key = match decode_key(decl.key_type, &key_raw) {
            Some(k) => k,
            None => {
                warnings.push(RowWarning::MalformedKey {
                    table: decl.name.to_string(),
                    raw: key_raw,
                });
                continue;
            }
        };

        match decode_row_body(decl, &key, body) {
            Ok(row) => rows.push(DecodedRow { key, row }),
            Err(warning) => warnings.push(warning),
        }
    }
    Ok(rows)
}

fn decode_key(key_type: KeyType, raw: &str) -> Option<Key> {
    match key_type {
        KeyType::String => Some(Key::Str(raw.to_string())),
        KeyType::Integer => hex::decode_i64(raw).map(Key::Integer),
    }
}

/// Decode a single row's body: `[values-group, clock, peer, tombstone?]`.
/// A body with fewer than three entries (the degenerate `{;}` case) is
/// reported as [`RowWarning::MissingVersionFields`] rather than treated
/// as data.
fn decode_row_body(decl: &DecodeTable<'_>, key: &Key, body: Vec<Node>) -> std::result::Result<Row, RowWarning> {
    if body.len() < 3 {
        return Err(RowWarning::MissingVersionFields {
            table: decl.name.to_string(),
        });
    }
    let mut iter = body.into_iter();
    let values_node = iter.next().unwrap();
    let Node::Group(values) = values_node else {
        return Err(RowWarning::MissingVersionFields {
            table: decl.name.to_string(),
        });
    };
    let clock_node = iter.next().unwrap();
    let peer_node = iter.next().unwrap();
    let tombstone_node = iter.next();

    let clock_raw = as_atom(&clock_node, decl.name)?;
    let clock = hex::decode_u64(clock_raw).ok_or_else(|| RowWarning::InvalidVersion {
        table: decl.name.to_string(),
        reason: format!("malformed clock {clock_raw:?}"),
    })?;
    let peer_raw = as_atom(&peer_node, decl.name)?.to_string();
    let tombstone = matches!(&tombstone_node, Some(Node::Atom(s)) if s == "1");

    let version = Version::from_parts(clock, peer_raw, tombstone).map_err(|e| RowWarning::InvalidVersion {
        table: decl.name.to_string(),
        reason: e.to_string(),
    })?;

    if tombstone {
        return Ok(Row::tombstone(version));
    }

    let mut data = RowData::new();
    for (i, (field_name, field_schema)) in decl.schema.fields().enumerate() {
        let raw = match values.get(i) {
            Some(Node::Atom(s)) => s.as_str(),
            _ => {
                return Err(RowWarning::FieldDecodeFailed {
                    table: decl.name.to_string(),
                    field: field_name.clone(),
                    raw: String::new(),
                })
            }
        };
        let value = decode_field_value(raw, field_schema).ok_or_else(|| RowWarning::FieldDecodeFailed {
            table: decl.name.to_string(),
            field: field_name.clone(),
            raw: raw.to_string(),
        })?;
        data.insert(field_name.clone(), value);
    }
    Ok(Row::live(data, version))
}

fn as_atom<'a>(node: &'a Node, table: &str) -> std::result::Result<&'a str, RowWarning> {
    match node {
        Node::Atom(s) => Ok(s),
        Node::Group(_) => Err(RowWarning::MissingVersionFields {
            table: table.to_string(),
        }),
    }
}

/// Decode one field atom under a field's accepted type tags. The
/// grammar's atoms (`hex(n) | '1' | '0' | string | '\0'`) are
/// ambiguous without type context -- `"1"` alone could be the boolean
/// `true` or the integer `1` -- so a multi-tag field resolves ties by
/// trying, in order: absent (the literal NUL byte), boolean (an exact
/// `"0"`/`"1"` when boolean is accepted), integer (hex), then string.
fn decode_field_value(raw: &str, field_schema: &FieldSchema) -> Option<Value> {
    let accepted = field_schema.accepted();
    if raw == "\u{0}" && accepted.contains(&FieldType::Absent) {
        return Some(Value::Absent);
    }
    if accepted.contains(&FieldType::Boolean) && (raw == "0" || raw == "1") {
        return Some(Value::Bool(raw == "1"));
    }
    if accepted.contains(&FieldType::Integer) {
        if let Some(n) = hex::decode_i64(raw) {
            return Some(Value::Integer(n));
        }
    }
    if accepted.contains(&FieldType::String) {
        return Some(Value::Str(raw.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossipkv_core::FieldType;

    fn users_schema() -> Schema {
        Schema::new([
            ("age".to_string(), FieldSchema::Single(FieldType::Integer)),
            ("name".to_string(), FieldSchema::Single(FieldType::String)),
        ])
        .unwrap()
    }

    #[test]
    fn decodes_s4_golden_document() {
        let schema = users_schema();
        let decl = DecodeTable {
            name: "Users",
            key_type: KeyType::String,
            schema: &schema,
        };
        let outcome = deserialize("{1;Users{1{{19;Bob}1;p1}}}", &[decl]).unwrap();
        assert_eq!(outcome.clock, 1);
        assert!(outcome.warnings.is_empty());
        let rows = &outcome.tables["Users"];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, Key::Str("1".into()));
        assert_eq!(rows[0].row.version.clock, 1);
        assert_eq!(rows[0].row.version.peer, "p1");
        let data = rows[0].row.data().unwrap();
        assert_eq!(data.get("age"), Some(&Value::Integer(25)));
        assert_eq!(data.get("name"), Some(&Value::Str("Bob".into())));
    }

    #[test]
    fn decodes_tombstone_row() {
        let schema = users_schema();
        let decl = DecodeTable {
            name: "Users",
            key_type: KeyType::String,
            schema: &schema,
        };
        let outcome = deserialize("{2;Users{1{{}2;p1;1}}}", &[decl]).unwrap();
        let rows = &outcome.tables["Users"];
        assert!(rows[0].row.is_tombstone());
        assert_eq!(rows[0].row.version.clock, 2);
    }

    #[test]
    fn restores_peer_shorthand_as_literal_equals_for_caller_to_resolve() {
        let schema = users_schema();
        let decl = DecodeTable {
            name: "Users",
            key_type: KeyType::String,
            schema: &schema,
        };
        let outcome = deserialize("{1;Users{p1{{19;Bob}1;=}}}", &[decl]).unwrap();
        let row = &outcome.tables["Users"][0];
        assert_eq!(row.row.version.peer, "=");
        assert_eq!(row.row.version.writer_peer(&row.key), "p1");
    }

    #[test]
    fn absent_field_round_trips_through_nul_byte() {
        let schema = Schema::new([(
            "value".to_string(),
            FieldSchema::Multi(vec![FieldType::String, FieldType::Absent]),
        )])
        .unwrap();
        let decl = DecodeTable {
            name: "Settings",
            key_type: KeyType::String,
            schema: &schema,
        };
        let text = "{1;Settings{sound{{\u{0}}1;p1}}}";
        let outcome = deserialize(text, &[decl]).unwrap();
        let row = &outcome.tables["Settings"][0];
        assert_eq!(row.row.data().unwrap().get("value"), Some(&Value::Absent));
    }

    #[test]
    fn undeclared_table_is_fatal() {
        let err = deserialize("{1;Ghost{1{{}1;p1}}}", &[]).unwrap_err();
        assert_eq!(err, CodecError::UndefinedTable("Ghost".to_string()));
    }

    #[test]
    fn missing_version_fields_is_a_row_warning_not_fatal() {
        let schema = users_schema();
        let decl = DecodeTable {
            name: "Users",
            key_type: KeyType::String,
            schema: &schema,
        };
        // "bad{;}" has a row body with only two empty atoms: no clock/peer.
        let outcome = deserialize("{1;Users{bad{;}}}", &[decl]).unwrap();
        assert!(outcome.tables["Users"].is_empty());
        assert_eq!(
            outcome.warnings,
            vec![RowWarning::MissingVersionFields { table: "Users".to_string() }]
        );
    }

    #[test]
    fn malformed_integer_key_is_a_row_warning() {
        let schema = Schema::default();
        let decl = DecodeTable {
            name: "Counters",
            key_type: KeyType::Integer,
            schema: &schema,
        };
        let outcome = deserialize("{1;Counters{notahex{{}1;p1}}}", &[decl]).unwrap();
        assert!(outcome.tables["Counters"].is_empty());
        assert!(matches!(&outcome.warnings[0], RowWarning::MalformedKey { .. }));
    }
}
