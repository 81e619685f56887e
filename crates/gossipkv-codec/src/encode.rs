//! Serialization: database -> textual wire form.
//!
//! Serialization without a schema is unsupported; a table that has none
//! fails loudly rather than falling back to shallow-copy behavior
//! (unlike `schema_copy`, which treats `None` as "accept everything").

use std::fmt::Write;

use gossipkv_core::{Key, Row, Schema, Value};

use crate::error::{CodecError, Result};
use crate::hex;

/// One table's worth of rows to serialize, in the shape
/// [`crate::decode`] expects to read back.
pub struct EncodeTable<'a> {
    pub name: &'a str,
    pub schema: &'a Schema,
    /// Rows in the order they should be written. Callers typically sort
    /// by key for deterministic output across peers, though the grammar
    /// doesn't require any particular order.
    pub rows: &'a [(&'a Key, &'a Row)],
}

/// Serialize `clock` and `tables` into a newly allocated `String`.
pub fn serialize(clock: u64, tables: &[EncodeTable<'_>]) -> Result<String> {
    let mut out = String::new();
    serialize_into(&mut out, clock, tables)?;
    Ok(out)
}

/// Serialize into an existing buffer, avoiding the extra allocation
/// `serialize` performs. Same grammar, same output.
pub fn serialize_into(out: &mut impl Write, clock: u64, tables: &[EncodeTable<'_>]) -> Result<()> {
    write!(out, "{{{}", hex::encode_u64(clock))?;
    for table in tables {
        write!(out, ";{}{{", table.name)?;
        write_rows(out, table)?;
        out.write_char('}')?;
    }
    out.write_char('}')?;
    Ok(())
}

fn write_rows(out: &mut impl Write, table: &EncodeTable<'_>) -> Result<()> {
    if table.schema.is_empty() && !table.rows.is_empty() {
        return Err(CodecError::SerializeWithoutSchema(table.name.to_string()));
    }
    for (i, (key, row)) in table.rows.iter().enumerate() {
        if i > 0 {
            out.write_char(';')?;
        }
        write_key(out, key)?;
        out.write_char('{')?;
        write_row_body(out, table.schema, row)?;
        out.write_char('}')?;
    }
    Ok(())
}

fn write_key(out: &mut impl Write, key: &Key) -> Result<()> {
    match key {
        Key::Integer(n) => out.write_str(&hex::encode_i64(*n))?,
        Key::Str(s) => out.write_str(s)?,
    }
    Ok(())
}

fn write_row_body(out: &mut impl Write, schema: &Schema, row: &Row) -> Result<()> {
    out.write_char('{')?;
    if !row.is_tombstone() {
        let data = row.data().expect("non-tombstone row always has data");
        for (i, (field, _)) in schema.fields().enumerate() {
            if i > 0 {
                out.write_char(';')?;
            }
            let value = data.get(field).cloned().unwrap_or(Value::Absent);
            write_field_value(out, &value)?;
        }
    }
    out.write_char('}')?;

    write!(out, "{}", hex::encode_u64(row.version.clock))?;
    write!(out, ";{}", row.version.peer)?;
    if row.is_tombstone() {
        out.write_str(";1")?;
    }
    Ok(())
}

fn write_field_value(out: &mut impl Write, value: &Value) -> Result<()> {
    match value {
        Value::Integer(n) => out.write_str(&hex::encode_i64(*n))?,
        Value::Bool(b) => out.write_str(if *b { "1" } else { "0" })?,
        Value::Str(s) => out.write_str(s)?,
        Value::Absent => out.write_char('\u{0}')?,
    }
    Ok(())
}
