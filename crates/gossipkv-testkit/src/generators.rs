//! Proptest generators for gossipkv's domain types.

use proptest::prelude::*;

use gossipkv_core::{FieldSchema, FieldType, Key, KeyType, RowData, Schema, Value, Version};

/// Generate one of the four primitive type tags, `Absent` included.
pub fn field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::Integer),
        Just(FieldType::String),
        Just(FieldType::Boolean),
        Just(FieldType::Absent),
    ]
}

/// Generate a value satisfying `tag`.
pub fn value_of(tag: FieldType) -> BoxedStrategy<Value> {
    match tag {
        FieldType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        FieldType::String => "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Str).boxed(),
        FieldType::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
        FieldType::Absent => Just(Value::Absent).boxed(),
    }
}

/// Generate a field name, lowercase and codec-safe.
pub fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,9}".prop_map(String::from)
}

/// Generate a single field's accepted-tag declaration: most fields
/// accept exactly one tag, some accept a few, to exercise
/// `FieldSchema::Multi`.
pub fn field_schema() -> impl Strategy<Value = FieldSchema> {
    prop_oneof![
        3 => field_type().prop_map(FieldSchema::Single),
        1 => prop::collection::hash_set(field_type(), 1..=3)
            .prop_map(|tags| FieldSchema::Multi(tags.into_iter().collect())),
    ]
}

/// Generate a schema of up to `max_fields` distinct fields.
pub fn schema(max_fields: usize) -> impl Strategy<Value = Schema> {
    prop::collection::hash_map(field_name(), field_schema(), 1..=max_fields.max(1))
        .prop_map(|fields| Schema::new(fields).expect("generated tags are always primitive"))
}

/// Generate row data that satisfies every field `schema` declares —
/// the shape `schema_copy` would itself produce — for building rows
/// guaranteed to pass a table's validation.
pub fn row_data_for(schema: &Schema) -> BoxedStrategy<RowData> {
    schema
        .fields()
        .fold(Just(RowData::new()).boxed(), |acc, (name, field_schema)| {
            let name = name.clone();
            let value_strategy = prop::sample::select(field_schema.accepted()).prop_flat_map(value_of);
            (acc, value_strategy)
                .prop_map(move |(mut data, value)| {
                    data.insert(name.clone(), value);
                    data
                })
                .boxed()
        })
}

/// Generate a key type.
pub fn key_type() -> impl Strategy<Value = KeyType> {
    prop_oneof![Just(KeyType::String), Just(KeyType::Integer)]
}

/// Generate a key of the given type.
pub fn key(key_type: KeyType) -> BoxedStrategy<Key> {
    match key_type {
        KeyType::String => "[a-z][a-z0-9]{0,9}".prop_map(Key::Str).boxed(),
        KeyType::Integer => any::<i64>().prop_map(Key::Integer).boxed(),
    }
}

/// Generate a peer ID: non-empty and never the reserved `"="`
/// shorthand literal.
pub fn peer_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}".prop_map(String::from)
}

/// A concurrent write of the same key from two distinct peers, for
/// exercising the last-writer-wins merge predicate.
#[derive(Debug, Clone)]
pub struct ConcurrentWrite {
    pub key: Key,
    pub clock_a: u64,
    pub peer_a: String,
    pub clock_b: u64,
    pub peer_b: String,
}

impl Arbitrary for ConcurrentWrite {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        key_type()
            .prop_flat_map(|kt| (key(kt), 0u64..1000, peer_id(), 0u64..1000, peer_id()))
            .prop_map(|(key, clock_a, peer_a, clock_b, peer_b)| ConcurrentWrite {
                key,
                clock_a,
                peer_a,
                clock_b,
                peer_b,
            })
            .boxed()
    }
}

/// Build the two versions a [`ConcurrentWrite`] describes.
pub fn versions_from(params: &ConcurrentWrite) -> (Version, Version) {
    let a = Version::from_parts(params.clock_a, params.peer_a.clone(), false)
        .expect("generated peer ids are always non-empty and unreserved");
    let b = Version::from_parts(params.clock_b, params.peer_b.clone(), false)
        .expect("generated peer ids are always non-empty and unreserved");
    (a, b)
}
