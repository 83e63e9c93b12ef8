//! Reading messages written with a newer version of their schema.

mod common;

use common::init_logging;
use tagwire::record::DecodeContext;
use tagwire::schema::{
    BinarySchema, DefKind, Definition, Field, SkipField, TYPE_FLOAT,
    TYPE_INT, TYPE_STRING, TYPE_UINT, TYPE_UINT64,
};
use tagwire::value::Value;
use tagwire::{ParseError, Record};

mod v1 {
    tagwire::define_message! {
        pub struct Sample {
            1 => id, set_id: u32;
            4 => name, set_name: String;
        }
    }
}

mod v2 {
    tagwire::define_struct! {
        pub struct Point {
            x, set_x: f32;
            y, set_y: f32;
        }
    }

    tagwire::define_message! {
        pub struct Extra {
            1 => note, set_note: String;
        }
    }

    tagwire::define_message! {
        pub struct Sample {
            1 => id, set_id: u32;
            2 => points, set_points: Vec<Point>;
            3 => big, set_big: u64;
            4 => name, set_name: String;
            5 => extra, set_extra: Extra;
            6 => deltas, set_deltas: Vec<i32>;
        }
    }
}

/// The schema of the second version.
fn schema_v2() -> BinarySchema {
    BinarySchema::new(vec![
        Definition::new(
            "Point",
            DefKind::Struct,
            vec![
                Field::new("x", TYPE_FLOAT, false, 0),
                Field::new("y", TYPE_FLOAT, false, 0),
            ],
        ),
        Definition::new(
            "Extra",
            DefKind::Message,
            vec![Field::new("note", TYPE_STRING, false, 1)],
        ),
        Definition::new(
            "Sample",
            DefKind::Message,
            vec![
                Field::new("id", TYPE_UINT, false, 1),
                Field::new("points", 0, true, 2),
                Field::new("big", TYPE_UINT64, false, 3),
                Field::new("name", TYPE_STRING, false, 4),
                Field::new("extra", 1, false, 5),
                Field::new("deltas", TYPE_INT, true, 6),
            ],
        ),
    ])
    .unwrap()
}

fn sample_v2() -> v2::Sample {
    let mut point = v2::Point::default();
    point.set_x(1.0);
    point.set_y(2.0);
    let mut extra = v2::Extra::default();
    extra.set_note("hello".into());

    let mut res = v2::Sample::default();
    res.set_id(17);
    res.set_points(vec![point.clone(), point]);
    res.set_big(1 << 40);
    res.set_name("sample".into());
    res.set_extra(extra);
    res.set_deltas(vec![-3, 0, 3]);
    res
}

#[test]
fn skip_newer_fields() {
    init_logging();

    let data = sample_v2().to_vec().unwrap();
    let schema = schema_v2();
    let mut ctx = DecodeContext::with_schema(&schema);
    let decoded = v1::Sample::decode_from(&data, &mut ctx).unwrap();
    assert_eq!(decoded.id(), Some(&17));
    assert_eq!(decoded.name().map(String::as_str), Some("sample"));
}

#[test]
fn skip_with_schema_from_binary() {
    init_logging();

    let schema_data = schema_v2().encode().unwrap();
    let schema = BinarySchema::from_slice(&schema_data).unwrap();
    assert_eq!(schema.find_definition("Sample"), Some(2));

    let data = sample_v2().to_vec().unwrap();
    let mut ctx = DecodeContext::with_schema(&schema);
    let decoded = v1::Sample::decode_from(&data, &mut ctx).unwrap();
    assert_eq!(decoded.id(), Some(&17));
}

#[test]
fn unknown_field_without_schema() {
    init_logging();

    let data = sample_v2().to_vec().unwrap();
    assert_eq!(
        v1::Sample::from_slice(&data),
        Err(ParseError::UnknownField(2))
    );
}

#[test]
fn unknown_field_missing_from_schema() {
    init_logging();

    // A schema that knows the message but not field 3.
    let schema = BinarySchema::new(vec![Definition::new(
        "Sample",
        DefKind::Message,
        vec![Field::new("id", TYPE_UINT, false, 1)],
    )])
    .unwrap();
    let mut sample = v2::Sample::default();
    sample.set_id(1);
    sample.set_big(2);
    let data = sample.to_vec().unwrap();
    let mut ctx = DecodeContext::with_schema(&schema);
    assert_eq!(
        v1::Sample::decode_from(&data, &mut ctx),
        Err(ParseError::UnknownField(3))
    );
}

#[test]
fn older_data_reads_with_newer_code() {
    let mut sample = v1::Sample::default();
    sample.set_name("old".into());
    let data = sample.to_vec().unwrap();
    let decoded = v2::Sample::from_slice(&data).unwrap();
    assert_eq!(decoded.name().map(String::as_str), Some("old"));
    assert_eq!(decoded.points(), None);
}

#[test]
fn values_through_schema() {
    init_logging();

    let schema = schema_v2();
    let data = sample_v2().to_vec().unwrap();
    let value = Value::decode(&schema, 2, &data).unwrap();

    assert_eq!(value.type_name(), Some("Sample"));
    assert_eq!(value.get("id").and_then(Value::as_uint), Some(17));
    assert_eq!(value.get("big").and_then(Value::as_uint64), Some(1 << 40));
    assert_eq!(value.get("name").and_then(Value::as_str), Some("sample"));

    let points = value.get("points").and_then(Value::as_array).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].get("x").and_then(Value::as_float), Some(1.0));
    assert_eq!(points[1].get("y").and_then(Value::as_float), Some(2.0));

    let extra = value.get("extra").unwrap();
    assert_eq!(extra.get("note").and_then(Value::as_str), Some("hello"));
    assert_eq!(
        value.get("deltas"),
        Some(&Value::Array(vec![
            Value::Int(-3),
            Value::Int(0),
            Value::Int(3)
        ]))
    );

    // Encoding the value again produces the same octets.
    assert_eq!(value.encode(&schema).unwrap(), data);

    // And so does the schema decoded from its binary form.
    let schema = BinarySchema::from_slice(&schema.encode().unwrap()).unwrap();
    let value = Value::decode(&schema, 2, &data).unwrap();
    assert_eq!(value.encode(&schema).unwrap(), data);
    assert_eq!(
        v2::Sample::from_slice(&value.encode(&schema).unwrap()).unwrap(),
        sample_v2()
    );
}
