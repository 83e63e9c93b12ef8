//! Dynamically typed values.
//!
//! A [`Value`] holds data of any type a [`BinarySchema`] can describe. It
//! allows decoding and encoding data without generated record types, for
//! instance to inspect data whose schema is only known at runtime.
//!
//! Struct and message values are kept as [`Value::Object`], a map from
//! field names to values. Enum values are kept as [`Value::Enum`] with the
//! name of their variant. All names are borrowed from the schema, so a
//! value can outlive the data it was decoded from but not its schema.
//!
//! ```
//! use tagwire::schema::{BinarySchema, DefKind, Definition, Field};
//! use tagwire::schema::TYPE_STRING;
//! use tagwire::value::Value;
//!
//! let schema = BinarySchema::new(vec![Definition::new(
//!     "Greeting",
//!     DefKind::Message,
//!     vec![Field::new("text", TYPE_STRING, false, 1)],
//! )])
//! .unwrap();
//!
//! let value = Value::decode(&schema, 0, &[1, 2, b'h', b'i', 0]).unwrap();
//! assert_eq!(value.get("text").and_then(Value::as_str), Some("hi"));
//! assert_eq!(value.encode(&schema).unwrap(), [1, 2, b'h', b'i', 0]);
//! ```

use crate::buffer::{ByteBuffer, Composer};
use crate::config::Config;
use crate::record::check_empty_elements;
use crate::schema::{
    BinarySchema, DefKind, Definition, Field, SkipField, MAX_VALUE_DEPTH,
    TYPE_BOOL, TYPE_BYTE, TYPE_FLOAT, TYPE_INT, TYPE_INT64, TYPE_STRING,
    TYPE_UINT, TYPE_UINT64,
};
use crate::wire::{ComposeError, ParseError};
use core::fmt;
use std::collections::HashMap;
use tracing::debug;

//------------ Value ---------------------------------------------------------

/// A value of any type described by a schema.
#[derive(Clone, PartialEq)]
pub enum Value<'a> {
    /// A boolean.
    Bool(bool),

    /// A single octet.
    Byte(u8),

    /// A signed 32 bit integer.
    Int(i32),

    /// An unsigned 32 bit integer.
    UInt(u32),

    /// A signed 64 bit integer.
    Int64(i64),

    /// An unsigned 64 bit integer.
    UInt64(u64),

    /// A 32 bit float.
    Float(f32),

    /// A string.
    String(String),

    /// The values of an array field.
    Array(Vec<Value<'a>>),

    /// An enum value given as the names of the enum and its variant.
    Enum(&'a str, &'a str),

    /// A struct or message given as its type name and its present fields.
    Object(&'a str, HashMap<&'a str, Value<'a>>),
}

impl<'a> Value<'a> {
    /// Decodes a value of type `type_id` from the start of `data`.
    pub fn decode(
        schema: &'a BinarySchema,
        type_id: i32,
        data: &[u8],
    ) -> Result<Self, ParseError> {
        Self::parse(schema, type_id, &mut ByteBuffer::from_slice(data))
    }

    /// Decodes a value of type `type_id` from the read position of `buf`.
    ///
    /// If decoding fails, the read position is left unchanged.
    pub fn parse<Octs: AsRef<[u8]>>(
        schema: &'a BinarySchema,
        type_id: i32,
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        let start = buf.index();
        let res = Self::parse_type(schema, type_id, buf, 0);
        if let Err(err) = res.as_ref() {
            debug!(type_id, %err, "rejecting value");
            buf.seek_to(start);
        }
        res
    }

    /// Decodes the value of `field` from the read position of `buf`.
    ///
    /// This reads an array if the field is an array field. If decoding
    /// fails, the read position is left unchanged.
    pub fn parse_field<Octs: AsRef<[u8]>>(
        schema: &'a BinarySchema,
        field: &Field,
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        let start = buf.index();
        let res = Self::parse_field_value(schema, field, buf, 0);
        if let Err(err) = res.as_ref() {
            debug!(field = %field.name, %err, "rejecting value");
            buf.seek_to(start);
        }
        res
    }

    fn parse_type<Octs: AsRef<[u8]>>(
        schema: &'a BinarySchema,
        type_id: i32,
        buf: &mut ByteBuffer<Octs>,
        depth: usize,
    ) -> Result<Self, ParseError> {
        match type_id {
            TYPE_BOOL => return buf.read_bool().map(Value::Bool),
            TYPE_BYTE => return buf.read_byte().map(Value::Byte),
            TYPE_INT => return buf.read_var_int().map(Value::Int),
            TYPE_UINT => return buf.read_var_uint().map(Value::UInt),
            TYPE_INT64 => return buf.read_var_int64().map(Value::Int64),
            TYPE_UINT64 => return buf.read_var_uint64().map(Value::UInt64),
            TYPE_FLOAT => return buf.read_float().map(Value::Float),
            TYPE_STRING => return buf.read_string().map(Value::String),
            _ => {}
        }
        if depth > MAX_VALUE_DEPTH {
            return Err(ParseError::form_error("value nested too deeply"));
        }
        let definition = usize::try_from(type_id)
            .ok()
            .and_then(|index| schema.definitions().get(index))
            .ok_or_else(|| ParseError::form_error("invalid type"))?;
        match definition.kind {
            DefKind::Enum => {
                let value = buf.read_var_uint()?;
                let variant =
                    definition.field_by_value(value).ok_or_else(|| {
                        ParseError::form_error("unknown enum value")
                    })?;
                Ok(Value::Enum(&definition.name, &variant.name))
            }
            DefKind::Struct => {
                let mut fields =
                    HashMap::with_capacity(definition.fields.len());
                for field in &definition.fields {
                    let value = Self::parse_field_value(
                        schema,
                        field,
                        buf,
                        depth + 1,
                    )?;
                    fields.insert(field.name.as_str(), value);
                }
                Ok(Value::Object(&definition.name, fields))
            }
            DefKind::Message => {
                let mut fields = HashMap::new();
                loop {
                    let tag = buf.read_var_uint()?;
                    if tag == 0 {
                        return Ok(Value::Object(&definition.name, fields));
                    }
                    let field = definition
                        .field_by_value(tag)
                        .ok_or(ParseError::UnknownField(tag))?;
                    let value = Self::parse_field_value(
                        schema,
                        field,
                        buf,
                        depth + 1,
                    )?;
                    fields.insert(field.name.as_str(), value);
                }
            }
        }
    }

    fn parse_field_value<Octs: AsRef<[u8]>>(
        schema: &'a BinarySchema,
        field: &Field,
        buf: &mut ByteBuffer<Octs>,
        depth: usize,
    ) -> Result<Self, ParseError> {
        if !field.is_array {
            return Self::parse_type(schema, field.type_id, buf, depth);
        }
        let config = Config::new();
        let count = buf.read_var_uint()?;
        let mut values = Vec::with_capacity(config.prealloc(count));
        for i in 0..count {
            let before = buf.remaining();
            values.push(Self::parse_type(schema, field.type_id, buf, depth)?);
            if i == 0 {
                check_empty_elements(
                    before,
                    buf.remaining(),
                    count,
                    config.max_prealloc(),
                )?;
            }
        }
        Ok(Value::Array(values))
    }

    /// Encodes the value into a new vec.
    pub fn encode(
        &self,
        schema: &BinarySchema,
    ) -> Result<Vec<u8>, ComposeError> {
        let mut buf = ByteBuffer::new();
        self.compose(schema, &mut buf)?;
        Ok(buf.into_octets())
    }

    /// Appends the encoding of the value to `buf`.
    ///
    /// The type of the value is taken from the value itself: primitive
    /// values are encoded as their primitive type while enums and objects
    /// are encoded according to the schema’s definition of their name. An
    /// array is encoded as its length followed by its elements.
    ///
    /// Fails if the value doesn’t match the schema. In this case, nothing
    /// is appended.
    pub fn compose<Target: Composer>(
        &self,
        schema: &BinarySchema,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.compose_all(|buf| self.compose_value(schema, buf))
    }

    /// Appends the encoding of the value as the value of `field`.
    ///
    /// Unlike [`compose`][Self::compose], this checks that the value
    /// matches the type of the field.
    pub fn compose_field<Target: Composer>(
        &self,
        schema: &BinarySchema,
        field: &Field,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.compose_all(|buf| self.compose_field_value(schema, field, buf))
    }

    fn compose_value<Target: Composer>(
        &self,
        schema: &BinarySchema,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        if let Value::Array(values) = self {
            write_count(buf, values.len())?;
            for value in values {
                value.compose_value(schema, buf)?;
            }
            return Ok(());
        }
        let type_id = self.type_id(schema).ok_or_else(|| {
            ComposeError::form_error("value type missing from schema")
        })?;
        self.compose_type(schema, type_id, buf)
    }

    fn compose_field_value<Target: Composer>(
        &self,
        schema: &BinarySchema,
        field: &Field,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        if !field.is_array {
            return self.compose_type(schema, field.type_id, buf);
        }
        let values = match self {
            Value::Array(values) => values,
            _ => return Err(mismatch()),
        };
        write_count(buf, values.len())?;
        for value in values {
            value.compose_type(schema, field.type_id, buf)?;
        }
        Ok(())
    }

    fn compose_type<Target: Composer>(
        &self,
        schema: &BinarySchema,
        type_id: i32,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        match (type_id, self) {
            (TYPE_BOOL, Value::Bool(value)) => buf.write_bool(*value),
            (TYPE_BYTE, Value::Byte(value)) => buf.write_byte(*value),
            (TYPE_INT, Value::Int(value)) => buf.write_var_int(*value),
            (TYPE_UINT, Value::UInt(value)) => buf.write_var_uint(*value),
            (TYPE_INT64, Value::Int64(value)) => buf.write_var_int64(*value),
            (TYPE_UINT64, Value::UInt64(value)) => {
                buf.write_var_uint64(*value)
            }
            (TYPE_FLOAT, Value::Float(value)) => buf.write_float(*value),
            (TYPE_STRING, Value::String(value)) => buf.write_string(value),
            (_, Value::Enum(name, variant)) => {
                let definition = defined_type(schema, type_id, name)?;
                if definition.kind != DefKind::Enum {
                    return Err(mismatch());
                }
                let variant = definition.field(variant).ok_or_else(|| {
                    ComposeError::form_error("unknown enum variant")
                })?;
                buf.write_var_uint(variant.value)
            }
            (_, Value::Object(name, fields)) => {
                let definition = defined_type(schema, type_id, name)?;
                if fields.keys().any(|name| definition.field(name).is_none())
                {
                    return Err(ComposeError::form_error(
                        "object field missing from schema",
                    ));
                }
                match definition.kind {
                    DefKind::Enum => Err(mismatch()),
                    DefKind::Struct => {
                        for field in &definition.fields {
                            let value = match fields.get(field.name.as_str())
                            {
                                Some(value) => value,
                                None => {
                                    return Err(ComposeError::form_error(
                                        "struct field missing from value",
                                    ))
                                }
                            };
                            value.compose_field_value(schema, field, buf)?;
                        }
                        Ok(())
                    }
                    DefKind::Message => {
                        for field in &definition.fields {
                            let name = field.name.as_str();
                            if let Some(value) = fields.get(name) {
                                buf.write_var_uint(field.value)?;
                                value
                                    .compose_field_value(schema, field, buf)?;
                            }
                        }
                        buf.write_var_uint(0)
                    }
                }
            }
            _ => Err(mismatch()),
        }
    }

    /// Returns the schema type of a value that isn’t an array.
    fn type_id(&self, schema: &BinarySchema) -> Option<i32> {
        match self {
            Value::Bool(_) => Some(TYPE_BOOL),
            Value::Byte(_) => Some(TYPE_BYTE),
            Value::Int(_) => Some(TYPE_INT),
            Value::UInt(_) => Some(TYPE_UINT),
            Value::Int64(_) => Some(TYPE_INT64),
            Value::UInt64(_) => Some(TYPE_UINT64),
            Value::Float(_) => Some(TYPE_FLOAT),
            Value::String(_) => Some(TYPE_STRING),
            Value::Array(_) => None,
            Value::Enum(name, _) | Value::Object(name, _) => schema
                .find_definition(name)
                .and_then(|index| i32::try_from(index).ok()),
        }
    }
}

/// # Access to the content
impl<'a> Value<'a> {
    /// Returns the boolean if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the octet if this is a byte value.
    pub fn as_byte(&self) -> Option<u8> {
        match *self {
            Value::Byte(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer if this is a signed 32 bit value.
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Value::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer if this is an unsigned 32 bit value.
    pub fn as_uint(&self) -> Option<u32> {
        match *self {
            Value::UInt(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer if this is a signed 64 bit value.
    pub fn as_int64(&self) -> Option<i64> {
        match *self {
            Value::Int64(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer if this is an unsigned 64 bit value.
    pub fn as_uint64(&self) -> Option<u64> {
        match *self {
            Value::UInt64(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the float if this is a float value.
    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Value::Float(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the elements if this is an array value.
    pub fn as_array(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the variant name if this is an enum value.
    pub fn as_variant(&self) -> Option<&'a str> {
        match *self {
            Value::Enum(_, variant) => Some(variant),
            _ => None,
        }
    }

    /// Returns the type name of an enum or object value.
    pub fn type_name(&self) -> Option<&'a str> {
        match *self {
            Value::Enum(name, _) | Value::Object(name, _) => Some(name),
            _ => None,
        }
    }

    /// Returns the number of elements of an array value.
    ///
    /// Returns zero for all other values.
    pub fn len(&self) -> usize {
        self.as_array().map_or(0, <[_]>::len)
    }

    /// Returns whether this is not an array or an empty one.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an element to an array value.
    ///
    /// Does nothing for all other values.
    pub fn push(&mut self, value: Value<'a>) {
        if let Value::Array(values) = self {
            values.push(value)
        }
    }

    /// Returns a field of an object value.
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        match self {
            Value::Object(_, fields) => fields.get(name),
            _ => None,
        }
    }

    /// Sets a field of an object value.
    ///
    /// Does nothing for all other values.
    pub fn set(&mut self, name: &'a str, value: Value<'a>) {
        if let Value::Object(_, fields) = self {
            fields.insert(name, value);
        }
    }

    /// Removes a field from an object value and returns it.
    pub fn remove(&mut self, name: &str) -> Option<Value<'a>> {
        match self {
            Value::Object(_, fields) => fields.remove(name),
            _ => None,
        }
    }
}

//--- From

macro_rules! value_from {
    ( $( $type:ty => $variant:ident, )* ) => {
        $(
            impl<'a> From<$type> for Value<'a> {
                fn from(value: $type) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    }
}

value_from! {
    bool => Bool,
    u8 => Byte,
    i32 => Int,
    u32 => UInt,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    String => String,
    &str => String,
}

//--- Debug

impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(value) => fmt::Debug::fmt(value, f),
            Value::Byte(value) => fmt::Debug::fmt(value, f),
            Value::Int(value) => fmt::Debug::fmt(value, f),
            Value::UInt(value) => fmt::Debug::fmt(value, f),
            Value::Int64(value) => fmt::Debug::fmt(value, f),
            Value::UInt64(value) => fmt::Debug::fmt(value, f),
            Value::Float(value) => fmt::Debug::fmt(value, f),
            Value::String(value) => fmt::Debug::fmt(value, f),
            Value::Array(values) => f.debug_list().entries(values).finish(),
            Value::Enum(name, variant) => write!(f, "{}::{}", name, variant),
            Value::Object(name, fields) => {
                // Sorted so the output doesn’t depend on the hasher.
                let mut names: Vec<_> = fields.keys().collect();
                names.sort();
                let mut res = f.debug_struct(name);
                for field in names {
                    res.field(field, &fields[field]);
                }
                res.finish()
            }
        }
    }
}

//------------ Helpers -------------------------------------------------------

/// Returns the definition for `type_id` if it has the given name.
fn defined_type<'s>(
    schema: &'s BinarySchema,
    type_id: i32,
    name: &str,
) -> Result<&'s Definition, ComposeError> {
    usize::try_from(type_id)
        .ok()
        .and_then(|index| schema.definitions().get(index))
        .filter(|definition| definition.name == name)
        .ok_or_else(mismatch)
}

fn mismatch() -> ComposeError {
    ComposeError::form_error("value doesn’t match its type")
}

fn write_count<Target: Composer>(
    buf: &mut ByteBuffer<Target>,
    count: usize,
) -> Result<(), ComposeError> {
    let count = u32::try_from(count).map_err(|_| ComposeError::LongData)?;
    buf.write_var_uint(count)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::logging::init_logging;

    fn schema() -> BinarySchema {
        BinarySchema::new(vec![
            Definition::new(
                "Color",
                DefKind::Enum,
                vec![
                    Field::new("RED", TYPE_UINT, false, 0),
                    Field::new("BLUE", TYPE_UINT, false, 5),
                ],
            ),
            Definition::new(
                "Pixel",
                DefKind::Struct,
                vec![
                    Field::new("color", 0, false, 0),
                    Field::new("alpha", TYPE_BYTE, false, 0),
                ],
            ),
            Definition::new(
                "Image",
                DefKind::Message,
                vec![
                    Field::new("pixels", 1, true, 1),
                    Field::new("title", TYPE_STRING, false, 2),
                    Field::new("size", TYPE_UINT64, false, 3),
                    Field::new("child", 2, false, 4),
                ],
            ),
        ])
        .unwrap()
    }

    fn pixel<'a>(color: &'a str, alpha: u8) -> Value<'a> {
        let mut res = Value::Object("Pixel", HashMap::new());
        res.set("color", Value::Enum("Color", color));
        res.set("alpha", alpha.into());
        res
    }

    #[test]
    fn decode_and_encode() {
        init_logging();
        let schema = schema();
        let data = [1, 2, 5, 0xFF, 0, 0x80, 3, 0x80, 0x01, 4, 0, 0];
        let value = Value::decode(&schema, 2, &data).unwrap();

        assert_eq!(value.type_name(), Some("Image"));
        let pixels = value.get("pixels").unwrap();
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels.as_array().unwrap()[0], pixel("BLUE", 0xFF));
        assert_eq!(pixels.as_array().unwrap()[1], pixel("RED", 0x80));
        assert_eq!(value.get("title"), None);
        assert_eq!(value.get("size").and_then(Value::as_uint64), Some(128));
        assert_eq!(
            value.get("child"),
            Some(&Value::Object("Image", HashMap::new()))
        );

        assert_eq!(value.encode(&schema).unwrap(), data);
    }

    #[test]
    fn build_and_encode() {
        let schema = schema();
        let mut pixels = Value::Array(Vec::new());
        assert!(pixels.is_empty());
        pixels.push(pixel("RED", 1));
        assert_eq!(pixels.len(), 1);

        let mut value = Value::Object("Image", HashMap::new());
        value.set("pixels", pixels);
        value.set("title", "x".into());
        value.set("size", 9u64.into());
        assert_eq!(value.remove("size"), Some(Value::UInt64(9)));
        assert_eq!(
            value.encode(&schema).unwrap(),
            [1, 1, 0, 1, 2, 1, b'x', 0]
        );
    }

    #[test]
    fn decode_errors() {
        init_logging();
        let schema = schema();

        // Enum value 3 isn’t a variant.
        assert!(matches!(
            Value::decode(&schema, 0, &[3]),
            Err(ParseError::Form(_))
        ));
        assert_eq!(
            Value::decode(&schema, 2, &[9, 0]),
            Err(ParseError::UnknownField(9))
        );
        assert_eq!(
            Value::decode(&schema, 2, &[2]),
            Err(ParseError::ShortInput)
        );
        assert!(matches!(
            Value::decode(&schema, 7, &[0]),
            Err(ParseError::Form(_))
        ));

        let mut buf = ByteBuffer::from_slice(&[1, 1, 0]);
        assert!(Value::parse(&schema, 2, &mut buf).is_err());
        assert_eq!(buf.index(), 0);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        init_logging();
        let schema = schema();
        let mut data = vec![4u8; 100];
        data.extend_from_slice(&[0; 101]);
        assert!(matches!(
            Value::decode(&schema, 2, &data),
            Err(ParseError::Form(_))
        ));
    }

    #[test]
    fn encode_errors() {
        let schema = schema();

        // The struct is missing its alpha field.
        let mut value = Value::Object("Pixel", HashMap::new());
        value.set("color", Value::Enum("Color", "RED"));
        assert!(matches!(value.encode(&schema), Err(ComposeError::Form(_))));

        // The field has the wrong type.
        let mut value = Value::Object("Image", HashMap::new());
        value.set("title", 1u32.into());
        let mut buf = ByteBuffer::new();
        assert!(matches!(
            value.compose(&schema, &mut buf),
            Err(ComposeError::Form(_))
        ));
        assert!(buf.as_slice().is_empty());

        // Unknown names.
        assert!(Value::Enum("Color", "GREEN").encode(&schema).is_err());
        assert!(Value::Enum("Shade", "RED").encode(&schema).is_err());
        let mut value = Value::Object("Image", HashMap::new());
        value.set("width", 1u32.into());
        assert!(value.encode(&schema).is_err());
    }

    #[test]
    fn primitives_and_arrays() {
        let schema = schema();
        let value = Value::Array(vec![true.into(), (-1i32).into()]);
        assert_eq!(value.encode(&schema).unwrap(), [2, 1, 1]);

        let field = Field::new("ints", TYPE_INT, true, 1);
        let mut buf = ByteBuffer::new();
        assert!(value.compose_field(&schema, &field, &mut buf).is_err());
        let value = Value::Array(vec![(-1i32).into(), 1i32.into()]);
        value.compose_field(&schema, &field, &mut buf).unwrap();
        assert_eq!(buf.as_slice(), &[2, 1, 2]);
        assert_eq!(Value::parse_field(&schema, &field, &mut buf), Ok(value));
    }

    #[test]
    fn debug_output() {
        assert_eq!(
            format!("{:?}", pixel("BLUE", 7)),
            "Pixel { alpha: 7, color: Color::BLUE }"
        );
        assert_eq!(
            format!("{:?}", Value::Array(vec!["a".into()])),
            "[\"a\"]"
        );
    }
}
