//! Schemas for skipping unknown fields.
//!
//! When a message is decoded with code generated from an older version of
//! its schema, it may contain fields the code doesn’t know about. Such a
//! field can only be skipped if the layout of its value is known. This
//! information comes from a schema describing the newer version, provided
//! through the [`SkipField`] trait.
//!
//! The crate provides two implementations. [`NoSchema`] can’t skip
//! anything and thus makes decoding fail on every unknown field.
//! [`BinarySchema`] holds a full schema, typically decoded from its binary
//! representation shipped alongside the data.
//!
//! # Binary schema format
//!
//! The binary representation of a schema consists of the number of
//! definitions as a variable-length integer followed by the definitions.
//! Each definition is its name as a string, its kind as a single octet
//! (0 for an enum, 1 for a struct, 2 for a message), and the number of
//! its fields as a variable-length integer followed by the fields. Each
//! field is its name as a string, its type as a zig-zag integer, a single
//! octet that is non-zero if the field is an array, and its value as a
//! variable-length integer. The value is the tag for message fields and
//! the integer value for enum variants. Negative types denote primitive
//! types as given by the `TYPE_*` constants in this module, non-negative
//! types are the index of another definition.

use crate::buffer::{ByteBuffer, Composer};
use crate::wire::{ComposeError, ParseError};
use std::collections::HashMap;
use tracing::trace;

//------------ SkipField -----------------------------------------------------

/// A type that knows how to skip fields of message records.
pub trait SkipField {
    /// Returns the index of the definition with the given name.
    fn find_definition(&self, name: &str) -> Option<u32>;

    /// Skips the value of the field with `tag` in `definition`.
    ///
    /// The read position of `buf` is right after the field’s tag. Returns
    /// whether the value was skipped. If it wasn’t, the read position is
    /// left unchanged.
    fn skip_field<Octs: AsRef<[u8]>>(
        &self,
        buf: &mut ByteBuffer<Octs>,
        definition: u32,
        tag: u32,
    ) -> bool;
}

impl<'a, S: SkipField> SkipField for &'a S {
    fn find_definition(&self, name: &str) -> Option<u32> {
        (*self).find_definition(name)
    }

    fn skip_field<Octs: AsRef<[u8]>>(
        &self,
        buf: &mut ByteBuffer<Octs>,
        definition: u32,
        tag: u32,
    ) -> bool {
        (*self).skip_field(buf, definition, tag)
    }
}

//------------ NoSchema ------------------------------------------------------

/// A schema that doesn’t know any definitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSchema;

impl SkipField for NoSchema {
    fn find_definition(&self, _name: &str) -> Option<u32> {
        None
    }

    fn skip_field<Octs: AsRef<[u8]>>(
        &self,
        _buf: &mut ByteBuffer<Octs>,
        _definition: u32,
        _tag: u32,
    ) -> bool {
        false
    }
}

//------------ Type constants ------------------------------------------------

/// The type of a boolean field.
pub const TYPE_BOOL: i32 = -1;

/// The type of a byte field.
pub const TYPE_BYTE: i32 = -2;

/// The type of a signed 32 bit integer field.
pub const TYPE_INT: i32 = -3;

/// The type of an unsigned 32 bit integer field.
pub const TYPE_UINT: i32 = -4;

/// The type of a float field.
pub const TYPE_FLOAT: i32 = -5;

/// The type of a string field.
pub const TYPE_STRING: i32 = -6;

/// The type of a signed 64 bit integer field.
pub const TYPE_INT64: i32 = -7;

/// The type of an unsigned 64 bit integer field.
pub const TYPE_UINT64: i32 = -8;

/// The maximum nesting of values skipped or decoded through a schema.
pub(crate) const MAX_VALUE_DEPTH: usize = 64;

//------------ DefKind -------------------------------------------------------

/// The kind of a definition.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DefKind {
    /// An enum whose fields are its variants.
    Enum,

    /// A struct whose fields are all required and untagged.
    Struct,

    /// A message whose fields are optional and tagged.
    Message,
}

impl DefKind {
    /// Returns the kind for its wire value.
    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            0 => Some(DefKind::Enum),
            1 => Some(DefKind::Struct),
            2 => Some(DefKind::Message),
            _ => None,
        }
    }

    /// Returns the wire value of the kind.
    pub fn to_int(self) -> u8 {
        match self {
            DefKind::Enum => 0,
            DefKind::Struct => 1,
            DefKind::Message => 2,
        }
    }
}

//------------ Field ---------------------------------------------------------

/// A field of a definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field {
    /// The name of the field.
    pub name: String,

    /// The type of the field.
    ///
    /// This is either one of the `TYPE_*` constants or the index of a
    /// definition.
    pub type_id: i32,

    /// Whether the field holds an array of values.
    pub is_array: bool,

    /// The tag of a message field or the value of an enum variant.
    pub value: u32,
}

impl Field {
    /// Creates a new field.
    pub fn new(
        name: impl Into<String>,
        type_id: i32,
        is_array: bool,
        value: u32,
    ) -> Self {
        Field { name: name.into(), type_id, is_array, value }
    }
}

//------------ Definition ----------------------------------------------------

/// The definition of an enum, struct, or message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Definition {
    /// The name of the definition.
    pub name: String,

    /// The kind of the definition.
    pub kind: DefKind,

    /// The fields of the definition in declaration order.
    pub fields: Vec<Field>,
}

impl Definition {
    /// Creates a new definition.
    pub fn new(
        name: impl Into<String>,
        kind: DefKind,
        fields: Vec<Field>,
    ) -> Self {
        Definition { name: name.into(), kind, fields }
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the field with the given tag or value.
    pub fn field_by_value(&self, value: u32) -> Option<&Field> {
        self.fields.iter().find(|field| field.value == value)
    }
}

//------------ BinarySchema --------------------------------------------------

/// A complete schema.
#[derive(Clone, Debug, Default)]
pub struct BinarySchema {
    /// The definitions in schema order.
    definitions: Vec<Definition>,

    /// The index of each definition by name.
    by_name: HashMap<String, u32>,
}

impl BinarySchema {
    /// Creates a schema from its definitions.
    ///
    /// Fails if a field’s type refers to neither a primitive type nor one
    /// of the definitions.
    pub fn new(definitions: Vec<Definition>) -> Result<Self, ParseError> {
        let count = u32::try_from(definitions.len())
            .map_err(|_| ParseError::form_error("too many definitions"))?;
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (index, definition) in (0..count).zip(definitions.iter()) {
            for field in &definition.fields {
                check_type(field.type_id, count)?;
            }
            // The first of several equally named definitions wins.
            by_name.entry(definition.name.clone()).or_insert(index);
        }
        Ok(BinarySchema { definitions, by_name })
    }

    /// Decodes a schema from the read position of `buf`.
    pub fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        let start = buf.index();
        let res = Self::parse_definitions(buf).and_then(Self::new);
        if res.is_err() {
            buf.seek_to(start);
        }
        res
    }

    fn parse_definitions<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Vec<Definition>, ParseError> {
        let count = buf.read_var_uint()?;
        // Every definition needs at least three octets.
        let mut definitions = Vec::with_capacity(usize::min(
            count as usize,
            buf.remaining() / 3,
        ));
        for _ in 0..count {
            let name = buf.read_string()?;
            let kind = DefKind::from_int(buf.read_byte()?).ok_or_else(|| {
                ParseError::form_error("invalid definition kind")
            })?;
            let field_count = buf.read_var_uint()?;
            // And every field at least four.
            let mut fields = Vec::with_capacity(usize::min(
                field_count as usize,
                buf.remaining() / 4,
            ));
            for _ in 0..field_count {
                let name = buf.read_string()?;
                let type_id = buf.read_var_int()?;
                let is_array = buf.read_bool()?;
                let value = buf.read_var_uint()?;
                fields.push(Field { name, type_id, is_array, value });
            }
            definitions.push(Definition { name, kind, fields });
        }
        Ok(definitions)
    }

    /// Decodes a schema from the start of a slice.
    pub fn from_slice(data: &[u8]) -> Result<Self, ParseError> {
        Self::parse(&mut ByteBuffer::from_slice(data))
    }

    /// Appends the binary representation of the schema to `buf`.
    pub fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.compose_all(|buf| {
            write_count(buf, self.definitions.len())?;
            for definition in &self.definitions {
                buf.write_string(&definition.name)?;
                buf.write_byte(definition.kind.to_int())?;
                write_count(buf, definition.fields.len())?;
                for field in &definition.fields {
                    buf.write_string(&field.name)?;
                    buf.write_var_int(field.type_id)?;
                    buf.write_bool(field.is_array)?;
                    buf.write_var_uint(field.value)?;
                }
            }
            Ok(())
        })
    }

    /// Encodes the schema into a new vec.
    pub fn encode(&self) -> Result<Vec<u8>, ComposeError> {
        let mut buf = ByteBuffer::new();
        self.compose(&mut buf)?;
        Ok(buf.into_octets())
    }

    /// Returns the definitions of the schema.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Returns the definition with the given name.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.find_definition(name)
            .and_then(|index| self.definitions.get(index as usize))
    }

    /// Skips a complete value of the given field.
    fn skip_value<Octs: AsRef<[u8]>>(
        &self,
        buf: &mut ByteBuffer<Octs>,
        field: &Field,
        depth: usize,
    ) -> Result<(), ParseError> {
        if depth > MAX_VALUE_DEPTH {
            return Err(ParseError::form_error("value nested too deeply"));
        }
        if !field.is_array {
            return self.skip_one(buf, field.type_id, depth);
        }
        let count = buf.read_var_uint()?;
        for _ in 0..count {
            let before = buf.index();
            self.skip_one(buf, field.type_id, depth)?;
            if buf.index() == before {
                // Values of this type occupy no octets.
                break;
            }
        }
        Ok(())
    }

    /// Skips a single value of the given type.
    fn skip_one<Octs: AsRef<[u8]>>(
        &self,
        buf: &mut ByteBuffer<Octs>,
        type_id: i32,
        depth: usize,
    ) -> Result<(), ParseError> {
        match type_id {
            TYPE_BOOL | TYPE_BYTE => buf.read_byte().map(|_| ()),
            TYPE_INT | TYPE_UINT => buf.read_var_uint().map(|_| ()),
            TYPE_INT64 | TYPE_UINT64 => buf.read_var_uint64().map(|_| ()),
            TYPE_FLOAT => buf.read_bytes(4).map(|_| ()),
            TYPE_STRING => {
                let len = buf.read_var_uint()?;
                buf.read_bytes(len as usize).map(|_| ())
            }
            _ => {
                let definition = usize::try_from(type_id)
                    .ok()
                    .and_then(|index| self.definitions.get(index))
                    .ok_or_else(|| ParseError::form_error("invalid type"))?;
                match definition.kind {
                    DefKind::Enum => buf.read_var_uint().map(|_| ()),
                    DefKind::Struct => {
                        for field in &definition.fields {
                            self.skip_value(buf, field, depth + 1)?;
                        }
                        Ok(())
                    }
                    DefKind::Message => loop {
                        let tag = buf.read_var_uint()?;
                        if tag == 0 {
                            return Ok(());
                        }
                        let field = definition
                            .field_by_value(tag)
                            .ok_or(ParseError::UnknownField(tag))?;
                        self.skip_value(buf, field, depth + 1)?;
                    },
                }
            }
        }
    }
}

impl SkipField for BinarySchema {
    fn find_definition(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    fn skip_field<Octs: AsRef<[u8]>>(
        &self,
        buf: &mut ByteBuffer<Octs>,
        definition: u32,
        tag: u32,
    ) -> bool {
        let field = match self
            .definitions
            .get(definition as usize)
            .and_then(|definition| definition.field_by_value(tag))
        {
            Some(field) => field,
            None => return false,
        };
        let start = buf.index();
        match self.skip_value(buf, field, 0) {
            Ok(()) => {
                trace!(field = %field.name, tag, "skipped field");
                true
            }
            Err(err) => {
                trace!(field = %field.name, tag, %err, "cannot skip field");
                buf.seek_to(start);
                false
            }
        }
    }
}

//--- PartialEq and Eq

impl PartialEq for BinarySchema {
    fn eq(&self, other: &Self) -> bool {
        self.definitions == other.definitions
    }
}

impl Eq for BinarySchema {}

//------------ Helpers -------------------------------------------------------

/// Checks that a field type is a primitive or refers to a definition.
fn check_type(type_id: i32, count: u32) -> Result<(), ParseError> {
    if type_id < TYPE_UINT64 || i64::from(type_id) >= i64::from(count) {
        Err(ParseError::form_error("invalid field type"))
    } else {
        Ok(())
    }
}

fn write_count<Target: Composer>(
    buf: &mut ByteBuffer<Target>,
    count: usize,
) -> Result<(), ComposeError> {
    let count = u32::try_from(count).map_err(|_| ComposeError::LongData)?;
    buf.write_var_uint(count)
}

//============ Testing =======================================================
