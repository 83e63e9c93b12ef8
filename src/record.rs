//! Records and their fields.
//!
//! A *record* is a user type that is encoded as a whole, either as a
//! struct with all fields required and in declaration order or as a
//! message with optional, tagged fields. Records implement the [`Record`]
//! trait. Normally, this happens through the
//! [`define_struct!`][crate::define_struct] and
//! [`define_message!`][crate::define_message] macros, but the trait can be
//! implemented by hand on top of the sessions of the
//! [`protocol`][crate::protocol] module, too.
//!
//! Which fields of a record have been set is tracked in a [`FieldFlags`]
//! bitmask. The generated accessors return `None` for fields whose flag is
//! clear.
//!
//! Decoding is done with a [`DecodeContext`]. It provides the schema used
//! for skipping unknown message fields, the memory pool for boxed nested
//! records, the configuration, and it keeps track of how deeply records
//! are nested.

use crate::buffer::{ByteBuffer, Composer};
use crate::config::Config;
use crate::pool::MemoryPool;
use crate::protocol::{
    MessageDecoder, MessageEncoder, StructDecoder, StructEncoder,
};
use crate::schema::{NoSchema, SkipField};
use crate::wire::{ComposeError, ParseError};
use core::cmp;
use tracing::debug;

//------------ Record --------------------------------------------------------

/// A type that is encoded as a struct or message record.
pub trait Record: Default {
    /// The name of the record type.
    ///
    /// This is used for error reporting and to find the record’s
    /// definition in a schema.
    const NAME: &'static str;

    /// Appends the record to the end of `buf`.
    ///
    /// If encoding fails, the buffer is left at its previous length.
    fn encode<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError>;

    /// Decodes the record’s fields from the read position of `buf`.
    ///
    /// Decoded fields are set in `self`. Callers should generally use
    /// [`parse_record`] or [`parse_record_into`] instead which enforce the
    /// nesting limit of `ctx`.
    fn decode<Octs: AsRef<[u8]>, S: SkipField>(
        &mut self,
        buf: &mut ByteBuffer<Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<(), ParseError>;

    /// Encodes the record into a new vec.
    fn to_vec(&self) -> Result<Vec<u8>, ComposeError> {
        let mut buf = ByteBuffer::new();
        self.encode(&mut buf)?;
        Ok(buf.into_octets())
    }

    /// Decodes a record from the start of a slice without a schema.
    ///
    /// Octets following the record are ignored.
    fn from_slice(data: &[u8]) -> Result<Self, ParseError> {
        Self::decode_from(data, &mut DecodeContext::new())
    }

    /// Decodes a record from the start of a slice using a context.
    fn decode_from<S: SkipField>(
        data: &[u8],
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        parse_record(&mut ByteBuffer::from_slice(data), ctx)
    }
}

/// Decodes a record from the read position of `buf`.
pub fn parse_record<R: Record, Octs: AsRef<[u8]>, S: SkipField>(
    buf: &mut ByteBuffer<Octs>,
    ctx: &mut DecodeContext<'_, S>,
) -> Result<R, ParseError> {
    let mut res = R::default();
    parse_record_into(buf, &mut res, ctx)?;
    Ok(res)
}

/// Decodes a record from the read position of `buf` into `target`.
pub fn parse_record_into<R: Record, Octs: AsRef<[u8]>, S: SkipField>(
    buf: &mut ByteBuffer<Octs>,
    target: &mut R,
    ctx: &mut DecodeContext<'_, S>,
) -> Result<(), ParseError> {
    ctx.nested(|ctx| target.decode(buf, ctx)).map_err(|err| {
        debug!(record = R::NAME, %err, "rejecting record");
        err
    })
}

//------------ Element -------------------------------------------------------

/// A type that can be an element of an array field.
pub trait Element {
    /// Appends the element to `buf`.
    fn compose_element<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError>;

    /// Reads an element from the read position of `buf`.
    fn parse_element<Octs: AsRef<[u8]>, S: SkipField>(
        buf: &mut ByteBuffer<Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError>
    where
        Self: Sized;
}

//------------ FieldValue ----------------------------------------------------

/// A type that can be the value of a record field.
///
/// The trait connects a field type to the session operations needed to
/// encode and decode it, so that record implementations can treat all
/// their fields alike. It is implemented for all primitive types, arrays
/// of elements as `Vec<_>`, records, boxed records, and enum types created
/// with [`wire_enum!`][crate::wire_enum].
pub trait FieldValue: Sized {
    /// Writes the value as struct field number `field`.
    fn encode_in_struct<Target: Composer>(
        &self,
        enc: &mut StructEncoder<'_, Target>,
        field: u32,
    ) -> Result<(), ComposeError>;

    /// Reads the value of struct field number `field`.
    fn decode_in_struct<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut StructDecoder<'_, Octs>,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError>;

    /// Writes the value as message field with the given tag.
    fn encode_in_message<Target: Composer>(
        &self,
        enc: &mut MessageEncoder<'_, Target>,
        tag: u32,
    ) -> Result<(), ComposeError>;

    /// Reads the value of a message field whose tag has just been read.
    fn decode_in_message<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut MessageDecoder<'_, Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError>;
}

/// Implements `Element` and `FieldValue` for a primitive value type.
#[doc(hidden)]
#[macro_export]
macro_rules! __value_field {
    ( $( $type:ty ),* ) => {
        $(
            impl $crate::record::Element for $type {
                fn compose_element<Target: $crate::buffer::Composer>(
                    &self,
                    buf: &mut $crate::buffer::ByteBuffer<Target>,
                ) -> Result<(), $crate::wire::ComposeError> {
                    $crate::wire::Compose::compose(self, buf)
                }

                fn parse_element<
                    Octs: AsRef<[u8]>, S: $crate::schema::SkipField
                >(
                    buf: &mut $crate::buffer::ByteBuffer<Octs>,
                    _ctx: &mut $crate::record::DecodeContext<'_, S>,
                ) -> Result<Self, $crate::wire::ParseError> {
                    <$type as $crate::wire::Parse>::parse(buf)
                }
            }

            impl $crate::record::FieldValue for $type {
                fn encode_in_struct<Target: $crate::buffer::Composer>(
                    &self,
                    enc: &mut $crate::protocol::StructEncoder<'_, Target>,
                    field: u32,
                ) -> Result<(), $crate::wire::ComposeError> {
                    enc.write_field(field, self)
                }

                fn decode_in_struct<
                    Octs: AsRef<[u8]>, S: $crate::schema::SkipField
                >(
                    dec: &mut $crate::protocol::StructDecoder<'_, Octs>,
                    field: u32,
                    _ctx: &mut $crate::record::DecodeContext<'_, S>,
                ) -> Result<Self, $crate::wire::ParseError> {
                    dec.read_field(field)
                }

                fn encode_in_message<Target: $crate::buffer::Composer>(
                    &self,
                    enc: &mut $crate::protocol::MessageEncoder<'_, Target>,
                    tag: u32,
                ) -> Result<(), $crate::wire::ComposeError> {
                    enc.write_field(tag, self)
                }

                fn decode_in_message<
                    Octs: AsRef<[u8]>, S: $crate::schema::SkipField
                >(
                    dec: &mut $crate::protocol::MessageDecoder<'_, Octs>,
                    _ctx: &mut $crate::record::DecodeContext<'_, S>,
                ) -> Result<Self, $crate::wire::ParseError> {
                    dec.read_field()
                }
            }
        )*
    }
}

__value_field!(bool, u8, i32, u32, i64, u64, f32, String);

//--- Vec

impl<T: Element> FieldValue for Vec<T> {
    fn encode_in_struct<Target: Composer>(
        &self,
        enc: &mut StructEncoder<'_, Target>,
        field: u32,
    ) -> Result<(), ComposeError> {
        enc.begin_array(field, self.len())?;
        for item in self {
            enc.array_element(field, item)?;
        }
        enc.end_array(field)
    }

    fn decode_in_struct<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut StructDecoder<'_, Octs>,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        let count = dec.begin_array(field)?;
        let mut res = Vec::with_capacity(ctx.config().prealloc(count));
        for i in 0..count {
            let before = dec.remaining();
            res.push(dec.array_element(field, ctx)?);
            if i == 0 {
                check_empty_elements(
                    before,
                    dec.remaining(),
                    count,
                    ctx.config().max_prealloc(),
                )?;
            }
        }
        dec.end_array(field)?;
        Ok(res)
    }

    fn encode_in_message<Target: Composer>(
        &self,
        enc: &mut MessageEncoder<'_, Target>,
        tag: u32,
    ) -> Result<(), ComposeError> {
        enc.write_array_begin(tag, self.len())?;
        for item in self {
            enc.write_array_element(item)?;
        }
        Ok(())
    }

    fn decode_in_message<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut MessageDecoder<'_, Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        let count = dec.read_array_begin()?;
        let mut res = Vec::with_capacity(ctx.config().prealloc(count));
        for i in 0..count {
            let before = dec.remaining();
            res.push(dec.read_array_element(ctx)?);
            if i == 0 {
                check_empty_elements(
                    before,
                    dec.remaining(),
                    count,
                    ctx.config().max_prealloc(),
                )?;
            }
        }
        Ok(res)
    }
}

//--- Box

impl<R: Record> FieldValue for Box<R> {
    fn encode_in_struct<Target: Composer>(
        &self,
        enc: &mut StructEncoder<'_, Target>,
        field: u32,
    ) -> Result<(), ComposeError> {
        enc.write_field_nested(field, self.as_ref())
    }

    fn decode_in_struct<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut StructDecoder<'_, Octs>,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        let mut res = ctx.pool_mut().allocate::<R>();
        dec.read_field_nested_into(field, res.as_mut(), ctx)?;
        Ok(res)
    }

    fn encode_in_message<Target: Composer>(
        &self,
        enc: &mut MessageEncoder<'_, Target>,
        tag: u32,
    ) -> Result<(), ComposeError> {
        enc.write_field_nested(tag, self.as_ref())
    }

    fn decode_in_message<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut MessageDecoder<'_, Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        let mut res = ctx.pool_mut().allocate::<R>();
        dec.read_field_nested_into(res.as_mut(), ctx)?;
        Ok(res)
    }
}

//--- Option<Box>
//
// A record can’t contain itself through a plain box since creating its
// default value would never end. Recursive records use an optional box
// instead. An empty option is encoded like a default record.

impl<R: Record> FieldValue for Option<Box<R>> {
    fn encode_in_struct<Target: Composer>(
        &self,
        enc: &mut StructEncoder<'_, Target>,
        field: u32,
    ) -> Result<(), ComposeError> {
        match self {
            Some(value) => enc.write_field_nested(field, value.as_ref()),
            None => enc.write_field_nested(field, &R::default()),
        }
    }

    fn decode_in_struct<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut StructDecoder<'_, Octs>,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        <Box<R>>::decode_in_struct(dec, field, ctx).map(Some)
    }

    fn encode_in_message<Target: Composer>(
        &self,
        enc: &mut MessageEncoder<'_, Target>,
        tag: u32,
    ) -> Result<(), ComposeError> {
        match self {
            Some(value) => enc.write_field_nested(tag, value.as_ref()),
            None => enc.write_field_nested(tag, &R::default()),
        }
    }

    fn decode_in_message<Octs: AsRef<[u8]>, S: SkipField>(
        dec: &mut MessageDecoder<'_, Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<Self, ParseError> {
        <Box<R>>::decode_in_message(dec, ctx).map(Some)
    }
}

//------------ check_empty_elements ------------------------------------------

/// Rejects oversized arrays of elements that occupy no octets.
///
/// Called after the first element of an array with `before` and `after`
/// the octets left before and after reading it. If the element consumed
/// nothing, none of the following ones will either, so input length can’t
/// bound the count. Such an array is only accepted if its count fits
/// either the remaining input or `limit`.
pub(crate) fn check_empty_elements(
    before: usize,
    after: usize,
    count: u32,
    limit: usize,
) -> Result<(), ParseError> {
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    if before == after && count > cmp::max(after, limit) {
        debug!(count, "rejecting array of empty elements");
        return Err(ParseError::form_error("too many empty array elements"));
    }
    Ok(())
}

//------------ FieldFlags ----------------------------------------------------

/// Returns the number of 32 bit words needed for one flag per field.
pub const fn flag_words(fields: &[&str]) -> usize {
    (fields.len() + 31) / 32
}

/// Returns whether message tags are non-zero and strictly ascending.
pub const fn tags_ascending(tags: &[u32]) -> bool {
    let mut i = 0;
    while i < tags.len() {
        if tags[i] == 0 || (i > 0 && tags[i - 1] >= tags[i]) {
            return false;
        }
        i += 1;
    }
    true
}

/// The presence bitmask of a record.
///
/// Bit `n` is set if field `n`, counted in declaration order, has a value.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct FieldFlags<const WORDS: usize> {
    words: [u32; WORDS],
}

impl<const WORDS: usize> FieldFlags<WORDS> {
    /// Creates a bitmask with all flags clear.
    pub const fn new() -> Self {
        FieldFlags { words: [0; WORDS] }
    }

    /// Returns whether the flag for `field` is set.
    pub fn get(&self, field: usize) -> bool {
        match self.words.get(field / 32) {
            Some(word) => word & (1 << (field % 32)) != 0,
            None => false,
        }
    }

    /// Sets the flag for `field`.
    pub fn set(&mut self, field: usize) {
        if let Some(word) = self.words.get_mut(field / 32) {
            *word |= 1 << (field % 32)
        }
    }

    /// Clears the flag for `field`.
    pub fn clear(&mut self, field: usize) {
        if let Some(word) = self.words.get_mut(field / 32) {
            *word &= !(1 << (field % 32))
        }
    }

    /// Returns whether no flag is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }
}

//--- Default

impl<const WORDS: usize> Default for FieldFlags<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

//--- Debug

impl<const WORDS: usize> core::fmt::Debug for FieldFlags<WORDS> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut list = f.debug_list();
        for field in 0..WORDS * 32 {
            if self.get(field) {
                list.entry(&field);
            }
        }
        list.finish()
    }
}

//------------ DecodeContext -------------------------------------------------

/// Everything decoding needs beyond the buffer.
pub struct DecodeContext<'a, S = NoSchema> {
    /// The schema used for skipping unknown message fields.
    schema: &'a S,

    /// The pool boxed nested records are allocated from.
    pool: MemoryPool,

    config: Config,

    /// The number of records currently being decoded.
    depth: usize,
}

impl DecodeContext<'static, NoSchema> {
    /// Creates a context without a schema.
    ///
    /// Messages decoded with this context fail on any unknown field.
    pub fn new() -> Self {
        DecodeContext::with_schema(&NoSchema)
    }
}

impl<'a, S: SkipField> DecodeContext<'a, S> {
    /// Creates a context using the given schema for skipping fields.
    pub fn with_schema(schema: &'a S) -> Self {
        DecodeContext {
            schema,
            pool: MemoryPool::new(),
            config: Config::default(),
            depth: 0,
        }
    }

    /// Replaces the config of the context.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Returns the schema.
    pub fn schema(&self) -> &'a S {
        self.schema
    }

    /// Returns the memory pool.
    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Returns the memory pool for allocating.
    pub fn pool_mut(&mut self) -> &mut MemoryPool {
        &mut self.pool
    }

    /// Returns the config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the index of the schema definition for a record name.
    pub fn definition(&self, name: &str) -> Option<u32> {
        self.schema.find_definition(name)
    }

    /// Runs `op` one nesting level deeper.
    fn nested<T, F>(&mut self, op: F) -> Result<T, ParseError>
    where
        F: FnOnce(&mut Self) -> Result<T, ParseError>,
    {
        if self.depth >= self.config.max_depth() {
            return Err(ParseError::form_error("records nested too deeply"));
        }
        self.depth += 1;
        let res = op(self);
        self.depth -= 1;
        res
    }
}

//--- Default

impl Default for DecodeContext<'static, NoSchema> {
    fn default() -> Self {
        Self::new()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::logging::init_logging;

    #[test]
    fn flag_words_round_up() {
        assert_eq!(flag_words(&[]), 0);
        assert_eq!(flag_words(&["a"]), 1);
        assert_eq!(flag_words(&["a"; 32]), 1);
        assert_eq!(flag_words(&["a"; 33]), 2);
    }

    #[test]
    fn tags() {
        assert!(tags_ascending(&[]));
        assert!(tags_ascending(&[1, 2, 7]));
        assert!(!tags_ascending(&[0, 1]));
        assert!(!tags_ascending(&[2, 1]));
        assert!(!tags_ascending(&[3, 3]));
    }

    #[test]
    fn field_flags() {
        let mut flags = FieldFlags::<2>::new();
        assert!(flags.is_empty());
        flags.set(0);
        flags.set(33);
        assert!(flags.get(0));
        assert!(!flags.get(1));
        assert!(flags.get(33));
        assert!(!flags.get(64));
        assert_eq!(format!("{:?}", flags), "[0, 33]");
        flags.clear(0);
        flags.clear(33);
        assert!(flags.is_empty());
    }

    #[test]
    fn vec_field_prealloc_is_capped() {
        // A count of 0x0FFFFFFF with nothing following must not reserve
        // memory for the count.
        let mut buf = ByteBuffer::from_slice(&[0xFF, 0xFF, 0xFF, 0x7F]);
        let mut ctx = DecodeContext::new();
        let mut dec = StructDecoder::new(&mut buf);
        assert_eq!(
            <Vec<u32> as FieldValue>::decode_in_struct(&mut dec, 0, &mut ctx),
            Err(ParseError::ShortInput)
        );
    }

    #[test]
    fn depth_limit() {
        init_logging();
        let mut config = Config::new();
        config.set_max_depth(2);
        let mut ctx = DecodeContext::new().with_config(config);
        let res = ctx.nested(|ctx| ctx.nested(|ctx| ctx.nested(|_| Ok(()))));
        assert!(matches!(res, Err(ParseError::Form(_))));
        assert_eq!(ctx.depth, 0);
        assert_eq!(ctx.nested(|ctx| ctx.nested(|_| Ok(()))), Ok(()));
    }
}
