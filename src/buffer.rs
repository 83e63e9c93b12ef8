//! The byte buffer all encoding and decoding happens on.
//!
//! A [`ByteBuffer`] wraps an octets value and adds a read cursor to it. It
//! provides bounds-checked reads of all primitive wire types and, if the
//! octets value can grow, appending writes.
//!
//! Whether a buffer can be written to is decided by its octets type. An
//! owning buffer such as `ByteBuffer<Vec<u8>>` accepts writes and grows as
//! needed. A view such as `ByteBuffer<&[u8]>` only reads from memory owned
//! by someone else: since a shared slice isn’t a [`Composer`], the write
//! methods simply don’t exist for it and a view can never be resized.
//!
//! All reads leave the cursor where it was if they fail, so that a caller
//! ignoring an error never sees a half-consumed value. Likewise, all writes
//! either append their complete encoding or leave the length of the buffer
//! unchanged.

use crate::config::Config;
use crate::varint;
use crate::wire::{ComposeError, ParseError};
use core::ops::Range;
use core::{cmp, fmt, str};
use octseq::builder::{OctetsBuilder, ShortBuf, Truncate};
use octseq::parse::Parser;
use tracing::trace;

//------------ Composer ------------------------------------------------------

/// An octets builder a byte buffer can write into.
///
/// The trait adds a growth policy to an octets builder. Before each append,
/// [`reserve_for`][Self::reserve_for] is asked to make room. Types that can
/// grow should do so by doubling relative to the required size, types with
/// a fixed capacity keep the default which does nothing and let the append
/// fail instead.
pub trait Composer: OctetsBuilder + AsRef<[u8]> + Truncate {
    /// Makes room for appending `additional` octets.
    fn reserve_for(&mut self, additional: usize) {
        let _ = additional;
    }
}

impl Composer for Vec<u8> {
    fn reserve_for(&mut self, additional: usize) {
        let required = self.len().saturating_add(additional);
        if required > self.capacity() {
            let capacity = required.saturating_mul(2);
            trace!(from = self.capacity(), to = capacity, "growing buffer");
            self.reserve_exact(capacity - self.len());
        }
    }
}

impl<const N: usize> Composer for octseq::array::Array<N> {}

#[cfg(feature = "bytes")]
#[cfg_attr(docsrs, doc(cfg(feature = "bytes")))]
impl Composer for bytes::BytesMut {
    fn reserve_for(&mut self, additional: usize) {
        let required = self.len().saturating_add(additional);
        if required > self.capacity() {
            let capacity = required.saturating_mul(2);
            trace!(from = self.capacity(), to = capacity, "growing buffer");
            self.reserve(capacity - self.len());
        }
    }
}

#[cfg(feature = "smallvec")]
#[cfg_attr(docsrs, doc(cfg(feature = "smallvec")))]
impl<A: smallvec::Array<Item = u8>> Composer for smallvec::SmallVec<A> {}

//------------ ByteBuffer ----------------------------------------------------

/// An octets sequence with a read cursor.
///
/// The buffer’s *size* is the length of the underlying octets, i.e., the
/// number of octets written or available for reading. The *index* is the
/// position of the next read. It is always true that
/// `index <= size <= capacity`.
#[derive(Clone)]
pub struct ByteBuffer<Octs> {
    /// The underlying octets.
    octets: Octs,

    /// The read position.
    index: usize,
}

impl<Octs> ByteBuffer<Octs> {
    /// Creates a buffer from an octets value.
    ///
    /// The read cursor starts at the beginning of the octets.
    pub fn from_octets(octets: Octs) -> Self {
        ByteBuffer { octets, index: 0 }
    }

    /// Returns a reference to the underlying octets.
    pub fn as_octets(&self) -> &Octs {
        &self.octets
    }

    /// Converts the buffer into the underlying octets.
    pub fn into_octets(self) -> Octs {
        self.octets
    }

    /// Returns the current read position.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl ByteBuffer<Vec<u8>> {
    /// Creates a new, empty owning buffer.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a new, empty owning buffer using the given config.
    pub fn with_config(config: &Config) -> Self {
        Self::from_octets(Vec::with_capacity(config.initial_capacity()))
    }

    /// Returns the number of octets the buffer can hold without growing.
    pub fn capacity(&self) -> usize {
        self.octets.capacity()
    }
}

impl<'a> ByteBuffer<&'a [u8]> {
    /// Creates a read-only view over the given octets.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::from_octets(data)
    }
}

impl<Octs: AsRef<[u8]>> ByteBuffer<Octs> {
    /// Returns the complete content of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        self.octets.as_ref()
    }

    /// Returns the number of octets in the buffer.
    pub fn size(&self) -> usize {
        self.octets.as_ref().len()
    }

    /// Returns the number of octets left to read.
    pub fn remaining(&self) -> usize {
        self.size() - self.index
    }

    /// Moves the read position to `index`.
    ///
    /// Returns `false` and leaves the position alone if `index` is beyond
    /// the end of the buffer.
    pub fn seek_to(&mut self, index: usize) -> bool {
        if index > self.size() {
            return false;
        }
        self.index = index;
        true
    }

    /// Runs a parser over the buffer, committing its position on success.
    fn parse_with<T, F>(&mut self, op: F) -> Result<T, ParseError>
    where
        F: FnOnce(&mut Parser<[u8]>) -> Result<T, ParseError>,
    {
        let mut parser = Parser::from_ref(self.octets.as_ref());
        parser.seek(self.index)?;
        let res = op(&mut parser)?;
        self.index = parser.pos();
        Ok(res)
    }

    /// Reads a single octet.
    pub fn read_byte(&mut self) -> Result<u8, ParseError> {
        self.parse_with(|parser| parser.parse_u8().map_err(Into::into))
    }

    /// Reads a boolean stored as a single octet.
    ///
    /// Any non-zero value is taken to be `true`.
    pub fn read_bool(&mut self) -> Result<bool, ParseError> {
        self.read_byte().map(|value| value != 0)
    }

    /// Reads a 32 bit float stored as four octets in native byte order.
    pub fn read_float(&mut self) -> Result<f32, ParseError> {
        self.parse_with(|parser| {
            let mut buf = [0u8; 4];
            parser.parse_buf(&mut buf)?;
            Ok(f32::from_ne_bytes(buf))
        })
    }

    /// Reads a variable-length unsigned 32 bit integer.
    pub fn read_var_uint(&mut self) -> Result<u32, ParseError> {
        let (value, len) =
            varint::decode_var_uint(&self.octets.as_ref()[self.index..])?;
        self.index += len;
        Ok(value)
    }

    /// Reads a zig-zag encoded signed 32 bit integer.
    pub fn read_var_int(&mut self) -> Result<i32, ParseError> {
        self.read_var_uint().map(varint::zigzag_decode)
    }

    /// Reads a variable-length unsigned 64 bit integer.
    pub fn read_var_uint64(&mut self) -> Result<u64, ParseError> {
        let (value, len) =
            varint::decode_var_uint64(&self.octets.as_ref()[self.index..])?;
        self.index += len;
        Ok(value)
    }

    /// Reads a zig-zag encoded signed 64 bit integer.
    pub fn read_var_int64(&mut self) -> Result<i64, ParseError> {
        self.read_var_uint64().map(varint::zigzag_decode64)
    }

    /// Reads `len` raw octets.
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], ParseError> {
        let data = self.octets.as_ref();
        let start = self.index;
        let end = match start.checked_add(len) {
            Some(end) if end <= data.len() => end,
            _ => return Err(ParseError::ShortInput),
        };
        self.index = end;
        Ok(&data[start..end])
    }

    /// Reads a length-prefixed string, borrowing it from the buffer.
    pub fn read_str(&mut self) -> Result<&str, ParseError> {
        let start = self.index;
        let range = self.string_range()?;
        let data = self.octets.as_ref();
        match str::from_utf8(&data[range]) {
            Ok(res) => Ok(res),
            Err(_) => {
                self.index = start;
                Err(ParseError::form_error("invalid UTF-8 in string"))
            }
        }
    }

    /// Reads a length-prefixed string.
    pub fn read_string(&mut self) -> Result<String, ParseError> {
        self.read_str().map(Into::into)
    }

    /// Reads the length of a string and advances past its content.
    fn string_range(&mut self) -> Result<Range<usize>, ParseError> {
        let start = self.index;
        let len = self.read_var_uint()?;
        let body = self.index;
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| body.checked_add(len));
        match end {
            Some(end) if end <= self.size() => {
                self.index = end;
                Ok(body..end)
            }
            _ => {
                self.index = start;
                Err(ParseError::form_error("string length exceeds buffer"))
            }
        }
    }
}

impl<Octs: Composer> ByteBuffer<Octs> {
    /// Appends `data`, growing the octets if necessary.
    fn append(&mut self, data: &[u8]) -> Result<(), ComposeError> {
        self.octets.reserve_for(data.len());
        self.octets.append_slice(data).map_err(|err| {
            let err: ShortBuf = err.into();
            ComposeError::from(err)
        })
    }

    /// Runs `op`, restoring the size of the buffer if it fails.
    ///
    /// This makes a sequence of writes all-or-nothing. A read position
    /// inside the removed octets is moved back to the new end.
    pub fn compose_all<F>(&mut self, op: F) -> Result<(), ComposeError>
    where
        F: FnOnce(&mut Self) -> Result<(), ComposeError>,
    {
        let len = self.size();
        let res = op(self);
        if res.is_err() {
            self.octets.truncate(len);
            self.index = cmp::min(self.index, len);
        }
        res
    }

    /// Appends a single octet.
    pub fn write_byte(&mut self, value: u8) -> Result<(), ComposeError> {
        self.append(&[value])
    }

    /// Appends a boolean as a single octet.
    pub fn write_bool(&mut self, value: bool) -> Result<(), ComposeError> {
        self.write_byte(u8::from(value))
    }

    /// Appends a 32 bit float as four octets in native byte order.
    pub fn write_float(&mut self, value: f32) -> Result<(), ComposeError> {
        self.append(&value.to_ne_bytes())
    }

    /// Appends a variable-length unsigned 32 bit integer.
    pub fn write_var_uint(&mut self, value: u32) -> Result<(), ComposeError> {
        self.append(varint::encode_var_uint(value).as_slice())
    }

    /// Appends a zig-zag encoded signed 32 bit integer.
    pub fn write_var_int(&mut self, value: i32) -> Result<(), ComposeError> {
        self.append(varint::encode_var_int(value).as_slice())
    }

    /// Appends a variable-length unsigned 64 bit integer.
    pub fn write_var_uint64(
        &mut self,
        value: u64,
    ) -> Result<(), ComposeError> {
        self.append(varint::encode_var_uint64(value).as_slice())
    }

    /// Appends a zig-zag encoded signed 64 bit integer.
    pub fn write_var_int64(
        &mut self,
        value: i64,
    ) -> Result<(), ComposeError> {
        self.append(varint::encode_var_int64(value).as_slice())
    }

    /// Appends raw octets.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), ComposeError> {
        self.append(data)
    }

    /// Appends a string prefixed with its length in octets.
    pub fn write_string(&mut self, value: &str) -> Result<(), ComposeError> {
        let len =
            u32::try_from(value.len()).map_err(|_| ComposeError::LongData)?;
        self.compose_all(|buf| {
            buf.write_var_uint(len)?;
            buf.append(value.as_bytes())
        })
    }
}

//--- Default

impl Default for ByteBuffer<Vec<u8>> {
    fn default() -> Self {
        Self::new()
    }
}

//--- Debug

impl<Octs: AsRef<[u8]>> fmt::Debug for ByteBuffer<Octs> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("octets", &self.as_slice())
            .field("index", &self.index)
            .finish()
    }
}

//============ Testing =======================================================
