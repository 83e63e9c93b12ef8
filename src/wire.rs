//! Creating and consuming primitive values in wire format.
//!
//! The [`Parse`] and [`Compose`] traits connect native values to the
//! primitive read and write operations of a
//! [`ByteBuffer`][crate::buffer::ByteBuffer]. They are implemented for all
//! primitive types of the wire format:
//!
//! | Rust type | Wire encoding                                    |
//! |-----------|--------------------------------------------------|
//! | `bool`    | one octet, any non-zero value reads as `true`    |
//! | `u8`      | one octet                                        |
//! | `i32`     | zig-zag variable-length integer                  |
//! | `u32`     | variable-length integer                          |
//! | `i64`     | zig-zag variable-length 64 bit integer           |
//! | `u64`     | variable-length 64 bit integer                   |
//! | `f32`     | four octets, IEEE 754, native byte order         |
//! | `String`  | variable-length byte count followed by UTF-8     |
//!
//! The module also defines the error types used throughout the crate.

use crate::buffer::{ByteBuffer, Composer};
use core::fmt;
use octseq::builder::ShortBuf;
use octseq::parse::ShortInput;

//------------ Parse ---------------------------------------------------------

/// A type that can extract a value of itself from a byte buffer.
///
/// If parsing fails, the read position of the buffer is left where it was
/// before the call.
pub trait Parse: Sized {
    /// Extracts a value from the current read position of `buf`.
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError>;
}

impl Parse for bool {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_bool()
    }
}

impl Parse for u8 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_byte()
    }
}

impl Parse for i32 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_var_int()
    }
}

impl Parse for u32 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_var_uint()
    }
}

impl Parse for i64 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_var_int64()
    }
}

impl Parse for u64 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_var_uint64()
    }
}

impl Parse for f32 {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_float()
    }
}

impl Parse for String {
    fn parse<Octs: AsRef<[u8]>>(
        buf: &mut ByteBuffer<Octs>,
    ) -> Result<Self, ParseError> {
        buf.read_string()
    }
}

//------------ Compose -------------------------------------------------------

/// A type that can append its wire representation to a byte buffer.
///
/// Composing is transactional: if it fails, the buffer has the same
/// length as before the call.
pub trait Compose {
    /// Appends the wire representation of `self` to `buf`.
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError>;
}

impl<'a, T: Compose + ?Sized> Compose for &'a T {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        (*self).compose(buf)
    }
}

impl Compose for bool {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_bool(*self)
    }
}

impl Compose for u8 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_byte(*self)
    }
}

impl Compose for i32 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_var_int(*self)
    }
}

impl Compose for u32 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_var_uint(*self)
    }
}

impl Compose for i64 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_var_int64(*self)
    }
}

impl Compose for u64 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_var_uint64(*self)
    }
}

impl Compose for f32 {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_float(*self)
    }
}

impl Compose for str {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_string(self)
    }
}

impl Compose for String {
    fn compose<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.write_string(self)
    }
}

//============ Error Types ===================================================

//------------ ComposeError --------------------------------------------------

/// An error happened while composing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComposeError {
    /// The target buffer ran out of space.
    ShortBuf,

    /// A length does not fit into the 32 bit count of the wire format.
    LongData,

    /// A struct was encoded while one of its fields was unset.
    MissingField(MissingField),

    /// The data to be encoded doesn’t fit its description.
    Form(FormError),

    /// The field protocol was used incorrectly.
    Protocol(ProtocolViolation),
}

impl ComposeError {
    /// Creates a new compose error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        FormError::new(msg).into()
    }
}

//--- From

impl From<ShortBuf> for ComposeError {
    fn from(_: ShortBuf) -> Self {
        ComposeError::ShortBuf
    }
}

impl From<MissingField> for ComposeError {
    fn from(err: MissingField) -> Self {
        ComposeError::MissingField(err)
    }
}

impl From<FormError> for ComposeError {
    fn from(err: FormError) -> Self {
        ComposeError::Form(err)
    }
}

impl From<ProtocolViolation> for ComposeError {
    fn from(err: ProtocolViolation) -> Self {
        ComposeError::Protocol(err)
    }
}

//--- Display and Error

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ComposeError::ShortBuf => f.write_str("buffer size exceeded"),
            ComposeError::LongData => f.write_str("data too long"),
            ComposeError::MissingField(ref err) => err.fmt(f),
            ComposeError::Form(ref err) => err.fmt(f),
            ComposeError::Protocol(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ComposeError {}

//------------ ParseError ----------------------------------------------------

/// An error happened while parsing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the buffer.
    ShortInput,

    /// A formatting error occurred.
    Form(FormError),

    /// A message contained a tag that could neither be decoded nor
    /// skipped.
    UnknownField(u32),

    /// The field protocol was used incorrectly.
    Protocol(ProtocolViolation),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        FormError::new(msg).into()
    }
}

//--- From

impl From<ShortInput> for ParseError {
    fn from(_: ShortInput) -> Self {
        ParseError::ShortInput
    }
}

impl From<FormError> for ParseError {
    fn from(err: FormError) -> Self {
        ParseError::Form(err)
    }
}

impl From<ProtocolViolation> for ParseError {
    fn from(err: ProtocolViolation) -> Self {
        ParseError::Protocol(err)
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::Form(ref err) => err.fmt(f),
            ParseError::UnknownField(tag) => {
                write!(f, "unknown field with tag {}", tag)
            }
            ParseError::Protocol(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ParseError {}

//------------ FormError -----------------------------------------------------

/// A formatting error occured.
///
/// This is a generic error for all kinds of error cases that result in data
/// not being accepted. For diagnostics, the error is being given a static
/// string describing the error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormError(&'static str);

impl FormError {
    /// Creates a new form error value with the given diagnostics string.
    pub fn new(msg: &'static str) -> Self {
        FormError(msg)
    }
}

//--- Display and Error

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FormError {}

//------------ MissingField --------------------------------------------------

/// A required struct field was not set before encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MissingField {
    record: &'static str,
    field: &'static str,
}

impl MissingField {
    /// Creates a new value for the given record type and field names.
    pub fn new(record: &'static str, field: &'static str) -> Self {
        MissingField { record, field }
    }

    /// Returns the name of the record type.
    pub fn record(&self) -> &'static str {
        self.record
    }

    /// Returns the name of the unset field.
    pub fn field(&self) -> &'static str {
        self.field
    }
}

//--- Display and Error

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "missing field {}.{}", self.record, self.field)
    }
}

impl std::error::Error for MissingField {}

//------------ ProtocolViolation ---------------------------------------------

/// The field protocol was driven in an order it does not allow.
///
/// This always indicates a bug in the code calling the protocol, never a
/// problem with the data being encoded or decoded. Debug builds panic
/// instead of returning this error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProtocolViolation(&'static str);

impl ProtocolViolation {
    /// Creates a new value with the given diagnostics string.
    pub fn new(msg: &'static str) -> Self {
        ProtocolViolation(msg)
    }
}

//--- Display and Error

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "protocol violation: {}", self.0)
    }
}

impl std::error::Error for ProtocolViolation {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            ParseError::ShortInput.to_string(),
            "unexpected end of input"
        );
        assert_eq!(
            ParseError::UnknownField(7).to_string(),
            "unknown field with tag 7"
        );
        assert_eq!(
            ParseError::form_error("bad length").to_string(),
            "bad length"
        );
        assert_eq!(
            ComposeError::from(MissingField::new("Point", "y")).to_string(),
            "missing field Point.y"
        );
        assert_eq!(
            ComposeError::form_error("bad value").to_string(),
            "bad value"
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(ComposeError::from(ShortBuf), ComposeError::ShortBuf);
        assert_eq!(
            ParseError::from(ProtocolViolation::new("x")),
            ParseError::Protocol(ProtocolViolation::new("x"))
        );
    }
}
