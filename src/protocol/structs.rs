//! Sessions for struct records.

use super::{violation, ArrayState, Poison};
use crate::buffer::{ByteBuffer, Composer};
use crate::record::{
    parse_record, parse_record_into, DecodeContext, Element, Record,
};
use crate::schema::SkipField;
use crate::wire::{Compose, ComposeError, Parse, ParseError};

//------------ StructEncoder -------------------------------------------------

/// A session writing the fields of a struct.
///
/// Fields are identified by their zero-based declaration index and have
/// to be written strictly in that order. An array field is written by
/// starting it with [`begin_array`][Self::begin_array], then writing
/// exactly the announced number of elements, and ending it with
/// [`end_array`][Self::end_array].
pub struct StructEncoder<'a, Target> {
    buf: &'a mut ByteBuffer<Target>,
    next_field: u32,
    array: ArrayState,
    poison: Poison<ComposeError>,
}

impl<'a, Target: Composer> StructEncoder<'a, Target> {
    /// Starts writing a struct at the end of `buf`.
    pub fn new(buf: &'a mut ByteBuffer<Target>) -> Self {
        StructEncoder {
            buf,
            next_field: 0,
            array: ArrayState::default(),
            poison: Poison::new(),
        }
    }

    /// Returns the index of the next field to be written.
    pub fn next_field(&self) -> u32 {
        self.next_field
    }

    fn run<F>(&mut self, op: F) -> Result<(), ComposeError>
    where
        F: FnOnce(&mut Self) -> Result<(), ComposeError>,
    {
        self.poison.check()?;
        let res = op(self);
        self.poison.record(res)
    }

    fn expect_field(&self, field: u32) -> Result<(), ComposeError> {
        if self.array.open {
            return Err(violation("struct field written inside an array"));
        }
        if field != self.next_field {
            return Err(violation("struct field written out of order"));
        }
        Ok(())
    }

    fn expect_array(&self, field: u32) -> Result<(), ComposeError> {
        if field != self.next_field {
            return Err(violation("array element for the wrong field"));
        }
        Ok(())
    }

    /// Writes a field holding a single primitive value.
    pub fn write_field<T: Compose + ?Sized>(
        &mut self,
        field: u32,
        value: &T,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(field)?;
            value.compose(this.buf)?;
            this.next_field += 1;
            Ok(())
        })
    }

    /// Writes a field holding a nested record.
    pub fn write_field_nested<R: Record>(
        &mut self,
        field: u32,
        value: &R,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(field)?;
            value.encode(this.buf)?;
            this.next_field += 1;
            Ok(())
        })
    }

    /// Starts an array field of `count` elements.
    pub fn begin_array(
        &mut self,
        field: u32,
        count: usize,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(field)?;
            let count =
                u32::try_from(count).map_err(|_| ComposeError::LongData)?;
            this.buf.write_var_uint(count)?;
            this.array.start(count);
            Ok(())
        })
    }

    /// Writes the next element of the open array field.
    pub fn array_element<T: Element + ?Sized>(
        &mut self,
        field: u32,
        value: &T,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_array(field)?;
            this.array.next_element()?;
            value.compose_element(this.buf)
        })
    }

    /// Ends the open array field.
    pub fn end_array(&mut self, field: u32) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_array(field)?;
            this.array.close()?;
            this.next_field += 1;
            Ok(())
        })
    }
}

//------------ StructDecoder -------------------------------------------------

/// A session reading the fields of a struct.
///
/// This mirrors [`StructEncoder`]: fields are read in declaration order
/// and arrays are read by [`begin_array`][Self::begin_array], one
/// [`array_element`][Self::array_element] per announced element, and
/// [`end_array`][Self::end_array].
pub struct StructDecoder<'a, Octs> {
    buf: &'a mut ByteBuffer<Octs>,
    next_field: u32,
    array: ArrayState,
    poison: Poison<ParseError>,
}

impl<'a, Octs: AsRef<[u8]>> StructDecoder<'a, Octs> {
    /// Starts reading a struct at the read position of `buf`.
    pub fn new(buf: &'a mut ByteBuffer<Octs>) -> Self {
        StructDecoder {
            buf,
            next_field: 0,
            array: ArrayState::default(),
            poison: Poison::new(),
        }
    }

    /// Returns the index of the next field to be read.
    pub fn next_field(&self) -> u32 {
        self.next_field
    }

    /// Returns the number of octets left in the underlying buffer.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn run<T, F>(&mut self, op: F) -> Result<T, ParseError>
    where
        F: FnOnce(&mut Self) -> Result<T, ParseError>,
    {
        self.poison.check()?;
        let res = op(self);
        self.poison.record(res)
    }

    fn expect_field(&self, field: u32) -> Result<(), ParseError> {
        if self.array.open {
            return Err(violation("struct field read inside an array"));
        }
        if field != self.next_field {
            return Err(violation("struct field read out of order"));
        }
        Ok(())
    }

    fn expect_array(&self, field: u32) -> Result<(), ParseError> {
        if field != self.next_field {
            return Err(violation("array element for the wrong field"));
        }
        Ok(())
    }

    /// Reads a field holding a single primitive value.
    pub fn read_field<T: Parse>(
        &mut self,
        field: u32,
    ) -> Result<T, ParseError> {
        self.run(|this| {
            this.expect_field(field)?;
            let res = T::parse(this.buf)?;
            this.next_field += 1;
            Ok(res)
        })
    }

    /// Reads a field holding a nested record.
    pub fn read_field_nested<R: Record, S: SkipField>(
        &mut self,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<R, ParseError> {
        self.run(|this| {
            this.expect_field(field)?;
            let res = parse_record(this.buf, ctx)?;
            this.next_field += 1;
            Ok(res)
        })
    }

    /// Reads a field holding a nested record into an existing value.
    pub fn read_field_nested_into<R: Record, S: SkipField>(
        &mut self,
        field: u32,
        target: &mut R,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<(), ParseError> {
        self.run(|this| {
            this.expect_field(field)?;
            parse_record_into(this.buf, target, ctx)?;
            this.next_field += 1;
            Ok(())
        })
    }

    /// Starts an array field and returns its element count.
    pub fn begin_array(&mut self, field: u32) -> Result<u32, ParseError> {
        self.run(|this| {
            this.expect_field(field)?;
            let count = this.buf.read_var_uint()?;
            this.array.start(count);
            Ok(count)
        })
    }

    /// Reads the next element of the open array field.
    pub fn array_element<T: Element, S: SkipField>(
        &mut self,
        field: u32,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<T, ParseError> {
        self.run(|this| {
            this.expect_array(field)?;
            this.array.next_element()?;
            T::parse_element(this.buf, ctx)
        })
    }

    /// Ends the open array field.
    pub fn end_array(&mut self, field: u32) -> Result<(), ParseError> {
        self.run(|this| {
            this.expect_array(field)?;
            this.array.close()?;
            this.next_field += 1;
            Ok(())
        })
    }
}

//============ Testing =======================================================
