//! Sessions for message records.

use super::{violation, ArrayState, Poison};
use crate::buffer::{ByteBuffer, Composer};
use crate::record::{
    parse_record, parse_record_into, DecodeContext, Element, Record,
};
use crate::schema::SkipField;
use crate::wire::{Compose, ComposeError, Parse, ParseError};
use tracing::{debug, trace};

//------------ MessageEncoder ------------------------------------------------

/// A session writing the fields of a message.
///
/// Each field is written together with its tag. Array fields are started
/// with [`write_array_begin`][Self::write_array_begin] and followed by
/// exactly the announced number of elements. They have no end marker.
///
/// The message is completed by [`finish`][Self::finish] which writes the
/// terminating zero tag. If the encoder is dropped without being finished,
/// the terminating tag is written on drop instead. Either way, it is
/// written exactly once.
pub struct MessageEncoder<'a, Target: Composer> {
    buf: &'a mut ByteBuffer<Target>,
    array: ArrayState,
    finished: bool,
    poison: Poison<ComposeError>,
}

impl<'a, Target: Composer> MessageEncoder<'a, Target> {
    /// Starts writing a message at the end of `buf`.
    pub fn new(buf: &'a mut ByteBuffer<Target>) -> Self {
        MessageEncoder {
            buf,
            array: ArrayState::default(),
            finished: false,
            poison: Poison::new(),
        }
    }

    fn run<F>(&mut self, op: F) -> Result<(), ComposeError>
    where
        F: FnOnce(&mut Self) -> Result<(), ComposeError>,
    {
        self.poison.check()?;
        let res = op(self);
        self.poison.record(res)
    }

    /// Checks that a new field with the given tag may start.
    fn expect_field(&mut self, tag: u32) -> Result<(), ComposeError> {
        if tag == 0 {
            return Err(violation("message field with tag zero"));
        }
        if self.array.open {
            if self.array.remaining != 0 {
                return Err(violation("message field inside an array"));
            }
            self.array.close()?;
        }
        Ok(())
    }

    /// Writes a field holding a single primitive value.
    pub fn write_field<T: Compose + ?Sized>(
        &mut self,
        tag: u32,
        value: &T,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(tag)?;
            this.buf.compose_all(|buf| {
                buf.write_var_uint(tag)?;
                value.compose(buf)
            })
        })
    }

    /// Writes a field holding a nested record.
    pub fn write_field_nested<R: Record>(
        &mut self,
        tag: u32,
        value: &R,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(tag)?;
            this.buf.compose_all(|buf| {
                buf.write_var_uint(tag)?;
                value.encode(buf)
            })
        })
    }

    /// Starts an array field of `count` elements.
    pub fn write_array_begin(
        &mut self,
        tag: u32,
        count: usize,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.expect_field(tag)?;
            let count =
                u32::try_from(count).map_err(|_| ComposeError::LongData)?;
            this.buf.compose_all(|buf| {
                buf.write_var_uint(tag)?;
                buf.write_var_uint(count)
            })?;
            this.array.start(count);
            Ok(())
        })
    }

    /// Writes the next element of the current array field.
    pub fn write_array_element<T: Element + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), ComposeError> {
        self.run(|this| {
            this.array.next_element()?;
            value.compose_element(this.buf)
        })
    }

    /// Completes the message by writing the terminating tag.
    ///
    /// If the session failed earlier, returns that failure. The
    /// terminating tag is still written when the encoder is dropped.
    pub fn finish(mut self) -> Result<(), ComposeError> {
        self.run(|this| {
            if this.array.open && this.array.remaining != 0 {
                return Err(violation("message finished inside an array"));
            }
            this.finished = true;
            this.buf.write_var_uint(0)
        })
    }
}

//--- Drop

impl<'a, Target: Composer> Drop for MessageEncoder<'a, Target> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            if self.poison.is_poisoned() {
                trace!("terminating failed message");
            }
            let _ = self.buf.write_var_uint(0);
        }
    }
}

//------------ MessageDecoder ------------------------------------------------

/// A session reading the fields of a message.
///
/// Decoding is a loop around [`read_tag`][Self::read_tag]. A tag of zero
/// ends the message. Any other tag has to be followed by exactly one of
/// the field reading methods: [`read_field`][Self::read_field],
/// [`read_field_nested`][Self::read_field_nested],
/// [`read_array_begin`][Self::read_array_begin] plus one
/// [`read_array_element`][Self::read_array_element] per element, or, for
/// tags the caller doesn’t know, [`skip_unknown`][Self::skip_unknown].
pub struct MessageDecoder<'a, Octs> {
    buf: &'a mut ByteBuffer<Octs>,
    array: ArrayState,

    /// A tag has been read but its value hasn’t.
    pending: bool,

    /// The terminating tag has been read.
    ended: bool,

    poison: Poison<ParseError>,
}

impl<'a, Octs: AsRef<[u8]>> MessageDecoder<'a, Octs> {
    /// Starts reading a message at the read position of `buf`.
    pub fn new(buf: &'a mut ByteBuffer<Octs>) -> Self {
        MessageDecoder {
            buf,
            array: ArrayState::default(),
            pending: false,
            ended: false,
            poison: Poison::new(),
        }
    }

    /// Returns whether the terminating tag has been read.
    pub fn is_ended(&self) -> bool {
        self.ended
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

    fn take_pending(&mut self) -> Result<(), ParseError> {
        if !self.pending {
            return Err(violation("message field read without a tag"));
        }
        self.pending = false;
        Ok(())
    }

    /// Reads the next tag.
    ///
    /// Returns zero when the end of the message has been reached.
    pub fn read_tag(&mut self) -> Result<u32, ParseError> {
        self.run(|this| {
            if this.ended {
                return Err(violation("tag read after end of message"));
            }
            if this.pending {
                return Err(violation("tag read before field value"));
            }
            if this.array.open {
                if this.array.remaining != 0 {
                    return Err(violation("tag read inside an array"));
                }
                this.array.close()?;
            }
            let tag = this.buf.read_var_uint()?;
            if tag == 0 {
                this.ended = true;
            } else {
                this.pending = true;
            }
            Ok(tag)
        })
    }

    /// Reads the value of a field holding a single primitive value.
    pub fn read_field<T: Parse>(&mut self) -> Result<T, ParseError> {
        self.run(|this| {
            this.take_pending()?;
            T::parse(this.buf)
        })
    }

    /// Reads the value of a field holding a nested record.
    pub fn read_field_nested<R: Record, S: SkipField>(
        &mut self,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<R, ParseError> {
        self.run(|this| {
            this.take_pending()?;
            parse_record(this.buf, ctx)
        })
    }

    /// Reads the value of a nested record field into an existing value.
    pub fn read_field_nested_into<R: Record, S: SkipField>(
        &mut self,
        target: &mut R,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<(), ParseError> {
        self.run(|this| {
            this.take_pending()?;
            parse_record_into(this.buf, target, ctx)
        })
    }

    /// Starts reading an array field and returns its element count.
    pub fn read_array_begin(&mut self) -> Result<u32, ParseError> {
        self.run(|this| {
            this.take_pending()?;
            let count = this.buf.read_var_uint()?;
            this.array.start(count);
            Ok(count)
        })
    }

    /// Reads the next element of the current array field.
    pub fn read_array_element<T: Element, S: SkipField>(
        &mut self,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<T, ParseError> {
        self.run(|this| {
            this.array.next_element()?;
            T::parse_element(this.buf, ctx)
        })
    }

    /// Skips the value of a field with an unknown tag.
    ///
    /// The value is skipped using the schema of `ctx` and the definition
    /// of the message being decoded. If there is no such definition or the
    /// schema can’t skip the field, decoding fails with
    /// [`ParseError::UnknownField`].
    pub fn skip_unknown<S: SkipField>(
        &mut self,
        ctx: &DecodeContext<'_, S>,
        definition: Option<u32>,
        tag: u32,
    ) -> Result<(), ParseError> {
        self.run(|this| {
            this.take_pending()?;
            let skipped = match definition {
                Some(definition) => {
                    ctx.schema().skip_field(this.buf, definition, tag)
                }
                None => false,
            };
            if skipped {
                trace!(tag, "skipped unknown field");
                Ok(())
            } else {
                debug!(tag, "rejecting unknown field");
                Err(ParseError::UnknownField(tag))
            }
        })
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::logging::init_logging;

    #[test]
    fn tagged_fields() {
        let mut buf = ByteBuffer::new();
        let mut enc = MessageEncoder::new(&mut buf);
        enc.write_field(2, "abc").unwrap();
        enc.write_array_begin(3, 2).unwrap();
        enc.write_array_element(&1u32).unwrap();
        enc.write_array_element(&300u32).unwrap();
        enc.write_field(5, &true).unwrap();
        enc.finish().unwrap();
        assert_eq!(
            buf.as_slice(),
            &[2, 3, b'a', b'b', b'c', 3, 2, 1, 0xAC, 0x02, 5, 1, 0]
        );

        let mut ctx = DecodeContext::new();
        let mut dec = MessageDecoder::new(&mut buf);
        assert_eq!(dec.read_tag(), Ok(2));
        assert_eq!(dec.read_field::<String>().as_deref(), Ok("abc"));
        assert_eq!(dec.read_tag(), Ok(3));
        assert_eq!(dec.read_array_begin(), Ok(2));
        assert_eq!(dec.read_array_element::<u32, _>(&mut ctx), Ok(1));
        assert_eq!(dec.read_array_element::<u32, _>(&mut ctx), Ok(300));
        assert_eq!(dec.read_tag(), Ok(5));
        assert_eq!(dec.read_field::<bool>(), Ok(true));
        assert_eq!(dec.read_tag(), Ok(0));
        assert!(dec.is_ended());
    }

    #[test]
    fn drop_terminates_once() {
        let mut buf = ByteBuffer::new();
        {
            let mut enc = MessageEncoder::new(&mut buf);
            enc.write_field(1, &7u8).unwrap();
        }
        assert_eq!(buf.as_slice(), &[1, 7, 0]);

        let mut buf = ByteBuffer::new();
        MessageEncoder::new(&mut buf).finish().unwrap();
        assert_eq!(buf.as_slice(), &[0]);
    }

    #[test]
    fn drop_terminates_after_failure() {
        let mut buf =
            ByteBuffer::from_octets(octseq::array::Array::<3>::new());
        {
            let mut enc = MessageEncoder::new(&mut buf);
            enc.write_field(1, &7u8).unwrap();
            assert_eq!(
                enc.write_field(2, "abc"),
                Err(ComposeError::ShortBuf)
            );
            assert_eq!(enc.write_field(3, &1u8), Err(ComposeError::ShortBuf));
        }
        assert_eq!(buf.as_slice(), &[1, 7, 0]);
    }

    #[test]
    fn unknown_without_schema() {
        init_logging();
        let mut buf = ByteBuffer::from_slice(&[9, 1, 0]);
        let ctx = DecodeContext::new();
        let mut dec = MessageDecoder::new(&mut buf);
        assert_eq!(dec.read_tag(), Ok(9));
        assert_eq!(
            dec.skip_unknown(&ctx, None, 9),
            Err(ParseError::UnknownField(9))
        );
        assert_eq!(dec.read_tag(), Err(ParseError::UnknownField(9)));
    }

    #[test]
    fn empty_message() {
        let mut buf = ByteBuffer::from_slice(&[0]);
        let mut dec = MessageDecoder::new(&mut buf);
        assert_eq!(dec.read_tag(), Ok(0));
        assert!(dec.is_ended());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "message field inside an array")]
    fn field_inside_array_panics() {
        let mut buf = ByteBuffer::new();
        let mut enc = MessageEncoder::new(&mut buf);
        enc.write_array_begin(1, 2).unwrap();
        enc.write_array_element(&1u8).unwrap();
        let _ = enc.write_field(2, &1u8);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn field_inside_array_fails() {
        let mut buf = ByteBuffer::new();
        {
            let mut enc = MessageEncoder::new(&mut buf);
            enc.write_array_begin(1, 2).unwrap();
            enc.write_array_element(&1u8).unwrap();
            assert!(matches!(
                enc.write_field(2, &1u8),
                Err(ComposeError::Protocol(_))
            ));
            assert!(matches!(enc.finish(), Err(ComposeError::Protocol(_))));
        }
        assert_eq!(buf.as_slice(), &[1, 2, 1, 0]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "message field with tag zero")]
    fn tag_zero_panics() {
        let mut buf = ByteBuffer::new();
        let mut enc = MessageEncoder::new(&mut buf);
        let _ = enc.write_field(0, &1u8);
    }
}
