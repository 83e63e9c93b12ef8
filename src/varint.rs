//! Variable-length integers.
//!
//! Unsigned integers are encoded little-endian in groups of seven bits. Each
//! group occupies one octet, the top bit of which is set if another group
//! follows. Signed integers are first mapped onto unsigned integers via
//! zig-zag encoding so that values of small magnitude stay short regardless
//! of their sign: `0` becomes `0`, `-1` becomes `1`, `1` becomes `2`, and so
//! on.
//!
//! The functions in this module are pure. They are the basis for the
//! integer methods of [`ByteBuffer`][crate::buffer::ByteBuffer].
//!
//! # Length limits
//!
//! A 32 bit value is never encoded in more than [`MAX_VAR_UINT_LEN`]
//! octets. The decoder stops after that many groups even if the
//! continuation bit of the last one is still set, silently dropping any
//! further bits. This keeps decoding of hostile input bounded and matches
//! what existing encoders produce.
//!
//! 64 bit values use up to eight seven-bit groups. If a ninth octet is
//! reached, all eight of its bits are data and no continuation bit is
//! checked, giving a maximum of [`MAX_VAR_UINT64_LEN`] octets.

use crate::wire::ParseError;
use core::fmt;

/// The maximum number of octets of an encoded 32 bit integer.
pub const MAX_VAR_UINT_LEN: usize = 5;

/// The maximum number of octets of an encoded 64 bit integer.
pub const MAX_VAR_UINT64_LEN: usize = 9;

//------------ Encoded -------------------------------------------------------

/// The wire representation of a single variable-length integer.
///
/// The value is kept on the stack so that it can be appended to a buffer
/// in one go.
#[derive(Clone, Copy)]
pub struct Encoded {
    buf: [u8; MAX_VAR_UINT64_LEN],
    len: u8,
}

impl Encoded {
    const fn empty() -> Self {
        Encoded { buf: [0; MAX_VAR_UINT64_LEN], len: 0 }
    }

    fn push(&mut self, octet: u8) {
        self.buf[usize::from(self.len)] = octet;
        self.len += 1;
    }

    /// Returns the encoded octets.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..usize::from(self.len)]
    }

    /// Returns the number of encoded octets.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }
}

//--- AsRef

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

//--- Debug

impl fmt::Debug for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Encoded").field(&self.as_slice()).finish()
    }
}

//------------ Zig-zag -------------------------------------------------------

/// Maps a signed 32 bit integer onto an unsigned one.
pub const fn zigzag_encode(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Reverses [`zigzag_encode`].
pub const fn zigzag_decode(value: u32) -> i32 {
    if value & 1 != 0 {
        (!(value >> 1)) as i32
    } else {
        (value >> 1) as i32
    }
}

/// Maps a signed 64 bit integer onto an unsigned one.
pub const fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Reverses [`zigzag_encode64`].
pub const fn zigzag_decode64(value: u64) -> i64 {
    if value & 1 != 0 {
        (!(value >> 1)) as i64
    } else {
        (value >> 1) as i64
    }
}

//------------ Encoding ------------------------------------------------------

/// Encodes an unsigned 32 bit integer.
///
/// Zero is encoded as a single zero octet.
pub fn encode_var_uint(mut value: u32) -> Encoded {
    let mut res = Encoded::empty();
    loop {
        let octet = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            res.push(octet);
            return res;
        }
        res.push(octet | 0x80);
    }
}

/// Encodes a signed 32 bit integer using zig-zag encoding.
pub fn encode_var_int(value: i32) -> Encoded {
    encode_var_uint(zigzag_encode(value))
}

/// Encodes an unsigned 64 bit integer.
pub fn encode_var_uint64(mut value: u64) -> Encoded {
    let mut res = Encoded::empty();
    let mut groups = 0;
    while value > 0x7F && groups < 8 {
        res.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
        groups += 1;
    }
    res.push(value as u8);
    res
}

/// Encodes a signed 64 bit integer using zig-zag encoding.
pub fn encode_var_int64(value: i64) -> Encoded {
    encode_var_uint64(zigzag_encode64(value))
}

//------------ Decoding ------------------------------------------------------

/// Decodes an unsigned 32 bit integer from the start of `octets`.
///
/// Returns the value and the number of octets it occupied. Fails with
/// [`ParseError::ShortInput`] if `octets` ends while a continuation bit is
/// set. At most [`MAX_VAR_UINT_LEN`] octets are consumed.
pub fn decode_var_uint(octets: &[u8]) -> Result<(u32, usize), ParseError> {
    let mut value = 0u32;
    let mut shift = 0u32;
    let mut pos = 0;
    loop {
        let octet = *octets.get(pos).ok_or(ParseError::ShortInput)?;
        pos += 1;
        value |= u32::from(octet & 0x7F) << shift;
        shift += 7;
        if octet & 0x80 == 0 || pos == MAX_VAR_UINT_LEN {
            return Ok((value, pos));
        }
    }
}

/// Decodes a zig-zag encoded signed 32 bit integer.
pub fn decode_var_int(octets: &[u8]) -> Result<(i32, usize), ParseError> {
    decode_var_uint(octets).map(|(value, len)| (zigzag_decode(value), len))
}

/// Decodes an unsigned 64 bit integer from the start of `octets`.
pub fn decode_var_uint64(octets: &[u8]) -> Result<(u64, usize), ParseError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut pos = 0;
    loop {
        let octet = *octets.get(pos).ok_or(ParseError::ShortInput)?;
        pos += 1;
        if octet & 0x80 == 0 || shift >= 56 {
            value |= u64::from(octet) << shift;
            return Ok((value, pos));
        }
        value |= u64::from(octet & 0x7F) << shift;
        shift += 7;
    }
}

/// Decodes a zig-zag encoded signed 64 bit integer.
pub fn decode_var_int64(octets: &[u8]) -> Result<(i64, usize), ParseError> {
    decode_var_uint64(octets)
        .map(|(value, len)| (zigzag_decode64(value), len))
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, &[0x00])]
    #[case(1, &[0x01])]
    #[case(0x7F, &[0x7F])]
    #[case(0x80, &[0x80, 0x01])]
    #[case(0x81, &[0x81, 0x01])]
    #[case(0x100, &[0x80, 0x02])]
    #[case(0x3FFF, &[0xFF, 0x7F])]
    #[case(0x4000, &[0x80, 0x80, 0x01])]
    #[case(0x7FFF, &[0xFF, 0xFF, 0x01])]
    #[case(0x7FFF_FFFF, &[0xFF, 0xFF, 0xFF, 0xFF, 0x07])]
    #[case(0x8000_0000, &[0x80, 0x80, 0x80, 0x80, 0x08])]
    #[case(u32::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F])]
    fn var_uint(#[case] value: u32, #[case] wire: &[u8]) {
        assert_eq!(encode_var_uint(value).as_slice(), wire);
        assert_eq!(decode_var_uint(wire), Ok((value, wire.len())));
    }

    #[rstest]
    #[case(0, &[0x00])]
    #[case(-1, &[0x01])]
    #[case(1, &[0x02])]
    #[case(-2, &[0x03])]
    #[case(-0x40, &[0x7F])]
    #[case(0x40, &[0x80, 0x01])]
    #[case(-0x4000_0000, &[0xFF, 0xFF, 0xFF, 0xFF, 0x07])]
    #[case(0x4000_0000, &[0x80, 0x80, 0x80, 0x80, 0x08])]
    #[case(i32::MAX, &[0xFE, 0xFF, 0xFF, 0xFF, 0x0F])]
    #[case(i32::MIN, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F])]
    fn var_int(#[case] value: i32, #[case] wire: &[u8]) {
        assert_eq!(encode_var_int(value).as_slice(), wire);
        assert_eq!(decode_var_int(wire), Ok((value, wire.len())));
    }

    #[test]
    fn truncated_input() {
        assert_eq!(decode_var_uint(&[]), Err(ParseError::ShortInput));
        assert_eq!(decode_var_uint(&[0x80]), Err(ParseError::ShortInput));
        assert_eq!(
            decode_var_uint(&[0xFF, 0xFF, 0xFF]),
            Err(ParseError::ShortInput)
        );
        assert_eq!(
            decode_var_uint64(&[0x80; 4]),
            Err(ParseError::ShortInput)
        );
    }

    #[test]
    fn overlong_input_stops_after_five_groups() {
        // The continuation bit of the fifth octet is ignored and the
        // sixth octet is left alone.
        let wire = [0x81, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(decode_var_uint(&wire), Ok((1, 5)));

        // Bits beyond 32 are dropped.
        let wire = [0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(decode_var_uint(&wire), Ok((u32::MAX, 5)));
    }

    #[test]
    fn trailing_octets_are_not_consumed() {
        assert_eq!(decode_var_uint(&[0x05, 0xAA, 0xBB]), Ok((5, 1)));
    }

    #[rstest]
    #[case(0)]
    #[case(0x7F)]
    #[case(0x80)]
    #[case(1 << 56)]
    #[case((1 << 56) - 1)]
    #[case(u64::MAX)]
    #[case(u64::MAX >> 1)]
    fn var_uint64(#[case] value: u64) {
        let encoded = encode_var_uint64(value);
        assert!(encoded.len() <= MAX_VAR_UINT64_LEN);
        assert_eq!(
            decode_var_uint64(encoded.as_slice()),
            Ok((value, encoded.len()))
        );
    }

    #[test]
    fn var_uint64_ninth_octet_is_all_data() {
        let encoded = encode_var_uint64(u64::MAX);
        assert_eq!(
            encoded.as_slice(),
            &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(1)]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    #[case(-0x4000_0000_0000)]
    fn var_int64(#[case] value: i64) {
        let encoded = encode_var_int64(value);
        assert_eq!(
            decode_var_int64(encoded.as_slice()),
            Ok((value, encoded.len()))
        );
    }

    #[test]
    fn zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i32::MIN), u32::MAX);
        for value in [0, 1, -1, 63, -64, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
        for value in [0, 1, -1, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode64(zigzag_encode64(value)), value);
        }
    }
}
