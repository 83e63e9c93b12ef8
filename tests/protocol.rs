//! Records implemented by hand on top of the field protocol.

use tagwire::buffer::{ByteBuffer, Composer};
use tagwire::protocol::{
    MessageDecoder, MessageEncoder, StructDecoder, StructEncoder,
};
use tagwire::record::DecodeContext;
use tagwire::schema::SkipField;
use tagwire::{ComposeError, ParseError, Record};

//------------ Palette -------------------------------------------------------

/// A struct record with an array field.
#[derive(Clone, Debug, Default, PartialEq)]
struct Palette {
    name: String,
    colors: Vec<u32>,
}

impl Record for Palette {
    const NAME: &'static str = "Palette";

    fn encode<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.compose_all(|buf| {
            let mut enc = StructEncoder::new(buf);
            enc.write_field(0, self.name.as_str())?;
            enc.begin_array(1, self.colors.len())?;
            for color in &self.colors {
                enc.array_element(1, color)?;
            }
            enc.end_array(1)
        })
    }

    fn decode<Octs: AsRef<[u8]>, S: SkipField>(
        &mut self,
        buf: &mut ByteBuffer<Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<(), ParseError> {
        let mut dec = StructDecoder::new(buf);
        self.name = dec.read_field(0)?;
        let count = dec.begin_array(1)?;
        self.colors.clear();
        for _ in 0..count {
            self.colors.push(dec.array_element(1, ctx)?);
        }
        dec.end_array(1)
    }
}

tagwire::impl_record_field!(Palette);

//------------ Theme ---------------------------------------------------------

/// A message record nesting the struct.
#[derive(Clone, Debug, Default, PartialEq)]
struct Theme {
    title: Option<String>,
    palettes: Vec<Palette>,
}

impl Record for Theme {
    const NAME: &'static str = "Theme";

    fn encode<Target: Composer>(
        &self,
        buf: &mut ByteBuffer<Target>,
    ) -> Result<(), ComposeError> {
        buf.compose_all(|buf| {
            let mut enc = MessageEncoder::new(buf);
            if let Some(title) = self.title.as_ref() {
                enc.write_field(1, title)?;
            }
            if !self.palettes.is_empty() {
                enc.write_array_begin(2, self.palettes.len())?;
                for palette in &self.palettes {
                    enc.write_array_element(palette)?;
                }
            }
            enc.finish()
        })
    }

    fn decode<Octs: AsRef<[u8]>, S: SkipField>(
        &mut self,
        buf: &mut ByteBuffer<Octs>,
        ctx: &mut DecodeContext<'_, S>,
    ) -> Result<(), ParseError> {
        let definition = ctx.definition(Self::NAME);
        let mut dec = MessageDecoder::new(buf);
        loop {
            match dec.read_tag()? {
                0 => return Ok(()),
                1 => self.title = Some(dec.read_field()?),
                2 => {
                    let count = dec.read_array_begin()?;
                    for _ in 0..count {
                        self.palettes.push(dec.read_array_element(ctx)?);
                    }
                }
                tag => dec.skip_unknown(ctx, definition, tag)?,
            }
        }
    }
}

//------------ Tests ---------------------------------------------------------

fn theme() -> Theme {
    Theme {
        title: Some("dark".into()),
        palettes: vec![
            Palette { name: "a".into(), colors: vec![1, 2, 3] },
            Palette { name: "b".into(), colors: Vec::new() },
        ],
    }
}

#[test]
fn hand_written_records() {
    let data = theme().to_vec().unwrap();
    assert_eq!(
        data,
        [
            1, 4, b'd', b'a', b'r', b'k', // title
            2, 2, // two palettes
            1, b'a', 3, 1, 2, 3, // a
            1, b'b', 0, // b
            0,
        ]
    );
    assert_eq!(Theme::from_slice(&data).unwrap(), theme());
}

#[test]
fn array_count_three() {
    let palette =
        Palette::from_slice(&[0, 3, 0x80, 0x01, 0xFF, 0x01, 0x7F]).unwrap();
    assert_eq!(palette.colors, [0x80, 0xFF, 0x7F]);
}

#[test]
fn nested_sessions_share_the_cursor() {
    let mut buf = ByteBuffer::new();
    theme().encode(&mut buf).unwrap();
    buf.write_byte(0x55).unwrap();

    let mut ctx = DecodeContext::new();
    let mut theme = Theme::default();
    theme.decode(&mut buf, &mut ctx).unwrap();
    assert_eq!(buf.read_byte(), Ok(0x55));
    assert_eq!(buf.remaining(), 0);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "more array elements than announced")]
fn too_many_array_elements_panics() {
    let mut buf = ByteBuffer::new();
    let mut enc = MessageEncoder::new(&mut buf);
    enc.write_array_begin(2, 1).unwrap();
    enc.write_array_element(&1u32).unwrap();
    let _ = enc.write_array_element(&2u32);
}

#[test]
#[cfg(not(debug_assertions))]
fn too_many_array_elements_fails() {
    let mut buf = ByteBuffer::new();
    {
        let mut enc = MessageEncoder::new(&mut buf);
        enc.write_array_begin(2, 1).unwrap();
        enc.write_array_element(&1u32).unwrap();
        assert!(matches!(
            enc.write_array_element(&2u32),
            Err(ComposeError::Protocol(_))
        ));
    }
    // The session was poisoned but still terminated exactly once.
    assert_eq!(buf.as_slice(), &[2, 1, 1, 0]);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "struct field read out of order")]
fn field_out_of_order_panics() {
    let mut buf = ByteBuffer::from_slice(&[1, 2]);
    let mut dec = StructDecoder::new(&mut buf);
    let _ = dec.read_field::<u8>(1);
}

#[test]
#[cfg(not(debug_assertions))]
fn field_out_of_order_fails() {
    let mut buf = ByteBuffer::from_slice(&[1, 2]);
    let mut dec = StructDecoder::new(&mut buf);
    assert!(matches!(
        dec.read_field::<u8>(1),
        Err(ParseError::Protocol(_))
    ));
    assert!(matches!(
        dec.read_field::<u8>(0),
        Err(ParseError::Protocol(_))
    ));
}
