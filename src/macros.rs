//! Macros for defining records and enums.
//!
//! These macros produce the code a schema compiler would otherwise
//! generate: a Rust type with presence-tracking accessors and an
//! implementation of [`Record`][crate::record::Record] driving the field
//! protocol in the right order.

/// Defines a struct record.
///
/// All fields of a struct are required. Each field is given as its name,
/// the name of its setter, and its type. The fields are encoded in the
/// order they are declared in.
///
/// The macro creates a type with a getter per field which returns `None`
/// while the field is unset, and a setter which marks the field as set.
/// Encoding fails with a [`MissingField`][crate::wire::MissingField]
/// error if any field is unset.
///
/// ```
/// use tagwire::define_struct;
/// use tagwire::record::Record;
///
/// define_struct! {
///     /// A point in the plane.
///     pub struct Point {
///         x, set_x: f32;
///         y, set_y: f32;
///     }
/// }
///
/// let mut point = Point::default();
/// point.set_x(1.0);
/// assert!(point.to_vec().is_err());
/// point.set_y(2.0);
/// let data = point.to_vec().unwrap();
/// assert_eq!(Point::from_slice(&data).unwrap(), point);
/// ```
#[macro_export]
macro_rules! define_struct {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_attr:meta])*
                $field:ident, $setter:ident: $type:ty;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Debug, Default, PartialEq)]
        $vis struct $name {
            $( $field: $type, )*
            field_flags: $crate::record::FieldFlags<{
                $crate::record::flag_words(&[ $( stringify!($field) ),* ])
            }>,
        }

        $crate::__record_accessors!(
            $name; 0usize;
            $( $(#[$field_attr])* $field, $setter: $type; )*
        );

        impl $crate::record::Record for $name {
            const NAME: &'static str = stringify!($name);

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn encode<Target: $crate::buffer::Composer>(
                &self,
                buf: &mut $crate::buffer::ByteBuffer<Target>,
            ) -> Result<(), $crate::wire::ComposeError> {
                let mut index = 0usize;
                $(
                    if !self.field_flags.get(index) {
                        return Err($crate::wire::MissingField::new(
                            stringify!($name), stringify!($field)
                        ).into())
                    }
                    index += 1;
                )*
                buf.compose_all(|buf| {
                    let mut enc = $crate::protocol::StructEncoder::new(buf);
                    let mut field = 0u32;
                    $(
                        $crate::record::FieldValue::encode_in_struct(
                            &self.$field, &mut enc, field
                        )?;
                        field += 1;
                    )*
                    Ok(())
                })
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn decode<
                Octs: AsRef<[u8]>, S: $crate::schema::SkipField
            >(
                &mut self,
                buf: &mut $crate::buffer::ByteBuffer<Octs>,
                ctx: &mut $crate::record::DecodeContext<'_, S>,
            ) -> Result<(), $crate::wire::ParseError> {
                let mut dec = $crate::protocol::StructDecoder::new(buf);
                let mut field = 0u32;
                $(
                    let value = <
                        $type as $crate::record::FieldValue
                    >::decode_in_struct(&mut dec, field, ctx)?;
                    self.$setter(value);
                    field += 1;
                )*
                Ok(())
            }
        }

        $crate::impl_record_field!($name);
    }
}

/// Defines a message record.
///
/// All fields of a message are optional. Each field is given as its tag,
/// its name, the name of its setter, and its type. Tags must be non-zero
/// and declared in ascending order.
///
/// Only fields that have been set are encoded. When decoding, fields with
/// unknown tags are skipped using the schema of the decode context if it
/// has a definition with the name of the type.
///
/// ```
/// use tagwire::define_message;
/// use tagwire::record::Record;
///
/// define_message! {
///     pub struct Person {
///         1 => name, set_name: String;
///         2 => age, set_age: u32;
///     }
/// }
///
/// let mut person = Person::default();
/// person.set_age(42);
/// assert_eq!(person.to_vec().unwrap(), [2, 42, 0]);
/// let person = Person::from_slice(&[2, 42, 0]).unwrap();
/// assert_eq!(person.name(), None);
/// assert_eq!(person.age(), Some(&42));
/// ```
#[macro_export]
macro_rules! define_message {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_attr:meta])*
                $tag:literal => $field:ident, $setter:ident: $type:ty;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Debug, Default, PartialEq)]
        $vis struct $name {
            $( $field: $type, )*
            field_flags: $crate::record::FieldFlags<{
                $crate::record::flag_words(&[ $( stringify!($field) ),* ])
            }>,
        }

        const _: () = assert!(
            $crate::record::tags_ascending(&[ $( $tag ),* ]),
            concat!(
                "tags of ", stringify!($name),
                " must be non-zero and ascending"
            )
        );

        $crate::__record_accessors!(
            $name; 0usize;
            $( $(#[$field_attr])* $field, $setter: $type; )*
        );

        impl $crate::record::Record for $name {
            const NAME: &'static str = stringify!($name);

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn encode<Target: $crate::buffer::Composer>(
                &self,
                buf: &mut $crate::buffer::ByteBuffer<Target>,
            ) -> Result<(), $crate::wire::ComposeError> {
                buf.compose_all(|buf| {
                    let mut enc = $crate::protocol::MessageEncoder::new(buf);
                    let mut index = 0usize;
                    $(
                        if self.field_flags.get(index) {
                            $crate::record::FieldValue::encode_in_message(
                                &self.$field, &mut enc, $tag
                            )?;
                        }
                        index += 1;
                    )*
                    enc.finish()
                })
            }

            fn decode<
                Octs: AsRef<[u8]>, S: $crate::schema::SkipField
            >(
                &mut self,
                buf: &mut $crate::buffer::ByteBuffer<Octs>,
                ctx: &mut $crate::record::DecodeContext<'_, S>,
            ) -> Result<(), $crate::wire::ParseError> {
                let definition = ctx.definition(
                    <Self as $crate::record::Record>::NAME
                );
                let mut dec = $crate::protocol::MessageDecoder::new(buf);
                loop {
                    match dec.read_tag()? {
                        0 => return Ok(()),
                        $(
                            $tag => {
                                let value = <
                                    $type as $crate::record::FieldValue
                                >::decode_in_message(&mut dec, ctx)?;
                                self.$setter(value);
                            }
                        )*
                        tag => dec.skip_unknown(ctx, definition, tag)?,
                    }
                }
            }
        }

        $crate::impl_record_field!($name);
    }
}

/// Generates the getters and setters of a record’s fields.
#[doc(hidden)]
#[macro_export]
macro_rules! __record_accessors {
    ( $name:ident; $bit:expr; ) => { };
    (
        $name:ident; $bit:expr;
        $(#[$attr:meta])* $field:ident, $setter:ident: $type:ty;
        $( $rest:tt )*
    ) => {
        impl $name {
            $(#[$attr])*
            #[allow(dead_code)]
            pub fn $field(&self) -> Option<&$type> {
                if self.field_flags.get($bit) {
                    Some(&self.$field)
                } else {
                    None
                }
            }

            #[doc = concat!("Sets the `", stringify!($field), "` field.")]
            #[allow(dead_code)]
            pub fn $setter(&mut self, value: $type) {
                self.$field = value;
                self.field_flags.set($bit);
            }
        }

        $crate::__record_accessors!($name; $bit + 1; $( $rest )*);
    };
}

/// Makes a record type usable as a field value and array element.
///
/// This is done by [`define_struct!`] and [`define_message!`]
/// automatically. Records implementing
/// [`Record`][crate::record::Record] by hand need to invoke the macro
/// themselves in order to be nested in other records.
#[macro_export]
macro_rules! impl_record_field {
    ( $name:ty ) => {
        impl $crate::record::Element for $name {
            fn compose_element<Target: $crate::buffer::Composer>(
                &self,
                buf: &mut $crate::buffer::ByteBuffer<Target>,
            ) -> Result<(), $crate::wire::ComposeError> {
                $crate::record::Record::encode(self, buf)
            }

            fn parse_element<
                Octs: AsRef<[u8]>, S: $crate::schema::SkipField
            >(
                buf: &mut $crate::buffer::ByteBuffer<Octs>,
                ctx: &mut $crate::record::DecodeContext<'_, S>,
            ) -> Result<Self, $crate::wire::ParseError> {
                $crate::record::parse_record(buf, ctx)
            }
        }

        impl $crate::record::FieldValue for $name {
            fn encode_in_struct<Target: $crate::buffer::Composer>(
                &self,
                enc: &mut $crate::protocol::StructEncoder<'_, Target>,
                field: u32,
            ) -> Result<(), $crate::wire::ComposeError> {
                enc.write_field_nested(field, self)
            }

            fn decode_in_struct<
                Octs: AsRef<[u8]>, S: $crate::schema::SkipField
            >(
                dec: &mut $crate::protocol::StructDecoder<'_, Octs>,
                field: u32,
                ctx: &mut $crate::record::DecodeContext<'_, S>,
            ) -> Result<Self, $crate::wire::ParseError> {
                dec.read_field_nested(field, ctx)
            }

            fn encode_in_message<Target: $crate::buffer::Composer>(
                &self,
                enc: &mut $crate::protocol::MessageEncoder<'_, Target>,
                tag: u32,
            ) -> Result<(), $crate::wire::ComposeError> {
                enc.write_field_nested(tag, self)
            }

            fn decode_in_message<
                Octs: AsRef<[u8]>, S: $crate::schema::SkipField
            >(
                dec: &mut $crate::protocol::MessageDecoder<'_, Octs>,
                ctx: &mut $crate::record::DecodeContext<'_, S>,
            ) -> Result<Self, $crate::wire::ParseError> {
                dec.read_field_nested(ctx)
            }
        }
    }
}

/// Defines an enum type for use in records.
///
/// Enums are encoded as the variable-length integer of their value. Since
/// data may have been produced with a newer schema, a decoded value isn’t
/// checked against the known variants. The macro therefore creates a
/// newtype around `u32` with an associated constant per variant rather
/// than a Rust enum.
///
/// ```
/// use tagwire::wire_enum;
///
/// wire_enum! {
///     pub enum Color {
///         RED = 0,
///         GREEN = 1,
///     }
/// }
///
/// assert_eq!(Color::GREEN.to_name(), Some("GREEN"));
/// assert_eq!(Color::from_int(7).to_name(), None);
/// assert_eq!(format!("{:?}", Color::from_int(7)), "Color(7)");
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$attr:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
        $vis struct $name(u32);

        #[allow(dead_code)]
        impl $name {
            $(
                $(#[$variant_attr])*
                pub const $variant: $name = $name($value);
            )*

            /// Returns a value from its raw integer value.
            #[must_use]
            pub const fn from_int(value: u32) -> Self {
                Self(value)
            }

            /// Returns the raw integer value for a value.
            #[must_use]
            pub const fn to_int(self) -> u32 {
                self.0
            }

            /// Returns the name of the variant if the value is known.
            pub const fn to_name(self) -> Option<&'static str> {
                match self {
                    $(
                        $name::$variant => Some(stringify!($variant)),
                    )*
                    _ => None
                }
            }
        }

        //--- From

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name::from_int(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.to_int()
            }
        }

        //--- Parse and Compose

        impl $crate::wire::Parse for $name {
            fn parse<Octs: AsRef<[u8]>>(
                buf: &mut $crate::buffer::ByteBuffer<Octs>,
            ) -> Result<Self, $crate::wire::ParseError> {
                buf.read_var_uint().map(Self::from_int)
            }
        }

        impl $crate::wire::Compose for $name {
            fn compose<Target: $crate::buffer::Composer>(
                &self,
                buf: &mut $crate::buffer::ByteBuffer<Target>,
            ) -> Result<(), $crate::wire::ComposeError> {
                buf.write_var_uint(self.to_int())
            }
        }

        $crate::__value_field!($name);

        //--- Debug

        impl core::fmt::Debug for $name {
            fn fmt(
                &self, f: &mut core::fmt::Formatter
            ) -> core::fmt::Result {
                match self.to_name() {
                    Some(name) => {
                        write!(f, concat!(stringify!($name), "::{}"), name)
                    }
                    None => {
                        f.debug_tuple(stringify!($name))
                            .field(&self.0)
                            .finish()
                    }
                }
            }
        }
    }
}
