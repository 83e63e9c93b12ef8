//! A compact binary serialization format.
//!
//! This crate implements the runtime of a schema-driven binary encoding.
//! Data is organized in *records* of two kinds:
//!
//! * *structs* have a fixed set of fields which are all required. They are
//!   encoded as the concatenation of their fields in declaration order
//!   without any framing, and
//! * *messages* have optional fields identified by a numeric tag. Only
//!   fields that are present are encoded, each preceded by its tag, and
//!   the record is terminated by a tag of zero. This allows adding fields
//!   to a message without breaking older readers.
//!
//! Field values are booleans, bytes, 32 and 64 bit integers stored as
//! variable-length integers, 32 bit floats, strings, enums, nested
//! records, and arrays of all of these.
//!
//! # Modules
//!
//! * [varint] contains the variable-length integer codec,
//! * [buffer] provides [`ByteBuffer`], an octets sequence with a read
//!   cursor which all encoding and decoding happens on,
//! * [wire] connects primitive types to the buffer via the [`Parse`] and
//!   [`Compose`] traits and defines the error types,
//! * [protocol] contains the sessions that enforce the correct order of
//!   fields when writing or reading a record,
//! * [record] defines the [`Record`] trait and everything records need,
//! * [schema] provides skipping of unknown message fields,
//! * [value] decodes and encodes data through a schema alone,
//! * [pool] has the allocator for boxed nested records, and
//! * [config] collects the tunables.
//!
//! Records are normally defined through the [`define_struct!`] and
//! [`define_message!`] macros, enums through [`wire_enum!`].
//!
//! # Example
//!
//! ```
//! use tagwire::{define_message, define_struct, Record};
//!
//! define_struct! {
//!     pub struct Point {
//!         x, set_x: i32;
//!         y, set_y: i32;
//!     }
//! }
//!
//! define_message! {
//!     pub struct Shape {
//!         1 => name, set_name: String;
//!         2 => points, set_points: Vec<Point>;
//!     }
//! }
//!
//! let mut point = Point::default();
//! point.set_x(1);
//! point.set_y(-1);
//! let mut shape = Shape::default();
//! shape.set_points(vec![point]);
//!
//! let data = shape.to_vec().unwrap();
//! assert_eq!(data, [2, 1, 2, 1, 0]);
//!
//! let decoded = Shape::from_slice(&data).unwrap();
//! assert_eq!(decoded.name(), None);
//! assert_eq!(decoded.points().unwrap()[0].y(), Some(&-1));
//! ```
//!
//! # Reference of Feature Flags
//!
//! * `bytes`: Enables using `BytesMut` from the
//!   [bytes](https://github.com/tokio-rs/bytes) crate as the octets of a
//!   writable buffer.
//! * `smallvec`: Enables using `SmallVec` from the
//!   [smallvec](https://github.com/servo/rust-smallvec) crate as the octets
//!   of a writable buffer.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use self::buffer::ByteBuffer;
pub use self::record::Record;
pub use self::wire::{Compose, ComposeError, Parse, ParseError};

pub mod buffer;
pub mod config;
pub mod pool;
pub mod protocol;
pub mod record;
pub mod schema;
pub mod value;
pub mod varint;
pub mod wire;

mod macros;

#[cfg(test)]
mod logging;
