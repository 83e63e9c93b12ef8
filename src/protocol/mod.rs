//! The field protocol.
//!
//! Records are never written to or read from a buffer directly. Instead, a
//! session value borrows the buffer and keeps track of where in the record
//! it is. There are four such session types, one for each direction of the
//! two record disciplines:
//!
//! * [`StructEncoder`] and [`StructDecoder`] handle *structs.* All fields
//!   of a struct are required and appear in declaration order without any
//!   framing. The sessions enforce this order by counting fields.
//! * [`MessageEncoder`] and [`MessageDecoder`] handle *messages.* Each
//!   field that is present is preceded by its tag and the record ends with
//!   a tag of zero. Fields with tags a decoder doesn’t know can be skipped
//!   with the help of a schema.
//!
//! Nested records lend the buffer to a new session of their own. Since the
//! child borrows the parent’s buffer mutably, both see the same cursor and
//! the parent continues right after the child’s last octet.
//!
//! # Protocol violations
//!
//! Driving a session in an order its discipline doesn’t allow, such as
//! skipping a struct field or writing a message field while an array is
//! still open, is a bug in the calling code. In debug builds this panics.
//! In release builds the operation fails with a
//! [`ProtocolViolation`][crate::wire::ProtocolViolation] error instead.
//!
//! Any failed operation poisons its session. All further operations then
//! return the error that caused the first failure.

pub use self::message::{MessageDecoder, MessageEncoder};
pub use self::structs::{StructDecoder, StructEncoder};

use crate::wire::ProtocolViolation;
use tracing::debug;

mod message;
mod structs;

//------------ Poison --------------------------------------------------------

/// The first error a session encountered.
#[derive(Clone, Copy, Debug)]
struct Poison<E> {
    failure: Option<E>,
}

impl<E: Copy> Poison<E> {
    fn new() -> Self {
        Poison { failure: None }
    }

    /// Returns the original error if the session already failed.
    fn check(&self) -> Result<(), E> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Remembers the error of a failed operation.
    fn record<T>(&mut self, res: Result<T, E>) -> Result<T, E> {
        if let Err(err) = res.as_ref() {
            if self.failure.is_none() {
                self.failure = Some(*err)
            }
        }
        res
    }

    fn is_poisoned(&self) -> bool {
        self.failure.is_some()
    }
}

//------------ ArrayState ----------------------------------------------------

/// The elements still expected for the currently open array.
#[derive(Clone, Copy, Debug, Default)]
struct ArrayState {
    /// Whether an array has been started and not yet ended.
    open: bool,

    /// The number of elements still to come.
    remaining: u32,
}

impl ArrayState {
    fn start(&mut self, count: u32) {
        self.open = true;
        self.remaining = count;
    }

    /// Accounts for the next element.
    fn next_element(&mut self) -> Result<(), ProtocolViolation> {
        if !self.open {
            return Err(violation("array element outside of an array"));
        }
        if self.remaining == 0 {
            return Err(violation("more array elements than announced"));
        }
        self.remaining -= 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProtocolViolation> {
        if !self.open {
            return Err(violation("array ended without being started"));
        }
        if self.remaining != 0 {
            return Err(violation("array ended before its last element"));
        }
        self.open = false;
        Ok(())
    }
}

//------------ violation -----------------------------------------------------

/// Reports a misuse of the field protocol.
///
/// Panics in debug builds.
fn violation<E: From<ProtocolViolation>>(msg: &'static str) -> E {
    debug!(msg, "field protocol violation");
    debug_assert!(false, "field protocol violation: {}", msg);
    ProtocolViolation::new(msg).into()
}

//============ Testing =======================================================
