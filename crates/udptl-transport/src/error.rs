//! Datagram-level error taxonomy.
//!
//! Every decode failure drops the whole datagram — there is no partial
//! application. The session layer converts these into an empty result plus
//! a drop counter; nothing here crosses the encode/decode boundary as a
//! panic.

use thiserror::Error;

/// A malformed or unacceptable UDPTL datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A length or open-type field would read past the end of the buffer.
    #[error("datagram truncated at offset {0}")]
    Truncated(usize),

    /// A payload exceeds the fixed history-slot ceiling.
    #[error("payload of {len} bytes exceeds the {limit}-byte ceiling")]
    Oversized { len: usize, limit: usize },

    /// The reserved FEC field must be exactly 1.
    #[error("reserved FEC octet must be 1, got {0}")]
    BadReserved(u8),

    /// A declared count exceeds what the 16-slot history can reference.
    #[error("{kind} count {got} exceeds the maximum of {max}")]
    TooManyEntries {
        kind: &'static str,
        got: usize,
        max: usize,
    },
}
