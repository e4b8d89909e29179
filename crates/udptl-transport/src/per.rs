//! # PER Variable-Length Fields
//!
//! The UDPTL wire format (T.38 Annex B) length-prefixes every variable
//! field with an X.691-style length determinant:
//!
//! ```text
//! value < 0x80     → 1 byte:  0vvvvvvv
//! value < 0x4000   → 2 bytes: 10vvvvvv vvvvvvvv
//! value ≥ 0x4000   → 1 byte:  11mmmmmm   (fragment: declares m × 16384
//!                              octets, a further length field follows)
//! ```
//!
//! An *open type* is a payload carried as one or more such
//! length-prefixed fragments. Two wire rules are load-bearing and easy
//! to get wrong:
//!
//! - an empty payload is encoded as a length-1 field containing a single
//!   zero octet, never as a true zero-length field (X.691 §10.1);
//! - a fragment always requires a trailing length field, so a payload
//!   that is an exact multiple of 16384 octets ends with an explicit
//!   zero length.
//!
//! Pure functions, no state. Any decode failure here condemns the whole
//! datagram.

use bytes::{BufMut, BytesMut};

use crate::error::ParseError;

/// Octets declared by one fragment multiplier unit.
pub const FRAGMENT_QUANTUM: usize = 1 << 14;

/// Largest multiplier a fragment octet can carry on this wire.
const MAX_FRAGMENT_MULTIPLIER: usize = 4;

/// Append one length determinant for `value`.
///
/// Returns the octet count the emitted field *declares*: `value` itself
/// for the one- and two-byte forms, or the fragment quantum
/// (`multiplier * 16384`) for the fragment form. Callers encoding an
/// open type loop until the declared count is no longer a fragment.
pub fn encode_length(buf: &mut BytesMut, value: usize) -> usize {
    if value < 0x80 {
        buf.put_u8(value as u8);
        return value;
    }
    if value < 0x4000 {
        buf.put_u16(0x8000 | value as u16);
        return value;
    }
    let multiplier = (value >> 14).min(MAX_FRAGMENT_MULTIPLIER);
    buf.put_u8(0xC0 | multiplier as u8);
    multiplier << 14
}

/// Decode one length determinant at `cursor`, advancing it.
///
/// Returns `(declared_octets, more_fragments)`. When `more_fragments`
/// is true the declared octets are one fragment of a larger open type
/// and another length field follows them.
pub fn decode_length(buf: &[u8], cursor: &mut usize) -> Result<(usize, bool), ParseError> {
    let first = *buf.get(*cursor).ok_or(ParseError::Truncated(*cursor))?;
    if first & 0x80 == 0 {
        *cursor += 1;
        return Ok((first as usize, false));
    }
    if first & 0x40 == 0 {
        let second = *buf
            .get(*cursor + 1)
            .ok_or(ParseError::Truncated(*cursor + 1))?;
        *cursor += 2;
        return Ok((((first & 0x3F) as usize) << 8 | second as usize, false));
    }
    *cursor += 1;
    Ok((((first & 0x3F) as usize) << 14, true))
}

/// Append `data` as an open type: one or more length-prefixed fragments.
pub fn encode_open_type(buf: &mut BytesMut, data: &[u8]) {
    // Zero-length open type carries a single zero octet (10.1).
    let data = if data.is_empty() { &[0u8][..] } else { data };

    let mut offset = 0;
    loop {
        let declared = encode_length(buf, data.len() - offset);
        buf.put_slice(&data[offset..offset + declared]);
        offset += declared;
        // A fragment always declares at least one quantum; anything
        // smaller was a final (non-fragment) length field.
        if declared < FRAGMENT_QUANTUM {
            break;
        }
    }
}

/// Decode an open type at `cursor`, advancing it past all fragments.
pub fn decode_open_type(buf: &[u8], cursor: &mut usize) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::new();
    loop {
        let (count, more) = decode_length(buf, cursor)?;
        if count > 0 {
            let chunk = buf
                .get(*cursor..*cursor + count)
                .ok_or(ParseError::Truncated(buf.len()))?;
            out.extend_from_slice(chunk);
            *cursor += count;
        }
        if !more {
            break;
        }
    }
    Ok(out)
}
