//! # Loss-Recovery Encoder
//!
//! Assembles one outbound UDPTL datagram: 16-bit sequence, primary IFP
//! open type, then the configured error-recovery side channel.
//!
//! ```text
//! [2 bytes] sequence number (big endian, mod 65536)
//! [open-type] primary IFP payload
//! [1 byte]  selector: 0x00 = secondary set follows, 0x80 = FEC follows
//!   0x00: [length] entry count, then N open-type secondaries, newest first
//!   0x80: [1] reserved, [1] span, [1] entries, then M open-type parities
//! ```
//!
//! Reliability is purely probabilistic: the side channel repeats or
//! parity-protects prior history, never waits for acknowledgement.

use bytes::{BufMut, BytesMut};

use crate::error::ParseError;
use crate::history::{slot_of, TxHistory, LOCAL_MAX_DATAGRAM, SLOT_MASK};
use crate::per;
use crate::session::{ErrorCorrection, SessionConfig};

/// Selector octet introducing a redundancy (secondary) set.
pub const SELECTOR_SECONDARY: u8 = 0x00;

/// Selector octet introducing an FEC set.
pub const SELECTOR_FEC: u8 = 0x80;

/// Build the wire datagram for `ifp` at transmit sequence `tx_seq`,
/// storing the unit into the history for later redundancy/FEC cover.
///
/// The caller advances `tx_seq` after a successful build.
pub fn build_packet(
    config: &SessionConfig,
    history: &mut TxHistory,
    tx_seq: u64,
    ifp: &[u8],
) -> Result<BytesMut, ParseError> {
    let limit = config.far_max_datagram.min(LOCAL_MAX_DATAGRAM);
    if ifp.len() > limit {
        return Err(ParseError::Oversized {
            len: ifp.len(),
            limit,
        });
    }

    history.store(tx_seq, ifp);

    let mut buf = BytesMut::with_capacity(ifp.len() + 8);
    buf.put_u16((tx_seq & 0xFFFF) as u16);
    per::encode_open_type(&mut buf, ifp);

    match config.error_correction {
        ErrorCorrection::None => {
            buf.put_u8(SELECTOR_SECONDARY);
            // The entry count is always zero; no fragmented form needed.
            per::encode_length(&mut buf, 0);
        }
        ErrorCorrection::Redundancy => {
            buf.put_u8(SELECTOR_SECONDARY);
            let entries = (config.fec_entries as u64).min(tx_seq) as usize;
            per::encode_length(&mut buf, entries);
            // Newest first: the unit sent just before this one leads.
            for i in 0..entries {
                let prior = history.payload(tx_seq - i as u64 - 1);
                per::encode_open_type(&mut buf, prior);
            }
        }
        ErrorCorrection::Fec => {
            let mut span = config.fec_span;
            let mut entries = config.fec_entries;
            // Wind the FEC up smoothly until enough history exists. The
            // unbounded counter keeps ramp-up from re-triggering after
            // the 16-bit wire sequence wraps.
            if tx_seq < (span * entries) as u64 {
                entries = (tx_seq / span as u64) as usize;
                if tx_seq < span as u64 {
                    span = 0;
                }
            }
            buf.put_u8(SELECTOR_FEC);
            buf.put_u8(0x01);
            buf.put_u8(span as u8);
            buf.put_u8(entries as u8);
            for m in 0..entries {
                let parity = xor_parity(history, tx_seq, span, entries, m);
                per::encode_open_type(&mut buf, &parity);
            }
        }
    }

    Ok(buf)
}

/// XOR one parity group: every `entries`-th slot across the `span`
/// packets ending just before `(tx_seq + m)`'s slot. Output length is
/// the longest participant; shorter payloads contribute zeros beyond
/// their own length.
fn xor_parity(
    history: &TxHistory,
    tx_seq: u64,
    span: usize,
    entries: usize,
    m: usize,
) -> Vec<u8> {
    let limit = (slot_of(tx_seq) + m) & SLOT_MASK as usize;
    let mut parity = Vec::new();
    let mut slot = limit.wrapping_sub(span * entries) & SLOT_MASK as usize;
    while slot != limit {
        xor_accumulate(&mut parity, history.payload_at(slot));
        slot = (slot + entries) & SLOT_MASK as usize;
    }
    parity
}

fn xor_accumulate(acc: &mut Vec<u8>, payload: &[u8]) {
    let shared = acc.len().min(payload.len());
    for (a, b) in acc.iter_mut().zip(&payload[..shared]) {
        *a ^= *b;
    }
    if payload.len() > shared {
        acc.extend_from_slice(&payload[shared..]);
    }
}
