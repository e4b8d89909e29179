//! # Loss-Recovery Decoder
//!
//! Inbound datagrams go through two phases:
//!
//! 1. **Parse** ([`Datagram::parse`]) — pure, stateless validation of the
//!    whole wire image. Any truncated, inconsistent, or oversized field
//!    rejects the datagram before any session state is touched.
//! 2. **Commit** ([`apply`]) — advances the expected-sequence cursor,
//!    stores the primary into the receive history, and recovers whatever
//!    the side channel allows: gap fill from redundancy secondaries, or
//!    XOR reconstruction from FEC parity groups.
//!
//! Recovered units are emitted oldest first, the primary last.

use bytes::Bytes;

use crate::error::ParseError;
use crate::history::{
    slot_of, RxHistory, HISTORY_SLOTS, LOCAL_MAX_DATAGRAM, MAX_FEC_ENTRIES, MAX_FEC_SPAN,
    SLOT_MASK,
};
use crate::per;

/// Most secondaries one datagram may declare — the history window size.
const MAX_SECONDARIES: usize = HISTORY_SLOTS;

// ─── Parsed Datagram ────────────────────────────────────────────────────────

/// The error-recovery side channel of one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorRecovery {
    /// Redundancy: prior units repeated verbatim, newest first.
    Secondary(Vec<Vec<u8>>),
    /// Forward error correction: XOR parity over strided history groups.
    Fec {
        span: u8,
        entries: u8,
        parity: Vec<Vec<u8>>,
    },
}

/// A fully validated UDPTL datagram, not yet applied to any session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// 16-bit wire sequence number.
    pub wire_seq: u16,
    /// Primary IFP payload.
    pub primary: Vec<u8>,
    /// Side-channel contents.
    pub recovery: ErrorRecovery,
}

impl Datagram {
    /// Validate and decompose a raw datagram.
    ///
    /// Trailing octets after the error-recovery section are ignored;
    /// everything up to there must be self-consistent or the whole
    /// datagram is condemned.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < 2 {
            return Err(ParseError::Truncated(buf.len()));
        }
        let wire_seq = u16::from_be_bytes([buf[0], buf[1]]);
        let mut cursor = 2;

        let primary = per::decode_open_type(buf, &mut cursor)?;

        let selector = *buf.get(cursor).ok_or(ParseError::Truncated(cursor))?;
        cursor += 1;

        let recovery = if selector & 0x80 == 0 {
            Self::parse_secondaries(buf, &mut cursor)?
        } else {
            Self::parse_fec(buf, &mut cursor, primary.len())?
        };

        Ok(Datagram {
            wire_seq,
            primary,
            recovery,
        })
    }

    fn parse_secondaries(buf: &[u8], cursor: &mut usize) -> Result<ErrorRecovery, ParseError> {
        let mut secondaries = Vec::new();
        // The count itself may arrive fragmented.
        loop {
            let (count, more) = per::decode_length(buf, cursor)?;
            if secondaries.len() + count > MAX_SECONDARIES {
                return Err(ParseError::TooManyEntries {
                    kind: "secondary",
                    got: secondaries.len() + count,
                    max: MAX_SECONDARIES,
                });
            }
            for _ in 0..count {
                secondaries.push(per::decode_open_type(buf, cursor)?);
            }
            if !more {
                break;
            }
        }
        Ok(ErrorRecovery::Secondary(secondaries))
    }

    fn parse_fec(
        buf: &[u8],
        cursor: &mut usize,
        primary_len: usize,
    ) -> Result<ErrorRecovery, ParseError> {
        // The receive history cannot hold overlength payloads in FEC mode.
        if primary_len > LOCAL_MAX_DATAGRAM {
            return Err(ParseError::Oversized {
                len: primary_len,
                limit: LOCAL_MAX_DATAGRAM,
            });
        }

        let reserved = *buf.get(*cursor).ok_or(ParseError::Truncated(*cursor))?;
        if reserved != 1 {
            return Err(ParseError::BadReserved(reserved));
        }
        let span = *buf.get(*cursor + 1).ok_or(ParseError::Truncated(*cursor + 1))?;
        let entries = *buf.get(*cursor + 2).ok_or(ParseError::Truncated(*cursor + 2))?;
        *cursor += 3;

        if span as usize > MAX_FEC_SPAN {
            return Err(ParseError::TooManyEntries {
                kind: "FEC span",
                got: span as usize,
                max: MAX_FEC_SPAN,
            });
        }
        if entries as usize > MAX_FEC_ENTRIES {
            return Err(ParseError::TooManyEntries {
                kind: "FEC entry",
                got: entries as usize,
                max: MAX_FEC_ENTRIES,
            });
        }

        let mut parity = Vec::with_capacity(entries as usize);
        for _ in 0..entries {
            let p = per::decode_open_type(buf, cursor)?;
            if p.len() > LOCAL_MAX_DATAGRAM {
                return Err(ParseError::Oversized {
                    len: p.len(),
                    limit: LOCAL_MAX_DATAGRAM,
                });
            }
            parity.push(p);
        }

        Ok(ErrorRecovery::Fec {
            span,
            entries,
            parity,
        })
    }
}

// ─── Recovered Units ────────────────────────────────────────────────────────

/// One IFP unit delivered to the caller, tagged with its absolute
/// sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredUnit {
    pub seq: u64,
    pub payload: Bytes,
}

/// Result of committing one datagram against the session state.
#[derive(Debug)]
pub(crate) struct DecodeOutcome {
    /// Units to deliver, oldest first, primary last.
    pub units: Vec<RecoveredUnit>,
    /// New expected-receive cursor.
    pub next_rx_seq: u64,
    /// How many of `units` came from the side channel rather than the
    /// primary field.
    pub recovered: usize,
}

/// Reconstruct the absolute sequence nearest to `expected` that is
/// congruent to `wire` mod 65536. A wire value of 0 right after 65535
/// advances forward; it is never read as 65536 packets of loss.
pub(crate) fn unwrap_sequence(wire: u16, expected: u64) -> u64 {
    let delta = wire.wrapping_sub(expected as u16) as u64;
    if delta < 0x8000 {
        expected + delta
    } else {
        expected.saturating_sub(0x1_0000 - delta)
    }
}

/// Commit a parsed datagram: recover what the side channel allows and
/// advance the expected cursor to just past this datagram's sequence.
pub(crate) fn apply(dgram: &Datagram, expected: u64, history: &mut RxHistory) -> DecodeOutcome {
    let seq = unwrap_sequence(dgram.wire_seq, expected);
    let mut units = Vec::new();

    match &dgram.recovery {
        ErrorRecovery::Secondary(secondaries) => {
            if seq > expected {
                recover_from_secondaries(secondaries, seq, expected, &mut units);
            }
        }
        ErrorRecovery::Fec {
            span,
            entries,
            parity,
        } => {
            recover_from_fec(
                dgram, seq, expected, *span, *entries, parity, history, &mut units,
            );
        }
    }
    let recovered = units.len();

    // Out-of-sequence arrival may mean this unit was already delivered
    // from a later datagram's recovery data; only a current-or-newer
    // primary is handed up.
    if seq >= expected {
        units.push(RecoveredUnit {
            seq,
            payload: Bytes::from(dgram.primary.clone()),
        });
    }

    DecodeOutcome {
        units,
        next_rx_seq: seq + 1,
        recovered,
    }
}

/// Step the secondaries in reverse (they arrive newest first) so gap
/// positions are filled oldest first.
fn recover_from_secondaries(
    secondaries: &[Vec<u8>],
    seq: u64,
    expected: u64,
    units: &mut Vec<RecoveredUnit>,
) {
    for i in (1..=secondaries.len() as u64).rev() {
        if seq >= expected + i {
            units.push(RecoveredUnit {
                seq: seq - i,
                payload: Bytes::from(secondaries[i as usize - 1].clone()),
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn recover_from_fec(
    dgram: &Datagram,
    seq: u64,
    expected: u64,
    span: u8,
    entries: u8,
    parity: &[Vec<u8>],
    history: &mut RxHistory,
    units: &mut Vec<RecoveredUnit>,
) {
    // Mark skipped positions missing. Sixteen consecutive sequences
    // cover every slot, so older gaps need no separate pass.
    let first_gap = expected.max(seq.saturating_sub(SLOT_MASK + 1));
    for missing in first_gap..seq {
        history.mark_missing(slot_of(missing));
    }

    let slot = slot_of(seq);
    history.set_payload(slot, dgram.primary.clone());
    history.set_parity(slot, span, entries, parity.to_vec());

    let mut repaired = [false; HISTORY_SLOTS];
    repaired[slot] = true;

    // Hunt back across the part of the window this datagram's group
    // geometry does not cover, trying every stored parity set.
    let stop = (slot + span as usize * entries as usize) & SLOT_MASK as usize;
    let mut l = slot;
    while l != stop {
        repair_groups_at(l, history, &mut repaired);
        l = l.wrapping_sub(1) & SLOT_MASK as usize;
    }

    // Play newly repaired positions forward in time. Slot `slot + k`
    // (mod 16) corresponds to absolute sequence `seq - 16 + k`.
    for k in 1..HISTORY_SLOTS {
        let l = (slot + k) & SLOT_MASK as usize;
        if !repaired[l] {
            continue;
        }
        let Some(repaired_seq) = (seq + k as u64).checked_sub(HISTORY_SLOTS as u64) else {
            // Window arithmetic points before the first packet of the
            // session; nothing real lives there.
            continue;
        };
        units.push(RecoveredUnit {
            seq: repaired_seq,
            payload: Bytes::copy_from_slice(history.slot(l).payload()),
        });
    }
}

/// Attempt reconstruction from the parity sets stored at slot `l`. A
/// group with exactly one missing member is repairable: XOR the known
/// members into the parity, each contributing its own length.
fn repair_groups_at(l: usize, history: &mut RxHistory, repaired: &mut [bool; HISTORY_SLOTS]) {
    if !history.slot(l).has_parity() {
        return;
    }
    let l_span = history.slot(l).fec_span();
    let l_entries = history.slot(l).fec_entries();
    if l_entries == 0 {
        return;
    }

    for m in 0..l_entries {
        let limit = (l + m) & SLOT_MASK as usize;
        let start = limit.wrapping_sub(l_span * l_entries) & SLOT_MASK as usize;

        // Exactly one absent participant, or the group is no help.
        let mut missing = None;
        let mut k = start;
        while k != limit {
            if !history.slot(k).present() {
                if missing.is_some() {
                    missing = Some(usize::MAX);
                    break;
                }
                missing = Some(k);
            }
            k = (k + l_entries) & SLOT_MASK as usize;
        }
        let Some(target) = missing.filter(|&t| t != usize::MAX) else {
            continue;
        };

        let mut rebuilt = history.slot(l).parity(m).to_vec();
        let mut k = start;
        while k != limit {
            if k != target {
                let member = history.slot(k).payload();
                let shared = rebuilt.len().min(member.len());
                for (r, b) in rebuilt.iter_mut().zip(&member[..shared]) {
                    *r ^= *b;
                }
            }
            k = (k + l_entries) & SLOT_MASK as usize;
        }
        history.set_payload(target, rebuilt);
        repaired[target] = true;
    }
}
