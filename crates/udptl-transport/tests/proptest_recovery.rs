//! Property-based tests for the loss-recovery paths.
//!
//! The redundancy guarantee is absolute for gaps within the entry
//! count; the decoder as a whole must be total over arbitrary input.

use proptest::prelude::*;
use udptl_transport::{Datagram, ErrorCorrection, Session, SessionConfig};

fn pair(ec: ErrorCorrection, span: usize, entries: usize) -> (Session, Session) {
    let cfg = SessionConfig {
        error_correction: ec,
        fec_span: span,
        fec_entries: entries,
        ..Default::default()
    };
    (Session::new(cfg.clone()), Session::new(cfg))
}

proptest! {
    /// Under redundancy, every loss burst no longer than the entry
    /// count is healed, so an arbitrary such loss pattern still
    /// delivers the complete stream in order, byte-for-byte.
    #[test]
    fn redundancy_heals_all_bounded_bursts(
        entries in 1usize..=4,
        bursts in proptest::collection::vec((2u8..=30, 1u8..=4), 1..6),
        seed in any::<u8>(),
    ) {
        let (mut tx, mut rx) = pair(ErrorCorrection::Redundancy, 0, entries);

        // Turn (gap-start, len) pairs into a drop set with bursts no
        // longer than `entries`, separated by at least one received
        // datagram.
        let mut dropped = std::collections::BTreeSet::new();
        let mut next_free = 0u64;
        for (start, len) in bursts {
            let start = next_free.max(start as u64);
            let len = (len as usize).min(entries) as u64;
            for s in start..start + len {
                dropped.insert(s);
            }
            next_free = start + len + 1;
        }

        let total = next_free + 2;
        let mut delivered = Vec::new();
        for i in 0..total {
            let unit: Vec<u8> = (0..24u8).map(|j| j.wrapping_mul(seed).wrapping_add(i as u8)).collect();
            let wire = tx.send(&unit).unwrap();
            if dropped.contains(&i) {
                continue;
            }
            for u in rx.on_datagram(&wire) {
                prop_assert_eq!(
                    &u.payload[..],
                    &(0..24u8).map(|j| j.wrapping_mul(seed).wrapping_add(u.seq as u8)).collect::<Vec<_>>()[..]
                );
                delivered.push(u.seq);
            }
        }

        prop_assert_eq!(delivered, (0..total).collect::<Vec<_>>());
    }

    /// Arbitrary bytes must never panic the parser or the session, and
    /// a rejected datagram must leave the cursor where it was.
    #[test]
    fn decoder_is_total(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Datagram::parse(&data);

        let (_, mut rx) = pair(ErrorCorrection::Fec, 2, 2);
        let before = rx.rx_sequence();
        let units = rx.on_datagram(&data);
        if rx.stats().malformed_dropped == 1 {
            prop_assert!(units.is_empty());
            prop_assert_eq!(rx.rx_sequence(), before);
        }
    }

    /// Whatever parses also re-parses after a valid re-encode of its
    /// primary through a fresh session (wire-level sanity).
    #[test]
    fn parsed_primary_reencodes(data in proptest::collection::vec(any::<u8>(), 2..128)) {
        if let Ok(dgram) = Datagram::parse(&data) {
            if dgram.primary.len() <= 1400 {
                let (mut tx, mut rx) = pair(ErrorCorrection::None, 0, 0);
                let wire = tx.send(&dgram.primary).unwrap();
                let units = rx.on_datagram(&wire);
                prop_assert_eq!(units.len(), 1);
            }
        }
    }
}
