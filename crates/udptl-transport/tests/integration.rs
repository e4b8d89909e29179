//! # Integration tests: Session ↔ Session through the wire format
//!
//! The full vertical stack — send → wire bytes → on_datagram → deliver —
//! with loss applied in the middle. No network I/O; the "link" is a Vec
//! of datagrams.

use udptl_transport::{ErrorCorrection, RecoveredUnit, Session, SessionConfig};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn make_pair(ec: ErrorCorrection, span: usize, entries: usize) -> (Session, Session) {
    let cfg = SessionConfig {
        error_correction: ec,
        fec_span: span,
        fec_entries: entries,
        ..Default::default()
    };
    (Session::new(cfg.clone()), Session::new(cfg))
}

/// Distinct payload for sequence `i`; same length for every sequence so
/// XOR reconstruction is length-exact.
fn payload(i: u64) -> Vec<u8> {
    (0..40u8).map(|j| (i as u8).wrapping_mul(37).wrapping_add(j)).collect()
}

fn seqs(units: &[RecoveredUnit]) -> Vec<u64> {
    units.iter().map(|u| u.seq).collect()
}

// ─── No Error Correction ────────────────────────────────────────────────────

#[test]
fn lossless_stream_delivers_in_order() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::None, 0, 0);
    for i in 0..50u64 {
        let wire = tx.send(&payload(i)).unwrap();
        let units = rx.on_datagram(&wire);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].seq, i);
        assert_eq!(&units[0].payload[..], &payload(i)[..]);
    }
    assert_eq!(rx.stats().units_delivered, 50);
    assert_eq!(rx.stats().recovered_redundancy, 0);
}

#[test]
fn literal_wire_vector() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::None, 0, 0);
    for i in 0..5u64 {
        let wire = tx.send(&payload(i)).unwrap();
        rx.on_datagram(&wire);
    }
    let wire = tx.send(&[0xAA, 0xBB, 0xCC]).unwrap();
    assert_eq!(&wire[..], &[0x00, 0x05, 0x03, 0xAA, 0xBB, 0xCC, 0x00, 0x00]);
}

#[test]
fn loss_without_ec_is_final() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::None, 0, 0);
    let d0 = tx.send(&payload(0)).unwrap();
    let _lost = tx.send(&payload(1)).unwrap();
    let d2 = tx.send(&payload(2)).unwrap();

    rx.on_datagram(&d0);
    let units = rx.on_datagram(&d2);
    assert_eq!(seqs(&units), vec![2], "the gap cannot be filled");
    assert_eq!(rx.rx_sequence(), 3);
}

// ─── Redundancy ─────────────────────────────────────────────────────────────

#[test]
fn redundancy_fills_every_recoverable_gap_size() {
    // With entries=E, any k ≤ E consecutive losses followed by one
    // received datagram recover all k units byte-for-byte.
    for entries in 1..=4usize {
        for k in 1..=entries as u64 {
            let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, entries);

            // Warm up in order.
            for i in 0..6u64 {
                let wire = tx.send(&payload(i)).unwrap();
                rx.on_datagram(&wire);
            }
            // Drop k datagrams on the floor.
            for i in 6..6 + k {
                let _ = tx.send(&payload(i)).unwrap();
            }
            // The next one carries them as secondaries.
            let wire = tx.send(&payload(6 + k)).unwrap();
            let units = rx.on_datagram(&wire);

            let expected: Vec<u64> = (6..=6 + k).collect();
            assert_eq!(seqs(&units), expected, "entries={entries} k={k}");
            for u in &units {
                assert_eq!(&u.payload[..], &payload(u.seq)[..], "seq {}", u.seq);
            }
        }
    }
}

#[test]
fn redundancy_gap_beyond_entries_loses_the_oldest() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, 2);
    for i in 0..4u64 {
        let wire = tx.send(&payload(i)).unwrap();
        rx.on_datagram(&wire);
    }
    // Lose 4, 5, 6 — only 5 and 6 ride along with 7.
    for i in 4..7u64 {
        let _ = tx.send(&payload(i)).unwrap();
    }
    let wire = tx.send(&payload(7)).unwrap();
    let units = rx.on_datagram(&wire);
    assert_eq!(seqs(&units), vec![5, 6, 7]);
    assert_eq!(rx.stats().recovered_redundancy, 2);
}

#[test]
fn redundancy_duplicate_datagram_yields_nothing() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, 2);
    for i in 0..3u64 {
        let wire = tx.send(&payload(i)).unwrap();
        let first = rx.on_datagram(&wire);
        assert_eq!(first.len(), 1);
        // Replay: the sequence is now in the past, nothing re-emitted.
        let again = rx.on_datagram(&wire);
        assert!(again.is_empty(), "duplicate of seq {i} re-delivered");
    }
}

#[test]
fn redundancy_reordered_late_primary_not_redelivered() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, 4);
    let d: Vec<_> = (0..5u64).map(|i| tx.send(&payload(i)).unwrap()).collect();

    rx.on_datagram(&d[0]);
    rx.on_datagram(&d[1]);
    // 2 and 3 lost; 4 recovers both.
    let units = rx.on_datagram(&d[4]);
    assert_eq!(seqs(&units), vec![2, 3, 4]);

    // 3 straggles in late — already covered by recovery.
    let units = rx.on_datagram(&d[3]);
    assert!(units.is_empty());
}

// ─── FEC ────────────────────────────────────────────────────────────────────

#[test]
fn fec_in_order_stream_delivers_primaries_only() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Fec, 2, 2);
    for i in 0..20u64 {
        let wire = tx.send(&payload(i)).unwrap();
        let units = rx.on_datagram(&wire);
        assert_eq!(seqs(&units), vec![i]);
    }
    assert_eq!(rx.stats().recovered_fec, 0);
}

#[test]
fn fec_recovers_single_loss_in_each_group() {
    // span=2, entries=2 covers the previous four sequences in two
    // interleaved parity groups. Any single loss is repaired once a
    // datagram whose parity covers it arrives.
    for lost in 6..10u64 {
        let (mut tx, mut rx) = make_pair(ErrorCorrection::Fec, 2, 2);
        let mut recovered = Vec::new();
        for i in 0..12u64 {
            let wire = tx.send(&payload(i)).unwrap();
            if i == lost {
                continue;
            }
            for u in rx.on_datagram(&wire) {
                recovered.push(u);
            }
        }
        let got: Vec<u64> = recovered.iter().map(|u| u.seq).collect();
        let expected: Vec<u64> = (0..12).collect();
        assert_eq!(got, expected, "lost={lost}");
        for u in &recovered {
            assert_eq!(&u.payload[..], &payload(u.seq)[..], "seq {}", u.seq);
        }
        assert_eq!(rx.stats().recovered_fec, 1);
    }
}

#[test]
fn fec_wider_geometry_recovers_spread_losses() {
    // span=3, entries=2: six packets of cover per datagram. Losing one
    // packet from each parity group still converges.
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Fec, 3, 2);
    let mut delivered = Vec::new();
    for i in 0..20u64 {
        let wire = tx.send(&payload(i)).unwrap();
        if i == 10 || i == 11 {
            continue; // adjacent losses land in different groups
        }
        delivered.extend(rx.on_datagram(&wire));
    }
    let got: Vec<u64> = delivered.iter().map(|u| u.seq).collect();
    assert_eq!(got, (0..20u64).collect::<Vec<_>>());
}

#[test]
fn fec_oversized_parity_rejected_without_state_change() {
    let (_, mut rx) = make_pair(ErrorCorrection::Fec, 1, 1);

    // seq 0, primary [AA], FEC with one 1401-byte parity payload.
    let mut raw = vec![0x00, 0x00, 0x01, 0xAA, 0x80, 0x01, 0x01, 0x01];
    raw.extend_from_slice(&[0x85, 0x79]); // two-byte length: 1401
    raw.extend(std::iter::repeat(0u8).take(1401));

    let before = rx.rx_sequence();
    assert!(rx.on_datagram(&raw).is_empty());
    assert_eq!(rx.rx_sequence(), before);
    assert_eq!(rx.stats().malformed_dropped, 1);
}

#[test]
fn fec_oversized_primary_rejected() {
    let (_, mut rx) = make_pair(ErrorCorrection::Fec, 1, 1);

    // Primary of 1401 bytes under the FEC selector.
    let mut raw = vec![0x00, 0x00, 0x85, 0x79];
    raw.extend(std::iter::repeat(0x42u8).take(1401));
    raw.extend_from_slice(&[0x80, 0x01, 0x01, 0x00]);

    assert!(rx.on_datagram(&raw).is_empty());
    assert_eq!(rx.rx_sequence(), 0);
}

// ─── Sequence Wraparound ────────────────────────────────────────────────────

#[test]
fn wire_sequence_wraps_forward() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, 2);

    for i in 0..65_538u64 {
        let wire = tx.send(&payload(i)).unwrap();
        if i == 65_535 {
            // The last 16-bit sequence on the wire.
            assert_eq!(&wire[..2], &[0xFF, 0xFF]);
            rx.on_datagram(&wire);
        } else if i == 65_536 {
            // Wraps to zero and still advances forward.
            assert_eq!(&wire[..2], &[0x00, 0x00]);
            let units = rx.on_datagram(&wire);
            assert_eq!(seqs(&units), vec![65_536]);
        } else {
            let units = rx.on_datagram(&wire);
            assert_eq!(seqs(&units), vec![i]);
        }
    }
    assert_eq!(rx.rx_sequence(), 65_538);
}

#[test]
fn redundancy_recovers_across_the_wrap() {
    let (mut tx, mut rx) = make_pair(ErrorCorrection::Redundancy, 0, 3);
    for i in 0..65_534u64 {
        let wire = tx.send(&payload(i)).unwrap();
        rx.on_datagram(&wire);
    }
    // Lose the two datagrams straddling the wrap.
    let _ = tx.send(&payload(65_534)).unwrap();
    let _ = tx.send(&payload(65_535)).unwrap();
    let wire = tx.send(&payload(65_536)).unwrap();

    let units = rx.on_datagram(&wire);
    assert_eq!(seqs(&units), vec![65_534, 65_535, 65_536]);
    for u in &units {
        assert_eq!(&u.payload[..], &payload(u.seq)[..]);
    }
}

// ─── Bridged Sessions ───────────────────────────────────────────────────────

#[test]
fn bridge_forwarding_is_transparent() {
    // A unit decoded by one leg re-enters the other leg's encoder
    // unmodified, whatever the EC schemes on either side.
    let (mut a_tx, mut a_rx) = make_pair(ErrorCorrection::Redundancy, 0, 2);
    let (mut b_tx, mut b_rx) = make_pair(ErrorCorrection::Fec, 2, 2);

    for i in 0..10u64 {
        let wire = a_tx.send(&payload(i)).unwrap();
        for unit in a_rx.on_datagram(&wire) {
            let forwarded = b_tx.send(&unit.payload).unwrap();
            let out = b_rx.on_datagram(&forwarded);
            assert_eq!(out.len(), 1);
            assert_eq!(&out[0].payload[..], &payload(i)[..]);
        }
    }
}
