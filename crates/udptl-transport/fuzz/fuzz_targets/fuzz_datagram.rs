#![no_main]

use libfuzzer_sys::fuzz_target;
use udptl_transport::{Datagram, ErrorCorrection, Session, SessionConfig};

/// Fuzz the complete datagram pipeline.
///
/// The parser and the session must never panic on any input — malformed
/// datagrams are dropped, valid ones are committed.
fuzz_target!(|data: &[u8]| {
    // 1. Pure parse — must not panic.
    let parsed = Datagram::parse(data);

    // 2. Session commit across every EC scheme — must not panic, and a
    //    rejected datagram must not move the receive cursor.
    for ec in [
        ErrorCorrection::None,
        ErrorCorrection::Redundancy,
        ErrorCorrection::Fec,
    ] {
        let mut session = Session::new(SessionConfig {
            error_correction: ec,
            fec_span: 2,
            fec_entries: 2,
            ..Default::default()
        });
        let units = session.on_datagram(data);
        if parsed.is_err() {
            assert!(units.is_empty());
            assert_eq!(session.rx_sequence(), 0);
        }
    }
});
