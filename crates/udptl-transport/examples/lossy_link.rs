//! Demonstrates loss recovery over a simulated lossy link.
//!
//! Run with `cargo run --example lossy_link -- [none|redundancy|fec]`.

use udptl_transport::{ErrorCorrection, Session, SessionConfig};

fn main() {
    let scheme = match std::env::args().nth(1).as_deref() {
        Some("redundancy") => ErrorCorrection::Redundancy,
        Some("fec") => ErrorCorrection::Fec,
        _ => ErrorCorrection::None,
    };

    let cfg = SessionConfig {
        error_correction: scheme,
        fec_span: 2,
        fec_entries: 2,
        ..Default::default()
    };
    let mut tx = Session::new(cfg.clone());
    let mut rx = Session::new(cfg);

    // Drop every 7th datagram.
    let mut delivered = 0u64;
    let total = 70u64;
    for i in 0..total {
        let unit: Vec<u8> = (0..32).map(|j| (i as u8).wrapping_add(j)).collect();
        let wire = tx.send(&unit).expect("unit fits the datagram ceiling");
        if i % 7 == 6 {
            println!("  seq {i}: dropped on the link");
            continue;
        }
        for u in rx.on_datagram(&wire) {
            if u.seq != i {
                println!("  seq {}: recovered after the fact", u.seq);
            }
            delivered += 1;
        }
    }

    let stats = rx.stats();
    println!();
    println!("scheme             : {scheme:?}");
    println!("sent               : {total}");
    println!("delivered          : {delivered}");
    println!("recovered (redund.): {}", stats.recovered_redundancy);
    println!("recovered (FEC)    : {}", stats.recovered_fec);
    println!("recovery ratio     : {:.3}", stats.recovery_ratio());
}
