//! # Session Statistics
//!
//! Per-session counters, serializable for JSON export or debug dumps.

use serde::Serialize;

/// Aggregate counters for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    /// Datagrams built and handed to the transport.
    pub datagrams_sent: u64,
    /// Wire bytes of those datagrams (payload + side channel).
    pub bytes_sent: u64,
    /// Datagrams offered to the decoder (valid or not).
    pub datagrams_received: u64,
    /// Wire bytes received.
    pub bytes_received: u64,
    /// IFP units delivered to the caller (primary + recovered).
    pub units_delivered: u64,
    /// Units rebuilt from redundancy secondaries.
    pub recovered_redundancy: u64,
    /// Units rebuilt from FEC parity groups.
    pub recovered_fec: u64,
    /// Datagrams dropped as malformed or oversized.
    pub malformed_dropped: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of delivered units that came from the side channel.
    pub fn recovery_ratio(&self) -> f64 {
        if self.units_delivered == 0 {
            0.0
        } else {
            (self.recovered_redundancy + self.recovered_fec) as f64
                / self.units_delivered as f64
        }
    }

    /// Fraction of received datagrams dropped as malformed.
    pub fn drop_ratio(&self) -> f64 {
        if self.datagrams_received == 0 {
            0.0
        } else {
            self.malformed_dropped as f64 / self.datagrams_received as f64
        }
    }
}
