//! # Session State
//!
//! One [`Session`] per fax leg. It owns the transmit/receive circular
//! histories and the unbounded sequence counters, and composes the
//! variable-length codec, the loss-recovery encoder, and the
//! loss-recovery decoder into two operations:
//!
//! - [`Session::send`] — unit in, wire datagram out
//! - [`Session::on_datagram`] — wire bytes in, zero or more recovered
//!   units out
//!
//! The session is single-threaded by design: the hosting event loop is
//! the only caller, both operations are bounded computations over one
//! datagram, and nothing here blocks or keeps timers. Reliability is
//! probabilistic (redundancy/FEC), never acknowledgement-based.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decoder::{self, Datagram, ErrorRecovery, RecoveredUnit};
use crate::encoder;
use crate::error::ParseError;
use crate::history::{
    RxHistory, TxHistory, HISTORY_SLOTS, LOCAL_MAX_DATAGRAM, MAX_FEC_ENTRIES, MAX_FEC_SPAN,
};
use crate::stats::SessionStats;

// ─── Configuration ──────────────────────────────────────────────────────────

/// Which error-recovery side channel outbound datagrams carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    /// No side channel: every loss is final.
    #[default]
    None,
    /// Repeat the last N units verbatim alongside each new unit.
    Redundancy,
    /// XOR parity over strided groups of past units.
    Fec,
}

/// Immutable per-session configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub error_correction: ErrorCorrection,
    /// FEC stride between members of one parity group.
    pub fec_span: usize,
    /// Redundancy secondary count, or FEC parity groups per datagram.
    pub fec_entries: usize,
    /// Largest datagram this side accepts.
    pub local_max_datagram: usize,
    /// Largest datagram the remote side advertised it accepts.
    pub far_max_datagram: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            error_correction: ErrorCorrection::None,
            fec_span: 3,
            fec_entries: 3,
            local_max_datagram: LOCAL_MAX_DATAGRAM,
            far_max_datagram: LOCAL_MAX_DATAGRAM,
        }
    }
}

impl SessionConfig {
    /// Clamp out-of-range parameters to safe bounds, warning rather
    /// than failing. In particular `span * entries` must stay within
    /// the 16-slot history or parity groups would reference
    /// already-overwritten units and "recover" garbage.
    pub fn normalized(mut self) -> Self {
        if self.error_correction != ErrorCorrection::None {
            let span = self.fec_span.clamp(1, MAX_FEC_SPAN);
            if span != self.fec_span {
                warn!(requested = self.fec_span, using = span, "FEC span out of range");
                self.fec_span = span;
            }
            let entries = self.fec_entries.clamp(1, MAX_FEC_ENTRIES);
            if entries != self.fec_entries {
                warn!(
                    requested = self.fec_entries,
                    using = entries,
                    "FEC entry count out of range"
                );
                self.fec_entries = entries;
            }
        }
        if self.error_correction == ErrorCorrection::Fec
            && self.fec_span * self.fec_entries > HISTORY_SLOTS
        {
            let entries = HISTORY_SLOTS / self.fec_span;
            warn!(
                span = self.fec_span,
                requested = self.fec_entries,
                using = entries,
                "FEC span*entries exceeds the history window; clamping entries"
            );
            self.fec_entries = entries;
        }
        let max = self.local_max_datagram.clamp(100, LOCAL_MAX_DATAGRAM);
        if max != self.local_max_datagram {
            warn!(
                requested = self.local_max_datagram,
                using = max,
                "local max datagram out of range"
            );
            self.local_max_datagram = max;
        }
        let far = self.far_max_datagram.clamp(100, LOCAL_MAX_DATAGRAM);
        if far != self.far_max_datagram {
            warn!(
                requested = self.far_max_datagram,
                using = far,
                "far max datagram out of range"
            );
            self.far_max_datagram = far;
        }
        self
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

/// Codec state for one fax leg.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    tx_seq: u64,
    rx_seq: u64,
    tx_history: TxHistory,
    rx_history: RxHistory,
    stats: SessionStats,
}

impl Session {
    /// Create a session from a (normalized) configuration.
    pub fn new(config: SessionConfig) -> Self {
        Session {
            config: config.normalized(),
            tx_seq: 0,
            rx_seq: 0,
            tx_history: TxHistory::new(),
            rx_history: RxHistory::new(),
            stats: SessionStats::new(),
        }
    }

    /// Encode `ifp` into the wire datagram to transmit, advancing the
    /// transmit sequence. The unit enters the history so following
    /// datagrams can cover it with redundancy or parity.
    pub fn send(&mut self, ifp: &[u8]) -> Result<Bytes, ParseError> {
        let buf = encoder::build_packet(&self.config, &mut self.tx_history, self.tx_seq, ifp)?;
        self.tx_seq += 1;
        self.stats.datagrams_sent += 1;
        self.stats.bytes_sent += buf.len() as u64;
        Ok(buf.freeze())
    }

    /// Decode one inbound datagram, returning every unit it yields —
    /// gap fills first (oldest first), then the primary. Malformed
    /// input drops the whole datagram and mutates nothing.
    pub fn on_datagram(&mut self, buf: &[u8]) -> Vec<RecoveredUnit> {
        self.stats.datagrams_received += 1;
        self.stats.bytes_received += buf.len() as u64;

        let dgram = match Datagram::parse(buf) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, len = buf.len(), "dropping malformed datagram");
                self.stats.malformed_dropped += 1;
                return Vec::new();
            }
        };

        let outcome = decoder::apply(&dgram, self.rx_seq, &mut self.rx_history);
        self.rx_seq = outcome.next_rx_seq;

        match dgram.recovery {
            ErrorRecovery::Secondary(_) => {
                self.stats.recovered_redundancy += outcome.recovered as u64;
            }
            ErrorRecovery::Fec { .. } => {
                self.stats.recovered_fec += outcome.recovered as u64;
            }
        }
        self.stats.units_delivered += outcome.units.len() as u64;

        outcome.units
    }

    /// Next transmit sequence number (unbounded; wire field wraps).
    pub fn tx_sequence(&self) -> u64 {
        self.tx_seq
    }

    /// Next expected receive sequence number.
    pub fn rx_sequence(&self) -> u64 {
        self.rx_seq
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Largest datagram the remote side accepts.
    pub fn far_max_datagram(&self) -> usize {
        self.config.far_max_datagram
    }

    /// Record the remote side's advertised maximum datagram size.
    pub fn set_far_max_datagram(&mut self, max: usize) {
        self.config.far_max_datagram = max.clamp(100, LOCAL_MAX_DATAGRAM);
    }

    pub fn local_max_datagram(&self) -> usize {
        self.config.local_max_datagram
    }
}
