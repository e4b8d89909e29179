//! # udptl-transport
//!
//! UDPTL (T.38 Annex B) fax transport codec: carries opaque IFP units
//! over unreliable UDP and recovers from packet loss without
//! retransmission.
//!
//! PER-style variable-length wire fields, a 16-slot circular packet
//! history per direction, and two interchangeable loss-recovery side
//! channels — sequence redundancy and XOR forward error correction.
//!
//! ## Crate structure
//!
//! - [`per`] — PER length determinants and open-type fields
//! - [`history`] — fixed 16-slot transmit/receive arenas
//! - [`encoder`] — outbound datagram assembly (`build_packet`)
//! - [`decoder`] — datagram validation and loss recovery
//! - [`session`] — per-leg state composing the codec
//! - [`stats`] — serializable session counters
//! - [`error`] — datagram error taxonomy
//!
//! This crate is pure logic — no sockets, no timers, no threads. The
//! companion `udptl-net` crate owns the I/O.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod history;
pub mod per;
pub mod session;
pub mod stats;

pub use decoder::{Datagram, ErrorRecovery, RecoveredUnit};
pub use error::ParseError;
pub use session::{ErrorCorrection, Session, SessionConfig};
pub use stats::SessionStats;
