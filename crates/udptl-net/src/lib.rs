//! # udptl-net
//!
//! Transport shim around [`udptl_transport`]: binds UDP sockets from a
//! configured port range, tracks the remote peer (re-learning it behind
//! NAT), bridges two fax legs, and loads the process-wide session
//! configuration.
//!
//! ## Crate structure
//!
//! - [`config`] — TOML session configuration, clamped at load
//! - [`endpoint`] — one bound socket + session per fax leg
//! - [`bridge`] — two-endpoint unit forwarding
//!
//! All I/O is nonblocking; the host event loop decides when to poll.

pub mod bridge;
pub mod config;
pub mod endpoint;

pub use bridge::Bridge;
pub use config::{NetConfig, TapConfig, TapFilter};
pub use endpoint::Endpoint;
