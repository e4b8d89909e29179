//! # Session Configuration
//!
//! Loaded once per process from TOML, then clamped to safe bounds —
//! configuration mistakes warn and degrade, they never abort a fax
//! service. The result is an immutable object handed to each endpoint
//! at construction; nothing here is consulted per datagram.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;
use udptl_transport::session::{ErrorCorrection, SessionConfig};

/// Default UDP port range when none (or a nonsensical one) is given.
const DEFAULT_PORT_START: u16 = 4500;
const DEFAULT_PORT_END: u16 = 4999;

/// Ports below this are never used for fax media.
const MIN_PORT: u16 = 1024;

/// Bounds on the negotiable datagram size.
const MIN_MAX_DATAGRAM: usize = 100;
const MAX_MAX_DATAGRAM: usize = 1400;

// ─── Config Surface ─────────────────────────────────────────────────────────

/// Process-wide UDPTL configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// First UDP port to try.
    pub port_start: u16,
    /// Last UDP port to try (inclusive).
    pub port_end: u16,
    /// Restrict binding to even ports.
    pub even_ports_only: bool,
    /// Request UDP checksum-free sockets where the platform offers it.
    pub disable_checksums: bool,
    /// Outbound error-recovery scheme.
    pub error_correction: ErrorCorrection,
    /// FEC group stride.
    pub fec_span: usize,
    /// Redundancy depth / FEC groups per datagram.
    pub fec_entries: usize,
    /// Largest datagram accepted locally and advertised to the peer.
    pub max_datagram: usize,
    /// Datagram inspection tap.
    pub debug: TapConfig,
}

/// Debug tap: when enabled, datagrams to/from matching peers are logged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    pub tap: bool,
    /// Optional `host` or `host:port` filter; absent means every peer.
    pub peer: Option<String>,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            port_start: DEFAULT_PORT_START,
            port_end: DEFAULT_PORT_END,
            even_ports_only: false,
            disable_checksums: false,
            error_correction: ErrorCorrection::None,
            fec_span: 3,
            fec_entries: 3,
            max_datagram: MAX_MAX_DATAGRAM,
            debug: TapConfig::default(),
        }
    }
}

impl NetConfig {
    /// Parse a TOML document and clamp it to safe bounds.
    pub fn from_toml(doc: &str) -> anyhow::Result<Self> {
        let config: NetConfig = toml::from_str(doc).context("invalid UDPTL configuration")?;
        Ok(config.normalized())
    }

    /// Load and clamp a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&doc)
    }

    /// Clamp every field to a usable value, warning on each adjustment.
    pub fn normalized(mut self) -> Self {
        if self.port_start < MIN_PORT {
            warn!(requested = self.port_start, "ports under 1024 are not usable; raising");
            self.port_start = MIN_PORT;
        }
        if self.port_end < MIN_PORT {
            warn!(requested = self.port_end, "ports under 1024 are not usable; raising");
            self.port_end = MIN_PORT;
        }
        if self.port_start >= self.port_end {
            warn!(
                start = self.port_start,
                end = self.port_end,
                "unreasonable port range; using {DEFAULT_PORT_START}-{DEFAULT_PORT_END}"
            );
            self.port_start = DEFAULT_PORT_START;
            self.port_end = DEFAULT_PORT_END;
        }
        if self.even_ports_only {
            if self.port_start & 1 == 1 {
                self.port_start += 1;
                warn!(using = self.port_start, "even ports requested; raising odd port_start");
            }
            if self.port_end & 1 == 1 {
                self.port_end -= 1;
                warn!(using = self.port_end, "even ports requested; lowering odd port_end");
            }
        }
        let max = self.max_datagram.clamp(MIN_MAX_DATAGRAM, MAX_MAX_DATAGRAM);
        if max != self.max_datagram {
            warn!(requested = self.max_datagram, using = max, "max_datagram out of range");
            self.max_datagram = max;
        }
        // Span/entries get a first clamp here; the session applies the
        // final window-product bound.
        if self.error_correction != ErrorCorrection::None {
            let span = self.fec_span.clamp(1, 5);
            if span != self.fec_span {
                warn!(requested = self.fec_span, using = span, "fec_span out of range");
                self.fec_span = span;
            }
            let entries = self.fec_entries.clamp(1, 5);
            if entries != self.fec_entries {
                warn!(requested = self.fec_entries, using = entries, "fec_entries out of range");
                self.fec_entries = entries;
            }
        }
        self
    }

    /// Derive the per-session codec configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            error_correction: self.error_correction,
            fec_span: self.fec_span,
            fec_entries: self.fec_entries,
            local_max_datagram: self.max_datagram,
            far_max_datagram: self.max_datagram,
        }
    }

    /// Build the datagram tap filter, if tapping is enabled.
    pub fn tap_filter(&self) -> Option<TapFilter> {
        if !self.debug.tap {
            return None;
        }
        let filter = match self.debug.peer.as_deref() {
            None => TapFilter { peer: None },
            Some(spec) => match TapFilter::parse_peer(spec) {
                Some(peer) => TapFilter { peer: Some(peer) },
                None => {
                    warn!(spec, "unparseable tap peer filter; tapping everything");
                    TapFilter { peer: None }
                }
            },
        };
        Some(filter)
    }
}

// ─── Tap Filter ─────────────────────────────────────────────────────────────

/// Matches datagram peers against the configured tap target.
#[derive(Debug, Clone)]
pub struct TapFilter {
    /// Address to match; port 0 matches any port. `None` matches all.
    peer: Option<(IpAddr, u16)>,
}

impl TapFilter {
    fn parse_peer(spec: &str) -> Option<(IpAddr, u16)> {
        if let Ok(addr) = spec.parse::<SocketAddr>() {
            return Some((addr.ip(), addr.port()));
        }
        spec.parse::<IpAddr>().ok().map(|ip| (ip, 0))
    }

    /// Whether a datagram to/from `addr` should be dumped.
    pub fn matches(&self, addr: SocketAddr) -> bool {
        match self.peer {
            None => true,
            Some((ip, port)) => addr.ip() == ip && (port == 0 || addr.port() == port),
        }
    }
}
