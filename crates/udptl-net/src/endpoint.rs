//! # UDP Endpoint
//!
//! Binds one nonblocking UDP socket per fax leg and drives a
//! [`Session`] from the host event loop. The endpoint owns the session
//! and the peer address; the session never reaches back into the
//! transport.
//!
//! Loop contract: the host calls [`Endpoint::poll`] when the socket is
//! readable and [`Endpoint::send`] to transmit a unit. Neither call
//! blocks; a drained socket simply ends the poll.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use anyhow::{bail, Context};
use rand::RngExt;
use tracing::{debug, info, trace, warn};
use udptl_transport::{RecoveredUnit, Session};

use crate::config::{NetConfig, TapFilter};

/// Room for the largest legal datagram plus its side channel.
const RECV_BUF_LEN: usize = 4096;

/// One bound UDPTL socket and its session state.
#[derive(Debug)]
pub struct Endpoint {
    socket: UdpSocket,
    session: Session,
    local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    nat: bool,
    tap: Option<TapFilter>,
}

impl Endpoint {
    /// Bind on the wildcard address within the configured port range.
    pub fn bind(config: &NetConfig) -> anyhow::Result<Self> {
        Self::bind_ip(config, IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Bind on a specific local address within the configured port
    /// range, scanning from a random starting port so concurrent legs
    /// spread across the range.
    pub fn bind_ip(config: &NetConfig, ip: IpAddr) -> anyhow::Result<Self> {
        let socket = bind_in_range(config, ip)?;
        socket
            .set_nonblocking(true)
            .context("setting socket nonblocking")?;
        if config.disable_checksums {
            // SO_NO_CHECK has no portable socket API; accept the flag
            // but keep checksums on.
            warn!("disabling UDP checksums is not supported on this platform");
        }
        let local_addr = socket.local_addr().context("reading bound address")?;
        debug!(%local_addr, "UDPTL endpoint bound");

        Ok(Endpoint {
            socket,
            session: Session::new(config.session_config()),
            local_addr,
            peer: None,
            nat: false,
            tap: config.tap_filter(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Forget the peer; inbound datagrams are ignored until a new one
    /// is set (or NAT mode learns one).
    pub fn stop(&mut self) {
        self.peer = None;
    }

    /// Follow the far end when datagrams arrive from an unexpected
    /// source (the peer sits behind a NAT and its visible address is
    /// only known once it talks to us).
    pub fn set_nat(&mut self, nat: bool) {
        self.nat = nat;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Encode and transmit one IFP unit. Without a peer, or for an
    /// empty unit, this is a silent no-op. Socket-level send failures
    /// are logged, not fatal — the next unit may well get through.
    pub fn send(&mut self, ifp: &[u8]) -> anyhow::Result<()> {
        let Some(peer) = self.peer else {
            trace!("no peer yet; dropping outbound unit");
            return Ok(());
        };
        if ifp.is_empty() {
            return Ok(());
        }

        let seq = self.session.tx_sequence();
        let wire = self.session.send(ifp)?;
        if self.tap.as_ref().is_some_and(|t| t.matches(peer)) {
            info!(%peer, seq, len = wire.len(), "sent UDPTL datagram");
        }
        if let Err(e) = self.socket.send_to(&wire, peer) {
            warn!(%peer, error = %e, "UDPTL transmission error");
        }
        Ok(())
    }

    /// Drain every ready datagram, returning all recovered units in
    /// arrival/recovery order. Returns when the socket would block.
    pub fn poll(&mut self) -> anyhow::Result<Vec<RecoveredUnit>> {
        let mut buf = [0u8; RECV_BUF_LEN];
        let mut units = Vec::new();

        loop {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "UDPTL read error");
                    return Err(e).context("receiving datagram");
                }
            };

            // Until the far end is known there is nowhere to reply;
            // NAT mode treats the first/changed source as the peer.
            match self.peer {
                None => {
                    if self.nat {
                        info!(%from, "learned peer address");
                        self.peer = Some(from);
                    } else {
                        trace!(%from, "datagram before peer is set; ignoring");
                        continue;
                    }
                }
                Some(peer) if self.nat && peer != from => {
                    debug!(old = %peer, new = %from, "NAT peer address changed");
                    self.peer = Some(from);
                }
                _ => {}
            }

            if self.tap.as_ref().is_some_and(|t| t.matches(from)) {
                let seq = u16::from_be_bytes([buf[0], buf[1]]);
                info!(%from, seq, len, "got UDPTL datagram");
            }

            units.extend(self.session.on_datagram(&buf[..len]));
        }

        Ok(units)
    }
}

/// Scan the configured port range for a free port, starting from a
/// random position and wrapping once.
fn bind_in_range(config: &NetConfig, ip: IpAddr) -> anyhow::Result<UdpSocket> {
    let step: u16 = if config.even_ports_only { 2 } else { 1 };
    let span = u32::from(config.port_end - config.port_start) + 1;

    let mut port = config.port_start + rand::rng().random_range(0..span) as u16;
    if config.even_ports_only && port & 1 == 1 {
        port = if port < config.port_end { port + 1 } else { config.port_start };
    }

    let first = port;
    loop {
        match UdpSocket::bind((ip, port)) {
            Ok(socket) => return Ok(socket),
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                port = match port.checked_add(step) {
                    Some(p) if p <= config.port_end => p,
                    _ => config.port_start,
                };
                if port == first {
                    bail!(
                        "no UDPTL ports remaining in {}-{}",
                        config.port_start,
                        config.port_end
                    );
                }
            }
            Err(e) => {
                return Err(e).with_context(|| format!("binding {ip}:{port}"));
            }
        }
    }
}
