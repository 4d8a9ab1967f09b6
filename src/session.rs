//! Session state shared by the transmit and receive loops
//!
//! A session goes `Pending → Connected → Closed` exactly once. Reconnecting
//! means building a new [`Session`]. The connection state and the cancel
//! flag are the only mutable fields; both are atomics, so neither loop ever
//! takes a lock.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::encode;
use crate::error::HandshakeError;
use crate::network::handshake;
use crate::network::udp::Transport;
use crate::protocol::MessageKind;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, handshake not yet accepted.
    Pending = 0,

    /// Handshake accepted; both loops may run.
    Connected = 1,

    /// Disconnected. Terminal.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Pending,
            1 => ConnectionState::Connected,
            _ => ConnectionState::Closed,
        }
    }
}

/// One-shot cancellation flag, cheap to clone and hand to a signal handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the first call.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-session traffic counters
#[derive(Debug, Default)]
pub struct SessionStats {
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
    frames_captured: AtomicU64,
    frames_gated: AtomicU64,
    probes_sent: AtomicU64,
    datagrams_received: AtomicU64,
    datagrams_dropped: AtomicU64,
    frames_played: AtomicU64,
}

impl SessionStats {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self, gated: bool) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        if gated {
            self.frames_gated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_probe(&self) {
        self.probes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_played(&self) {
        self.frames_played.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_gated: self.frames_gated.load(Ordering::Relaxed),
            probes_sent: self.probes_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub frames_captured: u64,
    pub frames_gated: u64,
    pub probes_sent: u64,
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub frames_played: u64,
}

/// A client's connection to one remote endpoint
pub struct Session<T: Transport> {
    /// Local identity sent in Handshake and Disconnection
    name: String,

    /// Endpoint every datagram goes to
    server: SocketAddr,

    transport: Arc<T>,

    state: AtomicU8,

    cancel: CancelToken,

    stats: SessionStats,
}

impl<T: Transport> Session<T> {
    pub fn new(name: impl Into<String>, server: SocketAddr, transport: Arc<T>) -> Self {
        Self {
            name: name.into(),
            server,
            transport,
            state: AtomicU8::new(ConnectionState::Pending as u8),
            cancel: CancelToken::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Send `Handshake{name}` and wait up to `timeout` for the endpoint's `ok`.
    ///
    /// One attempt only. On success the session is `Connected`; on failure it
    /// stays `Pending` and the caller decides whether to try again.
    pub fn attempt_handshake(&self, timeout: Duration) -> Result<(), HandshakeError> {
        match self.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => return Err(HandshakeError::InvalidState),
            ConnectionState::Pending => {}
        }

        handshake::exchange(self.transport.as_ref(), self.server, &self.name, timeout)?;

        if !self.mark_connected() {
            return Err(HandshakeError::InvalidState);
        }
        tracing::info!("Connected to {} as '{}'", self.server, self.name);
        Ok(())
    }

    /// `Pending → Connected`. Returns whether the session is now connected.
    pub fn mark_connected(&self) -> bool {
        match self.state.compare_exchange(
            ConnectionState::Pending as u8,
            ConnectionState::Connected as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(current) => current == ConnectionState::Connected as u8,
        }
    }

    /// Move to the terminal `Closed` state. Returns `true` for the call
    /// that performed the transition.
    pub fn mark_disconnected(&self) -> bool {
        let previous = self.state.swap(ConnectionState::Closed as u8, Ordering::SeqCst);
        previous != ConnectionState::Closed as u8
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Ask the transmit loop to disconnect at its next iteration.
    pub fn request_cancel(&self) -> bool {
        let first = self.cancel.cancel();
        if first {
            tracing::info!("Disconnect requested");
        }
        first
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle for whatever delivers the interrupt
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Encode and send one message to the endpoint.
    pub fn send(&self, kind: MessageKind, payload: &[u8]) -> io::Result<()> {
        self.send_datagram(&encode(kind, payload))
    }

    /// Send an already encoded datagram to the endpoint.
    pub fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        match self.transport.send_to(datagram, self.server) {
            Ok(n) => {
                self.stats.record_sent(n);
                Ok(())
            }
            Err(e) => {
                self.stats.record_send_error();
                Err(e)
            }
        }
    }

    /// Shut the transport down so a blocked receive returns.
    pub fn close_transport(&self) {
        if let Err(e) = self.transport.shutdown() {
            // Unconnected UDP sockets report ENOTCONN on some platforms
            tracing::debug!("Transport shutdown: {}", e);
        }
    }
}
