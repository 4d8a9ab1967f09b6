//! UDP datagram transport

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// Datagram transport shared by both loops.
///
/// All methods take `&self`: one thread sends while another blocks in
/// `recv_from`.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram.
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Block for one datagram, honouring the read timeout.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// `None` blocks without bound.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Stop the transport; pending and later receives fail.
    fn shutdown(&self) -> io::Result<()>;
}

/// Whether an I/O error is a read timeout rather than a failure
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Resolve `host:port`, preferring IPv4.
pub fn resolve(address: &str) -> Result<SocketAddr, NetworkError> {
    let addrs: Vec<SocketAddr> = address
        .to_socket_addrs()
        .map_err(|e| NetworkError::Resolve(format!("{}: {}", address, e)))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| NetworkError::Resolve(address.to_string()))
}

/// Create a UDP socket configured for voice traffic
pub fn create_socket(bind_addr: SocketAddr, config: &NetworkConfig) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Some(size) = config.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    if let Some(size) = config.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }

    socket.bind(&bind_addr.into())?;
    Ok(socket.into())
}

/// [`Transport`] over a real UDP socket
pub struct UdpTransport {
    socket: std::net::UdpSocket,
    local_addr: SocketAddr,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Bind to the configured address, or to the unspecified address of
    /// the same family as `server`.
    pub fn bind_for(server: SocketAddr, config: &NetworkConfig) -> Result<Self, NetworkError> {
        let bind_addr = match config.bind_address {
            Some(addr) => addr,
            None if server.is_ipv4() => SocketAddr::from(([0u8; 4], 0)),
            None => SocketAddr::from(([0u16; 8], 0)),
        };
        Self::bind(bind_addr, config)
    }

    pub fn bind(bind_addr: SocketAddr, config: &NetworkConfig) -> Result<Self, NetworkError> {
        let socket = create_socket(bind_addr, config)
            .map_err(|e| NetworkError::BindFailed(format!("{}: {}", bind_addr, e)))?;
        Self::from_socket(socket)
    }

    /// Wrap an already bound socket
    pub fn from_socket(socket: std::net::UdpSocket) -> Result<Self, NetworkError> {
        let local_addr = socket
            .local_addr()
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

        tracing::debug!("UDP transport bound to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.socket.send_to(datagram, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.socket.recv_from(buf)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        SockRef::from(&self.socket).shutdown(Shutdown::Both)
    }
}
