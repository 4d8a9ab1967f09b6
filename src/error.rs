//! Error types for the voice chat client

use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::MessageKind;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker thread failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Timed out waiting for audio")]
    Timeout,

    #[error("Audio stream closed")]
    Disconnected,

    #[error("Buffer overflow")]
    BufferOverflow,

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Datagram decode failures. Always a silent drop for the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty datagram")]
    EmptyDatagram,

    #[error("Unknown header byte: {0}")]
    UnknownHeader(u8),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Could not resolve address: {0}")]
    Resolve(String),
}

/// Reasons a handshake attempt fails
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("No reply before timeout")]
    Timeout,

    #[error("Reply came from {actual}, expected {expected}")]
    UnexpectedSource {
        expected: SocketAddr,
        actual: SocketAddr,
    },

    #[error("Reply was {0:?}, expected Handshake")]
    UnexpectedKind(MessageKind),

    #[error("Reply payload {0:?} is not an acknowledgment")]
    UnexpectedPayload(String),

    #[error("Undecodable reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session already closed")]
    InvalidState,
}

impl HandshakeError {
    /// Map a receive error, folding the platform's timeout kinds into `Timeout`.
    pub fn from_recv(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
