//! # LAN Voice Chat
//!
//! Real-time voice client speaking a tiny datagram protocol to a relay endpoint.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              CLIENT                                  │
//! │                                                                      │
//! │  ┌────────────┐    ┌──────────────────────────┐                      │
//! │  │ Microphone │───▶│ Transmit Loop            │                      │
//! │  └────────────┘    │ (network::sender)        │                      │
//! │                    │  RMS gate → ClientData   │                      │
//! │                    │  every 100 → NowConnected│                      │
//! │                    │  cancel → Disconnection  │──┐                   │
//! │                    └──────────────────────────┘  │                   │
//! │                                                  ▼                   │
//! │                                   ┌──────────────────────────┐       │
//! │                                   │ codec + UdpTransport     │◀─────▶│── UDP ──▶ relay
//! │                                   └──────────────────────────┘       │
//! │                                                  │                   │
//! │  ┌────────────┐    ┌──────────────────────────┐  │                   │
//! │  │  Speaker   │◀───│ Receive Loop             │◀─┘                   │
//! │  └────────────┘    │ (network::receiver)      │                      │
//! │  ┌────────────┐    │  ClientData → playback   │                      │
//! │  │  Roster    │◀───│  NowConnected → roster   │                      │
//! │  └────────────┘    └──────────────────────────┘                      │
//! │                                                                      │
//! │  Session (connection state, cancel token, stats) shared by both      │
//! │  loops; VoiceClient drives handshake, startup and teardown.          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod roster;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use client::VoiceClient;
pub use error::{Error, Result};
pub use session::{CancelToken, Session};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Capture/playback sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 20_000;

    /// Samples per audio frame (16-bit mono)
    pub const FRAME_SAMPLES: usize = 512;

    /// Bytes per sample of the wire PCM format
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// RMS energy at which a frame counts as speech
    pub const DEFAULT_VAD_THRESHOLD: f64 = 1000.0;

    /// Captured frames between two liveness probes
    pub const DEFAULT_LIVENESS_INTERVAL: u32 = 100;

    /// Receive buffer size, larger than any expected datagram
    pub const MAX_DATAGRAM_SIZE: usize = 4096;

    /// Bounded wait for the handshake reply
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Receive timeout used by the steady-state receive loop
    pub const DEFAULT_RECEIVE_POLL: Duration = Duration::from_millis(200);

    /// Playback queue depth (in frames)
    pub const PLAYBACK_QUEUE_FRAMES: usize = 32;
}
