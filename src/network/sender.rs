//! Transmit loop
//!
//! Reads captured frames, sends the voiced ones as ClientData, probes the
//! endpoint with NowConnected on a fixed frame cadence, and performs the
//! disconnect when cancellation is observed.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::AudioSource;
use crate::codec::MessageEncoder;
use crate::constants::{DEFAULT_LIVENESS_INTERVAL, DEFAULT_VAD_THRESHOLD};
use crate::network::udp::Transport;
use crate::protocol::{MessageKind, LIVENESS_PROBE};
use crate::session::Session;

/// Pause after a failed device read before trying again
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Gate and cadence settings
#[derive(Debug, Clone, Copy)]
pub struct TransmitSettings {
    /// Frames with RMS at or above this are sent
    pub vad_threshold: f64,

    /// Frames between liveness probes; 0 disables probing
    pub liveness_interval: u32,
}

impl Default for TransmitSettings {
    fn default() -> Self {
        Self {
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
        }
    }
}

/// Outcome of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStep {
    /// Frame passed the gate and was sent (or the send was dropped).
    Voice,

    /// Frame was below the gate.
    Silence,

    /// The device produced no frame this time.
    ReadFailed,

    /// Cancellation observed; Disconnection sent and session closed.
    Disconnected,
}

/// Capture-side loop of a session
pub struct TransmitLoop<T: Transport, A: AudioSource> {
    session: Arc<Session<T>>,
    source: A,
    encoder: MessageEncoder,
    settings: TransmitSettings,
    frames_since_probe: u32,
}

impl<T: Transport, A: AudioSource> TransmitLoop<T, A> {
    pub fn new(session: Arc<Session<T>>, source: A, settings: TransmitSettings) -> Self {
        Self {
            session,
            source,
            encoder: MessageEncoder::new(),
            settings,
            frames_since_probe: 0,
        }
    }

    /// Run until cancellation has been handled.
    pub fn run(mut self) -> A {
        tracing::debug!("Transmit loop started");

        loop {
            match self.step() {
                TransmitStep::Disconnected => break,
                TransmitStep::ReadFailed => thread::sleep(READ_RETRY_BACKOFF),
                TransmitStep::Voice | TransmitStep::Silence => {}
            }
        }

        tracing::debug!("Transmit loop finished");
        self.source
    }

    /// One iteration. Send failures are counted and swallowed.
    pub fn step(&mut self) -> TransmitStep {
        if self.session.is_cancel_requested() {
            self.disconnect();
            return TransmitStep::Disconnected;
        }

        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::trace!("Audio read failed: {}", e);
                return TransmitStep::ReadFailed;
            }
        };

        let voiced = frame.rms() >= self.settings.vad_threshold;
        self.session.stats().record_frame(!voiced);

        if voiced {
            let datagram = self.encoder.encode(MessageKind::ClientData, &frame.to_pcm_bytes());
            if let Err(e) = self.session.send_datagram(datagram) {
                tracing::debug!("Dropped voice frame: {}", e);
            }
        }

        self.frames_since_probe += 1;
        if self.settings.liveness_interval > 0
            && self.frames_since_probe >= self.settings.liveness_interval
        {
            self.frames_since_probe = 0;
            self.send_probe();
        }

        if voiced {
            TransmitStep::Voice
        } else {
            TransmitStep::Silence
        }
    }

    fn send_probe(&mut self) {
        let datagram = self.encoder.encode(MessageKind::NowConnected, LIVENESS_PROBE);
        match self.session.send_datagram(datagram) {
            Ok(()) => self.session.stats().record_probe(),
            Err(e) => tracing::debug!("Dropped liveness probe: {}", e),
        }
    }

    /// Send Disconnection, flip the state, then unblock the receiver.
    fn disconnect(&mut self) {
        let datagram = self
            .encoder
            .encode(MessageKind::Disconnection, self.session.name().as_bytes());
        if let Err(e) = self.session.send_datagram(datagram) {
            tracing::warn!("Failed to send disconnection: {}", e);
        }

        self.session.mark_disconnected();
        self.session.close_transport();
        tracing::info!("Disconnected from {}", self.session.server());
    }
}
