//! Session lifecycle: handshake, the two loops, orderly teardown

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::{AudioSink, AudioSource};
use crate::config::AppConfig;
use crate::constants::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RECEIVE_POLL};
use crate::error::{Error, HandshakeError, Result};
use crate::network::{ReceiveLoop, TransmitLoop, TransmitSettings, Transport};
use crate::session::{CancelToken, Session, StatsSnapshot};

/// Timing and gate settings for one session
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub handshake_timeout: Duration,
    pub receive_poll: Duration,
    pub transmit: TransmitSettings,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            receive_poll: DEFAULT_RECEIVE_POLL,
            transmit: TransmitSettings::default(),
        }
    }
}

impl From<&AppConfig> for ClientOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            handshake_timeout: config.network.handshake_timeout(),
            receive_poll: config.network.receive_poll(),
            transmit: config.audio.transmit_settings(),
        }
    }
}

/// A connected voice session, ready to run
pub struct VoiceClient<T: Transport> {
    session: Arc<Session<T>>,
    options: ClientOptions,
}

impl<T: Transport> VoiceClient<T> {
    /// Handshake with `server` on a fresh session.
    ///
    /// One attempt; on failure the transport can be reused for another call.
    pub fn connect(
        name: &str,
        server: SocketAddr,
        transport: Arc<T>,
        options: ClientOptions,
    ) -> std::result::Result<Self, HandshakeError> {
        let session = Arc::new(Session::new(name, server, transport));
        session.attempt_handshake(options.handshake_timeout)?;

        Ok(Self { session, options })
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Token to hand to whatever delivers the interrupt
    pub fn cancel_token(&self) -> CancelToken {
        self.session.cancel_token()
    }

    /// Run both loops until cancellation has been handled.
    ///
    /// Blocks until the transmit loop has sent Disconnection and the receive
    /// loop has exited, then returns the session counters.
    pub fn run<A, S, R>(self, source: A, sink: S, on_roster: R) -> Result<StatsSnapshot>
    where
        A: AudioSource + 'static,
        S: AudioSink + 'static,
        R: FnMut(&[u8]) + Send + 'static,
    {
        let session = self.session;
        session
            .transport()
            .set_read_timeout(Some(self.options.receive_poll))?;

        let receiver = ReceiveLoop::new(session.clone(), sink, on_roster);
        let receive_handle = thread::Builder::new()
            .name("voice-receive".to_string())
            .spawn(move || {
                receiver.run();
            })?;

        let transmitter = TransmitLoop::new(session.clone(), source, self.options.transmit);
        let transmit_handle = thread::Builder::new()
            .name("voice-transmit".to_string())
            .spawn(move || {
                transmitter.run();
            });

        let transmit_result = match transmit_handle {
            Ok(handle) => handle
                .join()
                .map_err(|_| Error::Worker("transmit loop panicked".to_string())),
            Err(e) => Err(Error::Io(e)),
        };

        if transmit_result.is_err() {
            // Nobody sent Disconnection; still release the receiver
            session.mark_disconnected();
            session.close_transport();
        }

        let receive_result = receive_handle
            .join()
            .map_err(|_| Error::Worker("receive loop panicked".to_string()));

        transmit_result?;
        receive_result?;

        let stats = session.stats().snapshot();
        tracing::info!(
            "Session ended: {} datagrams sent ({} voice frames of {}), {} received, {} dropped",
            stats.datagrams_sent,
            stats.frames_captured - stats.frames_gated,
            stats.frames_captured,
            stats.datagrams_received,
            stats.datagrams_dropped
        );
        Ok(stats)
    }
}
