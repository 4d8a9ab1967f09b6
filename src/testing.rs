//! Test doubles for the transport and audio seams

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{AudioFrame, AudioSink, AudioSource};
use crate::error::AudioError;
use crate::network::udp::Transport;

type Inbound = Result<(Vec<u8>, SocketAddr), io::ErrorKind>;

/// In-memory transport: records sends, replays injected datagrams.
pub struct MockTransport {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    inbound_tx: Sender<Inbound>,
    inbound_rx: Receiver<Inbound>,
    read_timeout: Mutex<Option<Duration>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        Self {
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx,
            read_timeout: Mutex::new(None),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queue a datagram for `recv_from`.
    pub fn inject(&self, datagram: &[u8], from: SocketAddr) {
        let _ = self.inbound_tx.send(Ok((datagram.to_vec(), from)));
    }

    /// Queue a receive error for `recv_from`.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        let _ = self.inbound_tx.send(Err(kind));
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().clone()
    }

    /// Header bytes of everything sent so far
    pub fn sent_headers(&self) -> Vec<u8> {
        self.sent.lock().iter().map(|(d, _)| d[0]).collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        *self.read_timeout.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound_rx.len()
    }
}

impl Transport for MockTransport {
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        self.sent.lock().push((datagram.to_vec(), target));
        Ok(datagram.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let deadline = self.read_timeout().map(|t| Instant::now() + t);

        loop {
            if self.is_closed() {
                return Err(io::ErrorKind::NotConnected.into());
            }

            match self.inbound_rx.recv_timeout(Duration::from_millis(5)) {
                Ok(Ok((datagram, from))) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    return Ok((n, from));
                }
                Ok(Err(kind)) => return Err(kind.into()),
                Err(RecvTimeoutError::Timeout) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(io::ErrorKind::WouldBlock.into());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::ErrorKind::NotConnected.into())
                }
            }
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        *self.read_timeout.lock() = timeout;
        Ok(())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Audio source replaying a fixed script, then silence
pub struct ScriptedSource {
    frames: VecDeque<AudioFrame>,
    frame_delay: Duration,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = AudioFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            frame_delay: Duration::ZERO,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Silence forever, paced like a capture device
    pub fn silence(frame_delay: Duration) -> Self {
        Self::new(Vec::new()).with_delay(frame_delay)
    }

    pub fn with_delay(mut self, frame_delay: Duration) -> Self {
        self.frame_delay = frame_delay;
        self
    }

    /// Shared count of `read_frame` calls
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl AudioSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.frame_delay.is_zero() {
            thread::sleep(self.frame_delay);
        }
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

/// Audio source that always fails
pub struct FailingSource;

impl AudioSource for FailingSource {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        Err(AudioError::Timeout)
    }
}

/// Sink recording every written frame
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }
}

impl AudioSink for RecordingSink {
    fn write_frame(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        self.frames.lock().push(pcm.to_vec());
        Ok(())
    }
}

/// Frame whose RMS equals `amplitude`
pub fn tone(amplitude: i16) -> AudioFrame {
    AudioFrame::new(vec![amplitude; crate::constants::FRAME_SAMPLES])
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
