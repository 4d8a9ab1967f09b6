//! Receive loop
//!
//! Reads datagrams until the session leaves the connected state. ClientData
//! goes to playback, NowConnected payloads go to the roster callback
//! untouched, everything else is ignored. A bad datagram only ever costs
//! that datagram.

use std::io;
use std::sync::Arc;

use crate::audio::AudioSink;
use crate::codec::decode;
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::DecodeError;
use crate::network::udp::{is_timeout, Transport};
use crate::protocol::MessageKind;
use crate::session::Session;

/// Why a receive iteration produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Read timeout elapsed; used to re-check the session state.
    Timeout,
    /// Transport error, including the one caused by shutdown.
    Io(io::ErrorKind),
    /// Header matched no message kind.
    Decode(DecodeError),
    /// The playback device refused the frame.
    Playback,
}

/// Outcome of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStep {
    Played,
    Roster,
    Ignored(MessageKind),
    Dropped(DropReason),
}

/// Network-side loop of a session
pub struct ReceiveLoop<T, S, R>
where
    T: Transport,
    S: AudioSink,
    R: FnMut(&[u8]) + Send,
{
    session: Arc<Session<T>>,
    sink: S,
    on_roster: R,
    buf: Vec<u8>,
}

impl<T, S, R> ReceiveLoop<T, S, R>
where
    T: Transport,
    S: AudioSink,
    R: FnMut(&[u8]) + Send,
{
    pub fn new(session: Arc<Session<T>>, sink: S, on_roster: R) -> Self {
        Self {
            session,
            sink,
            on_roster,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// Run while the session is connected.
    pub fn run(mut self) -> S {
        tracing::debug!("Receive loop started");

        while self.session.is_connected() {
            if let ReceiveStep::Dropped(reason) = self.step() {
                if reason != DropReason::Timeout {
                    tracing::trace!("Dropped datagram: {:?}", reason);
                }
            }
        }

        tracing::debug!("Receive loop finished");
        self.sink
    }

    /// Receive and dispatch one datagram.
    pub fn step(&mut self) -> ReceiveStep {
        let (len, _from) = match self.session.transport().recv_from(&mut self.buf) {
            Ok(received) => received,
            Err(e) if is_timeout(&e) => return ReceiveStep::Dropped(DropReason::Timeout),
            Err(e) => return ReceiveStep::Dropped(DropReason::Io(e.kind())),
        };

        let stats = self.session.stats();
        stats.record_received();

        let message = match decode(&self.buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                stats.record_dropped();
                return ReceiveStep::Dropped(DropReason::Decode(e));
            }
        };

        match message.kind {
            MessageKind::ClientData => match self.sink.write_frame(&message.payload) {
                Ok(()) => {
                    stats.record_played();
                    ReceiveStep::Played
                }
                Err(e) => {
                    tracing::trace!("Playback rejected frame: {}", e);
                    stats.record_dropped();
                    ReceiveStep::Dropped(DropReason::Playback)
                }
            },
            MessageKind::NowConnected => {
                (self.on_roster)(&message.payload);
                ReceiveStep::Roster
            }
            kind @ (MessageKind::Handshake | MessageKind::Disconnection) => {
                ReceiveStep::Ignored(kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_for, MockTransport, RecordingSink};
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::thread;
    use std::time::Duration;

    fn server() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn connected_session() -> (Arc<Session<MockTransport>>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        transport.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let session = Arc::new(Session::new("alice", server(), transport.clone()));
        assert!(session.mark_connected());
        (session, transport)
    }

    #[test]
    fn test_dispatch_by_kind() {
        let (session, transport) = connected_session();
        let sink = RecordingSink::new();
        let rosters = Arc::new(Mutex::new(Vec::new()));
        let rosters_cb = rosters.clone();
        let mut rx = ReceiveLoop::new(session, sink.clone(), move |payload: &[u8]| {
            rosters_cb.lock().push(payload.to_vec())
        });

        transport.inject(&[0, 1, 2], server());
        transport.inject(b"\x35alice;bob", server());
        transport.inject(b"\x33ok", server());
        transport.inject(b"\x34bob", server());

        assert_eq!(rx.step(), ReceiveStep::Played);
        assert_eq!(rx.step(), ReceiveStep::Roster);
        assert_eq!(rx.step(), ReceiveStep::Ignored(MessageKind::Handshake));
        assert_eq!(rx.step(), ReceiveStep::Ignored(MessageKind::Disconnection));

        assert_eq!(sink.frames(), vec![vec![1, 2]]);
        assert_eq!(*rosters.lock(), vec![b"alice;bob".to_vec()]);
    }

    #[test]
    fn test_malformed_datagrams_never_stop_the_loop() {
        let (session, transport) = connected_session();
        let sink = RecordingSink::new();
        let rx = ReceiveLoop::new(session.clone(), sink.clone(), |_: &[u8]| {});

        transport.inject(&[], server());
        transport.inject(&[99], server());
        transport.inject(&[255, 1, 2, 3], server());
        transport.inject_error(io::ErrorKind::ConnectionRefused);
        transport.inject(&[54, 0], server());
        transport.inject(&[7, 0x10, 0x20], server());

        let handle = thread::spawn(move || rx.run());

        assert!(wait_for(Duration::from_secs(2), || sink.frames().len() == 1));
        assert!(!handle.is_finished());

        session.mark_disconnected();
        handle.join().unwrap();

        assert_eq!(sink.frames(), vec![vec![0x10, 0x20]]);
        let stats = session.stats().snapshot();
        assert_eq!(stats.frames_played, 1);
        assert_eq!(stats.datagrams_dropped, 4);
    }

    #[test]
    fn test_stops_once_disconnected() {
        let (session, transport) = connected_session();
        let rx = ReceiveLoop::new(session.clone(), RecordingSink::new(), |_: &[u8]| {});

        let handle = thread::spawn(move || rx.run());
        thread::sleep(Duration::from_millis(30));

        session.mark_disconnected();
        session.close_transport();
        let sink = handle.join().unwrap();

        // A stray frame after the disconnect is never played
        transport.inject(&[0, 9, 9], server());
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn test_does_not_run_before_connect() {
        let transport = Arc::new(MockTransport::new());
        let session = Arc::new(Session::new("alice", server(), transport.clone()));
        transport.inject(&[0, 1, 2], server());

        let sink = ReceiveLoop::new(session, RecordingSink::new(), |_: &[u8]| {}).run();
        assert!(sink.frames().is_empty());
        assert_eq!(transport.pending_inbound(), 1);
    }
}
