//! Readiness polling behind the server loop.
//!
//! The server never touches an OS multiplexing primitive directly; it asks
//! a [`Poller`] which sockets want attention. The portable implementation
//! here emulates readiness with a non-blocking accept drain plus one-byte
//! `peek` probes on registered connections, retried on a short interval
//! until the wait deadline.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::debug;
use vab_core::VabError;

/// Handle for a connection registered with a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnToken(u64);

/// A single readiness event.
#[derive(Debug)]
pub enum PollEvent {
    /// A freshly accepted connection.
    Incoming(TcpStream),
    /// A registered connection has data or an EOF to read.
    Readable(ConnToken),
}

/// Outcome of one wait.
#[derive(Debug)]
pub enum PollTick {
    /// The wait elapsed without any readiness event. A normal idle tick,
    /// not a failure.
    Idle,
    /// At least one socket wants attention.
    Ready(Vec<PollEvent>),
}

/// Readiness source for the server loop.
pub trait Poller {
    /// Starts watching a connection. The poller keeps its own handle on
    /// the socket; the caller retains ownership of the stream.
    ///
    /// # Errors
    ///
    /// `Transport` when the socket handle cannot be duplicated.
    fn register(&mut self, stream: &TcpStream) -> Result<ConnToken, VabError>;

    /// Stops watching a connection.
    fn deregister(&mut self, token: ConnToken);

    /// Waits up to `timeout` for readiness.
    ///
    /// # Errors
    ///
    /// `Transport` on a fatal poll failure. An elapsed timeout is reported
    /// as [`PollTick::Idle`], never as an error.
    fn wait(&mut self, timeout: Duration) -> Result<PollTick, VabError>;

    /// The address the listening socket is bound to.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Portable poller over a non-blocking listener and `peek` probes.
#[derive(Debug)]
pub struct ProbePoller {
    listener: TcpListener,
    probes: FxHashMap<ConnToken, TcpStream>,
    next_token: u64,
    poll_interval: Duration,
}

impl ProbePoller {
    /// Binds the listening socket and prepares it for non-blocking
    /// accepts. Failures here abort server startup.
    ///
    /// # Errors
    ///
    /// `Transport` when binding or configuring the listener fails.
    pub fn bind(listen: SocketAddr, poll_interval: Duration) -> Result<Self, VabError> {
        let listener =
            TcpListener::bind(listen).map_err(|err| VabError::transport("bind", &err))?;
        listener
            .set_nonblocking(true)
            .map_err(|err| VabError::transport("listener nonblocking", &err))?;
        Ok(Self {
            listener,
            probes: FxHashMap::default(),
            next_token: 0,
            poll_interval,
        })
    }

    fn drain_accepts(&self, events: &mut Vec<PollEvent>) -> Result<(), VabError> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "incoming connection");
                    events.push(PollEvent::Incoming(stream));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(VabError::transport("accept", &err)),
            }
        }
    }

    fn probe_connections(&self, events: &mut Vec<PollEvent>) {
        let mut probe = [0u8; 1];
        for (&token, stream) in &self.probes {
            match stream.peek(&mut probe) {
                // Data available, or EOF on a zero-length peek. Read errors
                // surface when the server actually reads.
                Ok(_) => events.push(PollEvent::Readable(token)),
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => events.push(PollEvent::Readable(token)),
            }
        }
    }
}

impl Poller for ProbePoller {
    fn register(&mut self, stream: &TcpStream) -> Result<ConnToken, VabError> {
        let probe = stream
            .try_clone()
            .map_err(|err| VabError::transport("clone probe handle", &err))?;
        let token = ConnToken(self.next_token);
        self.next_token += 1;
        self.probes.insert(token, probe);
        Ok(token)
    }

    fn deregister(&mut self, token: ConnToken) {
        self.probes.remove(&token);
    }

    fn wait(&mut self, timeout: Duration) -> Result<PollTick, VabError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut events = Vec::new();
            self.drain_accepts(&mut events)?;
            self.probe_connections(&mut events);
            if !events.is_empty() {
                return Ok(PollTick::Ready(events));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(PollTick::Idle);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}
