//! Single-threaded multiplexed TCP server.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};
use vab_core::{ModelProvider, VabError};

use crate::config::ServerConfig;
use crate::frame::{self, Frame, Response};
use crate::poller::{ConnToken, PollEvent, PollTick, Poller, ProbePoller};
use crate::processor::FrameProcessor;

/// Outcome of one server tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTick {
    /// The poll elapsed with nothing to do.
    Idle,
    /// Readiness events were handled.
    Served {
        /// Connections accepted this tick.
        accepted: usize,
        /// Frames processed this tick.
        frames: usize,
        /// Connections closed this tick.
        closed: usize,
    },
}

struct Connection {
    stream: TcpStream,
    peer: String,
    inbox: Vec<u8>,
}

/// TCP server hosting a model provider behind the native wire protocol.
///
/// Single-threaded and cooperative: every public entry runs on the
/// caller's thread, one tick at a time. Frames from one connection are
/// processed strictly in arrival order; the server performs no
/// application logic beyond dispatching to its provider.
pub struct TcpVabServer<P, K = ProbePoller> {
    processor: FrameProcessor<P>,
    poller: K,
    config: ServerConfig,
    connections: FxHashMap<ConnToken, Connection>,
    scratch: Vec<u8>,
}

impl<P: ModelProvider> TcpVabServer<P, ProbePoller> {
    /// Binds and listens per the config. The only startup-aborting
    /// failures of the server are reported here.
    ///
    /// # Errors
    ///
    /// `Transport` when the listener cannot be set up.
    pub fn init(config: ServerConfig, provider: P) -> Result<Self, VabError> {
        let poller = ProbePoller::bind(config.listen, config.poll_interval)?;
        info!(listen = %config.listen, "server listening");
        Ok(Self::with_poller(config, provider, poller))
    }
}

impl<P: ModelProvider, K: Poller> TcpVabServer<P, K> {
    /// Server over an explicit readiness source.
    pub fn with_poller(config: ServerConfig, provider: P, poller: K) -> Self {
        Self {
            processor: FrameProcessor::new(provider),
            poller,
            connections: FxHashMap::default(),
            scratch: vec![0u8; config.max_frame],
            config,
        }
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.poller.local_addr()
    }

    /// Borrows the frame processor, and through it the provider.
    pub fn processor(&self) -> &FrameProcessor<P> {
        &self.processor
    }

    /// Mutably borrows the frame processor.
    pub fn processor_mut(&mut self) -> &mut FrameProcessor<P> {
        &mut self.processor
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs one loop iteration: wait for readiness, accept everything
    /// pending, service every readable connection.
    ///
    /// # Errors
    ///
    /// Only fatal poll failures. Provider errors become error responses
    /// and connection failures close that one connection.
    pub fn tick(&mut self) -> Result<ServerTick, VabError> {
        match self.poller.wait(self.config.poll_timeout)? {
            PollTick::Idle => Ok(ServerTick::Idle),
            PollTick::Ready(events) => {
                let mut accepted = 0;
                let mut frames = 0;
                let mut closed = 0;
                for event in events {
                    match event {
                        PollEvent::Incoming(stream) => {
                            if self.admit(stream) {
                                accepted += 1;
                            }
                        }
                        PollEvent::Readable(token) => {
                            let (served, dropped) = self.service(token);
                            frames += served;
                            if dropped {
                                closed += 1;
                            }
                        }
                    }
                }
                Ok(ServerTick::Served {
                    accepted,
                    frames,
                    closed,
                })
            }
        }
    }

    /// Runs ticks until `stop` is set, then closes all connections.
    ///
    /// # Errors
    ///
    /// Returns the first fatal poll failure, after closing.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<(), VabError> {
        while !stop.load(Ordering::Relaxed) {
            match self.tick() {
                Ok(ServerTick::Idle) => {}
                Ok(ServerTick::Served {
                    accepted,
                    frames,
                    closed,
                }) => debug!(accepted, frames, closed, "tick served"),
                Err(err) => {
                    error!(error = %err, "fatal poll failure");
                    self.close();
                    return Err(err);
                }
            }
        }
        self.close();
        Ok(())
    }

    /// Drains and closes every connection.
    pub fn close(&mut self) {
        let tokens: Vec<ConnToken> = self.connections.keys().copied().collect();
        for token in tokens {
            self.drop_connection(token);
        }
        info!("server closed");
    }

    fn admit(&mut self, stream: TcpStream) -> bool {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        if let Err(err) = stream.set_nonblocking(true) {
            warn!(peer = %peer, error = %err, "dropping connection, cannot configure socket");
            return false;
        }
        match self.poller.register(&stream) {
            Ok(token) => {
                info!(peer = %peer, "connection accepted");
                self.connections.insert(
                    token,
                    Connection {
                        stream,
                        peer,
                        inbox: Vec::new(),
                    },
                );
                true
            }
            Err(err) => {
                warn!(peer = %peer, error = %err, "dropping connection, cannot watch socket");
                false
            }
        }
    }

    // One chunk read, then every complete frame in arrival order.
    fn service(&mut self, token: ConnToken) -> (usize, bool) {
        // Events can refer to a connection closed earlier in this tick.
        let Some(conn) = self.connections.get_mut(&token) else {
            return (0, false);
        };

        let mut frames = 0;
        let mut close = false;
        match conn.stream.read(&mut self.scratch) {
            Ok(0) => {
                info!(peer = %conn.peer, "connection closed by peer");
                close = true;
            }
            Ok(read) => conn.inbox.extend_from_slice(&self.scratch[..read]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(peer = %conn.peer, error = %err, "read failed, closing connection");
                close = true;
            }
        }

        while !close {
            let record = match frame::split_record(&conn.inbox, self.config.max_frame) {
                Ok(None) => break,
                Ok(Some((body, consumed))) => {
                    let body = body.to_vec();
                    conn.inbox.drain(..consumed);
                    body
                }
                Err(err) => {
                    warn!(peer = %conn.peer, error = %err, "unrecoverable framing, closing connection");
                    close = true;
                    break;
                }
            };

            let response = match Frame::decode(&record) {
                Ok(request) => self.processor.process(&request),
                // Record boundaries are intact, so answer and resume.
                Err(err) => Response::error(&err.to_string()),
            };
            match respond(&mut conn.stream, &response) {
                Ok(()) => frames += 1,
                Err(err) => {
                    warn!(peer = %conn.peer, error = %err, "write failed, closing connection");
                    close = true;
                }
            }
        }

        if close {
            self.drop_connection(token);
        }
        (frames, close)
    }

    fn drop_connection(&mut self, token: ConnToken) {
        self.poller.deregister(token);
        if let Some(conn) = self.connections.remove(&token) {
            let _ = conn.stream.shutdown(Shutdown::Both);
        }
    }
}

fn respond(stream: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let record = response
        .encode()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    write_all_retry(stream, &record)
}

// A full kernel buffer surfaces as WouldBlock on a nonblocking socket;
// retry until the record is out.
fn write_all_retry(stream: &mut TcpStream, mut bytes: &[u8]) -> std::io::Result<()> {
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
            Ok(written) => bytes = &bytes[written..],
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
