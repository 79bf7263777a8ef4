//! Client side of the native wire protocol.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use vab_core::{ElementPath, ElementProxy, VabError, Value};

use crate::frame::{Frame, Response, DEFAULT_FRAME_BUFFER};

/// Blocking client for one server connection.
///
/// Every call sends a single request record and waits for its response;
/// the protocol does not interleave, so concurrent use needs external
/// locking (see [`ConnectedProxy`]).
pub struct NativeConnector {
    stream: TcpStream,
    frame_buffer: usize,
}

impl NativeConnector {
    /// Connects to a server.
    ///
    /// # Errors
    ///
    /// `Transport` when the connection cannot be established.
    pub fn connect(addr: SocketAddr) -> Result<Self, VabError> {
        let stream = TcpStream::connect(addr).map_err(|err| VabError::transport("connect", &err))?;
        let _ = stream.set_nodelay(true);
        debug!(%addr, "connector attached");
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream. The stream must be blocking.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            frame_buffer: DEFAULT_FRAME_BUFFER,
        }
    }

    /// Resizes the scratch buffer for response reads. The response length
    /// prefix stays authoritative; larger bodies just take more reads.
    pub fn set_frame_buffer(&mut self, bytes: usize) {
        self.frame_buffer = bytes;
    }

    /// Reads the element at `path`.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn get(&mut self, path: &str) -> Result<Value, VabError> {
        let response = self.transact(&Frame::get(path))?;
        entity_or_null(&check(response)?)
    }

    /// Reads the element at `path` and returns the raw payload text,
    /// `"entity"` wrapper included.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn get_raw(&mut self, path: &str) -> Result<String, VabError> {
        let response = self.transact(&Frame::get(path))?;
        Ok(check(response)?.payload().unwrap_or_default().to_owned())
    }

    /// Overwrites the element at `path`.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn set(&mut self, path: &str, value: &Value) -> Result<(), VabError> {
        self.expect_success(&Frame::set(path, value)?)
    }

    /// Creates a new element at `path`.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn create(&mut self, path: &str, value: &Value) -> Result<(), VabError> {
        self.expect_success(&Frame::create(path, value)?)
    }

    /// Deletes the element at `path`.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn delete(&mut self, path: &str) -> Result<(), VabError> {
        self.expect_success(&Frame::delete(path))
    }

    /// Deletes the matching member from the collection at `path`.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn delete_value(&mut self, path: &str, value: &Value) -> Result<(), VabError> {
        self.expect_success(&Frame::delete_value(path, value)?)
    }

    /// Invokes the function at `path` and returns its result.
    ///
    /// # Errors
    ///
    /// Transport and framing failures, or the server-reported error.
    pub fn invoke(&mut self, path: &str, params: &[Value]) -> Result<Value, VabError> {
        let response = self.transact(&Frame::invoke(path, params)?)?;
        entity_or_null(&check(response)?)
    }

    fn expect_success(&mut self, frame: &Frame) -> Result<(), VabError> {
        let response = self.transact(frame)?;
        check(response).map(|_| ())
    }

    fn transact(&mut self, frame: &Frame) -> Result<Response, VabError> {
        let record = frame.encode()?;
        self.stream
            .write_all(&record)
            .map_err(|err| VabError::transport("send request", &err))?;
        let body = self.read_record()?;
        Response::decode(&body)
    }

    // Blocking read of one length-prefixed record. The length prefix is
    // authoritative; bodies larger than the scratch buffer arrive over
    // several reads.
    fn read_record(&mut self) -> Result<Vec<u8>, VabError> {
        let mut prefix = [0u8; 4];
        self.stream
            .read_exact(&mut prefix)
            .map_err(|err| VabError::transport("read response length", &err))?;
        let length = u32::from_le_bytes(prefix) as usize;

        let mut body = Vec::with_capacity(length.min(self.frame_buffer));
        let mut scratch = vec![0u8; self.frame_buffer.max(1)];
        while body.len() < length {
            let want = scratch.len().min(length - body.len());
            match self.stream.read(&mut scratch[..want]) {
                Ok(0) => {
                    let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
                    return Err(VabError::transport("read response body", &eof));
                }
                Ok(read) => body.extend_from_slice(&scratch[..read]),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(VabError::transport("read response body", &err)),
            }
        }
        Ok(body)
    }
}

fn check(response: Response) -> Result<Response, VabError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(VabError::Provider(response.error_text()))
    }
}

fn entity_or_null(response: &Response) -> Result<Value, VabError> {
    response.entity().map(Option::unwrap_or_default)
}

/// [`ElementProxy`] over a shared connection.
///
/// Deep proxies clone the handle, so any number of views multiplex one
/// socket; the mutex serializes their request/response exchanges.
#[derive(Clone)]
pub struct ConnectedProxy {
    connector: Arc<Mutex<NativeConnector>>,
    base: ElementPath,
}

impl ConnectedProxy {
    /// Root-scoped proxy over an existing connector.
    #[must_use]
    pub fn new(connector: NativeConnector) -> Self {
        Self {
            connector: Arc::new(Mutex::new(connector)),
            base: ElementPath::root(),
        }
    }

    /// Connects and scopes the proxy to the model root.
    ///
    /// # Errors
    ///
    /// `Transport` when the connection cannot be established.
    pub fn connect(addr: SocketAddr) -> Result<Self, VabError> {
        Ok(Self::new(NativeConnector::connect(addr)?))
    }

    /// A proxy scoped to a sub-path, sharing this connection.
    #[must_use]
    pub fn deep_proxy(&self, relative: &ElementPath) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            base: self.base.join(relative),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, NativeConnector>, VabError> {
        self.connector
            .lock()
            .map_err(|_| VabError::Provider("connector lock poisoned".into()))
    }

    fn target(&self, path: &ElementPath) -> String {
        self.base.join(path).to_string()
    }
}

impl ElementProxy for ConnectedProxy {
    fn read(&self, path: &ElementPath) -> Result<Value, VabError> {
        self.guard()?.get(&self.target(path))
    }

    fn update(&self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.guard()?.set(&self.target(path), &value)
    }

    fn create(&self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.guard()?.create(&self.target(path), &value)
    }

    fn delete(&self, path: &ElementPath) -> Result<(), VabError> {
        self.guard()?.delete(&self.target(path))
    }

    fn delete_value(&self, path: &ElementPath, value: &Value) -> Result<(), VabError> {
        self.guard()?.delete_value(&self.target(path), value)
    }

    fn invoke(&self, path: &ElementPath, params: Vec<Value>) -> Result<Value, VabError> {
        self.guard()?.invoke(&self.target(path), &params)
    }

    fn address_path(&self) -> &ElementPath {
        &self.base
    }
}
