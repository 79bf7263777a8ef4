//! Request dispatch onto a model provider.

use tracing::debug;
use vab_core::{ElementPath, ModelProvider, VabError, Value};

use crate::frame::{Frame, Operation, Response};

/// Turns request frames into provider calls and provider results into
/// response frames.
///
/// Every provider failure becomes an error response; nothing a provider
/// does can take the transport down.
#[derive(Debug)]
pub struct FrameProcessor<P> {
    provider: P,
}

impl<P: ModelProvider> FrameProcessor<P> {
    /// Processor over the given backend.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Borrows the backend.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutably borrows the backend.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Processes one request frame into a response frame.
    pub fn process(&mut self, request: &Frame) -> Response {
        debug!(
            operation = request.operation().as_str(),
            path = request.path(),
            "processing frame"
        );
        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => Response::error(&err.to_string()),
        }
    }

    fn dispatch(&mut self, request: &Frame) -> Result<Response, VabError> {
        let path = ElementPath::parse(request.path());
        match request.operation() {
            Operation::Get => {
                let value = self.provider.get(&path)?;
                Response::ok(Some(&value))
            }
            Operation::Set => {
                let value = require_payload(request)?;
                self.provider.set(&path, value)?;
                Response::ok(None)
            }
            Operation::Create => {
                let value = require_payload(request)?;
                self.provider.create(&path, value)?;
                Response::ok(None)
            }
            Operation::DeleteSimple => {
                self.provider.delete(&path)?;
                Response::ok(None)
            }
            Operation::DeleteComplex => {
                let value = require_payload(request)?;
                self.provider.delete_value(&path, &value)?;
                Response::ok(None)
            }
            Operation::Invoke => {
                let params = match require_payload(request)? {
                    Value::List(items) => items,
                    single => vec![single],
                };
                let result = self.provider.invoke(&path, params)?;
                Response::ok(Some(&result))
            }
        }
    }
}

fn require_payload(request: &Frame) -> Result<Value, VabError> {
    request
        .payload_value()?
        .ok_or_else(|| VabError::malformed("missing payload"))
}
