//! VAB errors shared across the bus.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

use crate::value::ValueKind;

/// Errors raised by providers, proxies and the native transport.
///
/// Provider errors travel across the wire as their display text, so the
/// messages here are part of the protocol surface and stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VabError {
    /// No element at the addressed path.
    #[error("path not found '{0}'")]
    PathNotFound(SmolStr),

    /// Create addressed an element that already exists.
    #[error("element already exists '{0}'")]
    AlreadyExists(SmolStr),

    /// Operation applied to a value of the wrong kind.
    #[error("type mismatch (expected {expected}, found {found})")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    /// Map lookup with an absent key.
    #[error("key not found '{0}'")]
    KeyNotFound(SmolStr),

    /// List access past the end.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Value has no JSON form.
    #[error("value not serializable ({0})")]
    NotSerializable(SmolStr),

    /// Invoke addressed an element that is not a function.
    #[error("element not invocable '{0}'")]
    NotInvocable(SmolStr),

    /// An invoked function reported a failure.
    #[error("invocation failed: {0}")]
    InvocationFailure(SmolStr),

    /// Frame bytes did not parse.
    #[error("malformed frame: {0}")]
    MalformedFrame(SmolStr),

    /// Connection-level failure (refused, reset, EOF mid-frame).
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// Exclusive access held by another occupier.
    #[error("component occupied by '{occupier}'")]
    OccupationViolation { occupier: SmolStr },

    /// Configuration error.
    #[error("invalid config '{0}'")]
    InvalidConfig(SmolStr),

    /// Backend-specific provider failure.
    #[error("provider error: {0}")]
    Provider(SmolStr),
}

impl VabError {
    /// Wraps an I/O failure as a transport error with context.
    pub fn transport(context: &str, err: &std::io::Error) -> Self {
        Self::Transport(format!("{context}: {err}").into())
    }

    /// Malformed-frame error with a short reason.
    pub fn malformed(reason: impl Into<SmolStr>) -> Self {
        Self::MalformedFrame(reason.into())
    }
}
