//! `vab-core` - Virtual Automation Bus object model and model providers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// VAB errors shared across the bus.
pub mod error;
/// Element path addressing.
pub mod path;
/// Model provider contract and the in-memory map provider.
pub mod provider;
/// Element proxies over local providers.
pub mod proxy;
/// The VAB object model.
pub mod value;

pub use error::VabError;
pub use path::ElementPath;
pub use provider::{MapProvider, ModelProvider};
pub use proxy::{ElementProxy, LocalProxy};
pub use value::{FunctionHandle, Value, ValueKind};
