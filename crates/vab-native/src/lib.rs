//! `vab-native` - native TCP transport for the Virtual Automation Bus.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Server configuration.
pub mod config;
/// Blocking client connector and the connected element proxy.
pub mod connector;
/// Wire frame codec.
pub mod frame;
/// Readiness polling behind the server loop.
pub mod poller;
/// Request dispatch onto a model provider.
pub mod processor;
/// Single-threaded multiplexed TCP server.
pub mod server;

pub use config::ServerConfig;
pub use connector::{ConnectedProxy, NativeConnector};
pub use frame::{Frame, Operation, Response, DEFAULT_FRAME_BUFFER};
pub use poller::{ConnToken, PollEvent, PollTick, Poller, ProbePoller};
pub use processor::FrameProcessor;
pub use server::{ServerTick, TcpVabServer};
