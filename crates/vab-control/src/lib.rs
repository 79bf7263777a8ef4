//! `vab-control` - control components on the Virtual Automation Bus.
//!
//! A control component wraps a PackML-style execution state machine, an
//! exclusive-control lease and a FIFO order list into a model tree. Host
//! one behind `vab-native`'s server and any connector can observe its
//! status fields and drive it through invokable service operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Component state, listeners and the model tree mapping.
pub mod component;
/// Execution state, mode, occupation and command vocabulary.
pub mod states;

pub use component::{ControlComponent, ControlComponentListener, ListenerId};
pub use states::{ExecutionCommand, ExecutionMode, ExecutionState, OccupationState};
