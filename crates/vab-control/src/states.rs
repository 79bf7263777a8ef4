//! Execution vocabulary of a control component.
//!
//! Canonical text form of every name is lowercase; parsing accepts any
//! casing. The transition graph lives here as pure functions so the
//! component itself only sequences writes and notifications.

use std::fmt;

/// PackML-style execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    /// At rest, ready for a start order.
    #[default]
    Idle,
    /// Transition from `Idle` into `Execute`.
    Starting,
    /// Actively working; self-completes through `finish_state`.
    Execute,
    /// Transition from `Execute` into `Complete`.
    Completing,
    /// Work finished, waiting for a reset.
    Complete,
    /// Transition back to `Idle`.
    Resetting,
    /// Transition from `Execute` into `Held`.
    Holding,
    /// Paused by an internal condition.
    Held,
    /// Transition from `Held` back to `Execute`.
    Unholding,
    /// Transition from `Execute` into `Suspended`.
    Suspending,
    /// Paused by an external condition.
    Suspended,
    /// Transition from `Suspended` back to `Execute`.
    Unsuspending,
    /// Transition into `Stopped`.
    Stopping,
    /// Halted normally, waiting for a reset.
    Stopped,
    /// Transition into `Aborted`.
    Aborting,
    /// Halted abnormally, waiting for a clear.
    Aborted,
    /// Transition from `Aborted` into `Stopped`.
    Clearing,
}

impl ExecutionState {
    /// Lowercase state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Execute => "execute",
            Self::Completing => "completing",
            Self::Complete => "complete",
            Self::Resetting => "resetting",
            Self::Holding => "holding",
            Self::Held => "held",
            Self::Unholding => "unholding",
            Self::Suspending => "suspending",
            Self::Suspended => "suspended",
            Self::Unsuspending => "unsuspending",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
            Self::Clearing => "clearing",
        }
    }

    /// Parses a state name in any casing.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "starting" => Some(Self::Starting),
            "execute" => Some(Self::Execute),
            "completing" => Some(Self::Completing),
            "complete" => Some(Self::Complete),
            "resetting" => Some(Self::Resetting),
            "holding" => Some(Self::Holding),
            "held" => Some(Self::Held),
            "unholding" => Some(Self::Unholding),
            "suspending" => Some(Self::Suspending),
            "suspended" => Some(Self::Suspended),
            "unsuspending" => Some(Self::Unsuspending),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "aborting" => Some(Self::Aborting),
            "aborted" => Some(Self::Aborted),
            "clearing" => Some(Self::Clearing),
            _ => None,
        }
    }

    /// Whether the state is one of the transient "-ing" states. `Execute`
    /// also accepts a finish order but is an acting state, not a
    /// transition.
    #[must_use]
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::Starting
                | Self::Completing
                | Self::Resetting
                | Self::Holding
                | Self::Unholding
                | Self::Suspending
                | Self::Unsuspending
                | Self::Stopping
                | Self::Aborting
                | Self::Clearing
        )
    }

    /// The state a recognized command moves this state to, when the
    /// command applies here at all.
    #[must_use]
    pub fn after_command(self, command: ExecutionCommand) -> Option<Self> {
        match (command, self) {
            (ExecutionCommand::Start, Self::Idle) => Some(Self::Starting),
            (ExecutionCommand::Hold, Self::Execute) => Some(Self::Holding),
            (ExecutionCommand::Unhold, Self::Held) => Some(Self::Unholding),
            (ExecutionCommand::Suspend, Self::Execute) => Some(Self::Suspending),
            (ExecutionCommand::Unsuspend, Self::Suspended) => Some(Self::Unsuspending),
            (ExecutionCommand::Reset, Self::Complete | Self::Stopped) => Some(Self::Resetting),
            (ExecutionCommand::Stop, state) if state.accepts_stop() => Some(Self::Stopping),
            (ExecutionCommand::Abort, state) if state.accepts_abort() => Some(Self::Aborting),
            (ExecutionCommand::Clear, Self::Aborted) => Some(Self::Clearing),
            _ => None,
        }
    }

    // The abort branch only exits through clear.
    fn accepts_stop(self) -> bool {
        !matches!(
            self,
            Self::Stopping | Self::Stopped | Self::Aborting | Self::Aborted | Self::Clearing
        )
    }

    fn accepts_abort(self) -> bool {
        !matches!(self, Self::Aborting | Self::Aborted | Self::Clearing)
    }

    /// The state a finish order advances to. `None` everywhere the order
    /// does not apply; `Execute` self-completes into `Completing`.
    #[must_use]
    pub fn after_finish(self) -> Option<Self> {
        match self {
            Self::Starting | Self::Unholding | Self::Unsuspending => Some(Self::Execute),
            Self::Execute => Some(Self::Completing),
            Self::Completing => Some(Self::Complete),
            Self::Resetting => Some(Self::Idle),
            Self::Holding => Some(Self::Held),
            Self::Suspending => Some(Self::Suspended),
            Self::Stopping => Some(Self::Stopped),
            Self::Aborting => Some(Self::Aborted),
            Self::Clearing => Some(Self::Stopped),
            Self::Idle | Self::Complete | Self::Held | Self::Suspended | Self::Stopped
            | Self::Aborted => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating mode gating local overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Fully automatic; local overrides are ignored.
    #[default]
    Auto,
    /// Partially automatic.
    Semiauto,
    /// Manual operation.
    Manual,
    /// Reserved for an external master.
    Reserved,
    /// Simulated execution.
    Simulation,
}

impl ExecutionMode {
    /// Lowercase mode name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Semiauto => "semiauto",
            Self::Manual => "manual",
            Self::Reserved => "reserved",
            Self::Simulation => "simulation",
        }
    }

    /// Parses a mode name in any casing.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "semiauto" => Some(Self::Semiauto),
            "manual" => Some(Self::Manual),
            "reserved" => Some(Self::Reserved),
            "simulation" => Some(Self::Simulation),
            _ => None,
        }
    }

    /// Whether local overwrite inputs take effect in this mode.
    #[must_use]
    pub fn allows_local_overwrite(self) -> bool {
        !matches!(self, Self::Auto)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusive-control lease state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OccupationState {
    /// No occupier.
    #[default]
    Free,
    /// Held by a single occupier.
    Occupied,
    /// Seized by a priority occupier.
    Priority,
    /// Locked by local operation; remote occupiers are shut out.
    Local,
}

impl OccupationState {
    /// Numeric code of the lease state.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Occupied => 1,
            Self::Priority => 2,
            Self::Local => 3,
        }
    }

    /// The lease state for a numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Free),
            1 => Some(Self::Occupied),
            2 => Some(Self::Priority),
            3 => Some(Self::Local),
            _ => None,
        }
    }

    /// Lowercase lease state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Occupied => "occupied",
            Self::Priority => "priority",
            Self::Local => "local",
        }
    }

    /// Parses a lease state name in any casing.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "occupied" => Some(Self::Occupied),
            "priority" => Some(Self::Priority),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Whether no occupier holds the lease.
    #[must_use]
    pub fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for OccupationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands that drive the execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionCommand {
    /// Leave `Idle` and begin work.
    Start,
    /// Halt normally.
    Stop,
    /// Return to `Idle` from a terminal state.
    Reset,
    /// Pause on an internal condition.
    Hold,
    /// Resume from `Held`.
    Unhold,
    /// Pause on an external condition.
    Suspend,
    /// Resume from `Suspended`.
    Unsuspend,
    /// Halt abnormally.
    Abort,
    /// Acknowledge an abort.
    Clear,
}

impl ExecutionCommand {
    /// Lowercase command name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
            Self::Hold => "hold",
            Self::Unhold => "unhold",
            Self::Suspend => "suspend",
            Self::Unsuspend => "unsuspend",
            Self::Abort => "abort",
            Self::Clear => "clear",
        }
    }

    /// Parses a command name in any casing.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "reset" => Some(Self::Reset),
            "hold" => Some(Self::Hold),
            "unhold" => Some(Self::Unhold),
            "suspend" => Some(Self::Suspend),
            "unsuspend" => Some(Self::Unsuspend),
            "abort" => Some(Self::Abort),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
