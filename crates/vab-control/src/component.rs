//! Control component served as a model tree.
//!
//! A [`ControlComponent`] pairs a PackML execution state machine with an
//! exclusive-control lease and a FIFO order list, and exposes all of it
//! through [`ModelProvider`] so the component can sit behind any model
//! server or proxy. The tree is materialized on read:
//!
//! ```text
//! status/ExecutionState .. status/LocalOverwriteFree
//! orderList
//! operations/service/{occupy, priority, free, start, stop, reset,
//!                     abort, clear, bstate}
//! ```
//!
//! Service operations take the sender identifier as their first
//! parameter; an occupied component only obeys its occupier.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;
use vab_core::provider::unwrap_typed_params;
use vab_core::{ElementPath, ModelProvider, VabError, Value};

use crate::states::{ExecutionCommand, ExecutionMode, ExecutionState, OccupationState};

/// Operation names under `operations/service`.
const SERVICE_OPERATIONS: [&str; 9] = [
    "occupy", "priority", "free", "start", "stop", "reset", "abort", "clear", "bstate",
];

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Observer of component mutations.
///
/// Hooks fire synchronously after the write has committed, in listener
/// registration order. Writes that commit nothing (an inapplicable
/// command still records its text, but an ignored local overwrite or an
/// idle finish order changes nothing) fire nothing. Every hook has an
/// empty default so implementors override only what they watch.
pub trait ControlComponentListener: Send {
    /// Any committed write, with the component-relative path of the
    /// changed element and its new value.
    fn on_variable_change(&mut self, _path: &ElementPath, _value: &Value) {}

    /// The execution state changed.
    fn on_execution_state_change(&mut self, _state: ExecutionState) {}

    /// The lease state or the occupier changed.
    fn on_occupation_change(&mut self, _state: OccupationState, _occupier: &str) {}

    /// A command string was received.
    fn on_command(&mut self, _command: &str) {}
}

/// Execution state machine with an occupation lease and an order list.
///
/// Plain data; share it behind a lock (or a single-threaded server) and
/// it serializes naturally with the rest of the model tree traffic.
#[derive(Default)]
pub struct ControlComponent {
    execution_state: ExecutionState,
    execution_mode: ExecutionMode,
    occupation: OccupationState,
    occupier_id: SmolStr,
    last_occupier_id: SmolStr,
    operation_mode: SmolStr,
    work_state: SmolStr,
    error_state: SmolStr,
    last_error_state: SmolStr,
    command: SmolStr,
    local_overwrite: SmolStr,
    local_overwrite_free: SmolStr,
    orders: Vec<SmolStr>,
    listeners: Vec<(ListenerId, Box<dyn ControlComponentListener>)>,
    next_listener: u64,
}

impl ControlComponent {
    /// Component at rest: `Idle`, `Auto` mode, lease free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current execution state.
    #[must_use]
    pub fn execution_state(&self) -> ExecutionState {
        self.execution_state
    }

    /// Forces the execution state, bypassing the command graph.
    pub fn set_execution_state(&mut self, state: ExecutionState) {
        self.execution_state = state;
        debug!(state = %state, "execution state changed");
        self.notify_status("ExecutionState", Value::from(state.as_str()));
        self.each_listener(|listener| listener.on_execution_state_change(state));
    }

    /// Current execution mode.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// Switches the execution mode.
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.execution_mode = mode;
        debug!(mode = %mode, "execution mode changed");
        self.notify_status("ExecutionMode", Value::from(mode.as_str()));
    }

    /// Current lease state.
    #[must_use]
    pub fn occupation_state(&self) -> OccupationState {
        self.occupation
    }

    /// Forces the lease state without touching the occupier.
    pub fn set_occupation_state(&mut self, state: OccupationState) {
        self.occupation = state;
        debug!(occupation = %state, occupier = %self.occupier_id, "occupation changed");
        self.notify_status("OccupationState", Value::from(state.as_str()));
        let occupier = self.occupier_id.clone();
        self.each_listener(|listener| listener.on_occupation_change(state, &occupier));
    }

    /// Identifier of the current occupier, empty when free.
    #[must_use]
    pub fn occupier_id(&self) -> &str {
        &self.occupier_id
    }

    /// Replaces the occupier, stashing the previous one as the last
    /// occupier for audit.
    pub fn set_occupier_id(&mut self, id: impl Into<SmolStr>) {
        self.last_occupier_id = std::mem::replace(&mut self.occupier_id, id.into());
        self.notify_status("OccupierId", Value::String(self.occupier_id.clone()));
        self.notify_status(
            "LastOccupierId",
            Value::String(self.last_occupier_id.clone()),
        );
        let state = self.occupation;
        let occupier = self.occupier_id.clone();
        self.each_listener(|listener| listener.on_occupation_change(state, &occupier));
    }

    /// Identifier of the previous occupier.
    #[must_use]
    pub fn last_occupier_id(&self) -> &str {
        &self.last_occupier_id
    }

    /// Overwrites the audit trail entry.
    pub fn set_last_occupier_id(&mut self, id: impl Into<SmolStr>) {
        self.last_occupier_id = id.into();
        self.notify_status(
            "LastOccupierId",
            Value::String(self.last_occupier_id.clone()),
        );
    }

    /// Takes the lease for `id`.
    ///
    /// Taking an already-held lease again with the same identifier is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// `OccupationViolation` when another occupier holds the lease.
    pub fn occupy(&mut self, id: &str) -> Result<(), VabError> {
        if !self.occupation.is_free() && self.occupier_id != id {
            return Err(self.violation());
        }
        if self.occupation.is_free() {
            self.set_occupier_id(id);
            self.set_occupation_state(OccupationState::Occupied);
        }
        Ok(())
    }

    /// Seizes the lease with priority, displacing a normal occupier.
    ///
    /// # Errors
    ///
    /// `OccupationViolation` when the component is locally locked by
    /// someone else.
    pub fn occupy_priority(&mut self, id: &str) -> Result<(), VabError> {
        if self.occupation == OccupationState::Local && self.occupier_id != id {
            return Err(self.violation());
        }
        if self.occupier_id != id {
            self.set_occupier_id(id);
        }
        self.set_occupation_state(OccupationState::Priority);
        Ok(())
    }

    /// Releases the lease. The departing occupier stays recorded as the
    /// last occupier. Freeing a free component is a no-op.
    ///
    /// # Errors
    ///
    /// `OccupationViolation` when `id` is not the occupier.
    pub fn free(&mut self, id: &str) -> Result<(), VabError> {
        if self.occupation.is_free() {
            return Ok(());
        }
        if self.occupier_id != id {
            return Err(self.violation());
        }
        self.set_occupier_id("");
        self.set_occupation_state(OccupationState::Free);
        Ok(())
    }

    fn violation(&self) -> VabError {
        VabError::OccupationViolation {
            occupier: self.occupier_id.clone(),
        }
    }

    fn guard_sender(&self, sender: &str) -> Result<(), VabError> {
        if !self.occupation.is_free() && self.occupier_id != sender {
            return Err(self.violation());
        }
        Ok(())
    }

    /// Last received command text.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Records a command and, where the command graph applies, enters the
    /// matching transition state. Unrecognized or inapplicable commands
    /// are recorded without a transition.
    pub fn handle_command(&mut self, command: &str) {
        self.command = SmolStr::new(command);
        debug!(command, "command received");
        self.notify_status("Command", Value::String(self.command.clone()));
        let text = self.command.clone();
        self.each_listener(|listener| listener.on_command(&text));
        if let Some(next) = ExecutionCommand::parse(command)
            .and_then(|parsed| self.execution_state.after_command(parsed))
        {
            self.set_execution_state(next);
        }
    }

    /// Completes the current transition state. A no-op at rest, except
    /// that `Execute` self-completes into `Completing`.
    pub fn finish_state(&mut self) {
        if let Some(next) = self.execution_state.after_finish() {
            self.set_execution_state(next);
        }
    }

    /// Current operation mode label.
    #[must_use]
    pub fn operation_mode(&self) -> &str {
        &self.operation_mode
    }

    /// Sets the operation mode label.
    pub fn set_operation_mode(&mut self, mode: impl Into<SmolStr>) {
        self.operation_mode = mode.into();
        self.notify_status("OperationMode", Value::String(self.operation_mode.clone()));
    }

    /// Current work state label.
    #[must_use]
    pub fn work_state(&self) -> &str {
        &self.work_state
    }

    /// Sets the work state label.
    pub fn set_work_state(&mut self, state: impl Into<SmolStr>) {
        self.work_state = state.into();
        self.notify_status("WorkState", Value::String(self.work_state.clone()));
    }

    /// Current error state label.
    #[must_use]
    pub fn error_state(&self) -> &str {
        &self.error_state
    }

    /// Sets the error state label, stashing the previous one.
    pub fn set_error_state(&mut self, state: impl Into<SmolStr>) {
        self.last_error_state = std::mem::replace(&mut self.error_state, state.into());
        self.notify_status("ErrorState", Value::String(self.error_state.clone()));
        self.notify_status(
            "LastErrorState",
            Value::String(self.last_error_state.clone()),
        );
    }

    /// Previous error state label.
    #[must_use]
    pub fn last_error_state(&self) -> &str {
        &self.last_error_state
    }

    /// Overwrites the stashed previous error state.
    pub fn set_last_error_state(&mut self, state: impl Into<SmolStr>) {
        self.last_error_state = state.into();
        self.notify_status(
            "LastErrorState",
            Value::String(self.last_error_state.clone()),
        );
    }

    /// Local overwrite input. Writes are ignored while the execution mode
    /// is `Auto`.
    pub fn set_local_overwrite(&mut self, text: impl Into<SmolStr>) {
        if !self.execution_mode.allows_local_overwrite() {
            debug!("local overwrite ignored in auto mode");
            return;
        }
        self.local_overwrite = text.into();
        self.notify_status("LocalOverwrite", Value::String(self.local_overwrite.clone()));
    }

    /// Local overwrite release input. Writes are ignored while the
    /// execution mode is `Auto`.
    pub fn set_local_overwrite_free(&mut self, text: impl Into<SmolStr>) {
        if !self.execution_mode.allows_local_overwrite() {
            debug!("local overwrite release ignored in auto mode");
            return;
        }
        self.local_overwrite_free = text.into();
        self.notify_status(
            "LocalOverwriteFree",
            Value::String(self.local_overwrite_free.clone()),
        );
    }

    /// Pending orders, oldest first.
    #[must_use]
    pub fn order_list(&self) -> &[SmolStr] {
        &self.orders
    }

    /// Appends an order identifier.
    pub fn add_order(&mut self, order: impl Into<SmolStr>) {
        self.orders.push(order.into());
        self.notify_orders();
    }

    /// Drops all pending orders.
    pub fn clear_order(&mut self) {
        self.orders.clear();
        self.notify_orders();
    }

    /// Registers a listener and returns its removal handle.
    pub fn add_listener(&mut self, listener: Box<dyn ControlComponentListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn each_listener(&mut self, mut visit: impl FnMut(&mut dyn ControlComponentListener)) {
        for (_, listener) in &mut self.listeners {
            visit(&mut **listener);
        }
    }

    fn notify_status(&mut self, field: &str, value: Value) {
        let path = ElementPath::parse("status").child(field);
        self.each_listener(|listener| listener.on_variable_change(&path, &value));
    }

    fn notify_orders(&mut self) {
        let path = ElementPath::parse("orderList");
        let value = self.order_tree();
        self.each_listener(|listener| listener.on_variable_change(&path, &value));
    }

    fn write_status_field(&mut self, field: &str, value: &Value) -> Result<(), VabError> {
        match field {
            "ExecutionState" => {
                let text = value.as_str()?;
                let state = ExecutionState::parse(text)
                    .ok_or_else(|| unknown_name("execution state", text))?;
                self.set_execution_state(state);
            }
            "ExecutionMode" => {
                let text = value.as_str()?;
                let mode = ExecutionMode::parse(text)
                    .ok_or_else(|| unknown_name("execution mode", text))?;
                self.set_execution_mode(mode);
            }
            "OccupationState" => {
                let text = value.as_str()?;
                let state = OccupationState::parse(text)
                    .ok_or_else(|| unknown_name("occupation state", text))?;
                self.set_occupation_state(state);
            }
            "OccupierId" => self.set_occupier_id(value.as_str()?),
            "LastOccupierId" => self.set_last_occupier_id(value.as_str()?),
            "Command" => self.handle_command(value.as_str()?),
            "OperationMode" => self.set_operation_mode(value.as_str()?),
            "WorkState" => self.set_work_state(value.as_str()?),
            "ErrorState" => self.set_error_state(value.as_str()?),
            "LastErrorState" => self.set_last_error_state(value.as_str()?),
            "LocalOverwrite" => self.set_local_overwrite(value.as_str()?),
            "LocalOverwriteFree" => self.set_local_overwrite_free(value.as_str()?),
            _ => {
                return Err(VabError::PathNotFound(
                    ElementPath::parse("status").child(field).to_string().into(),
                ))
            }
        }
        Ok(())
    }

    fn status_tree(&self) -> Value {
        let mut entries = IndexMap::new();
        entries.insert(
            SmolStr::new("ExecutionState"),
            Value::from(self.execution_state.as_str()),
        );
        entries.insert(
            SmolStr::new("ExecutionMode"),
            Value::from(self.execution_mode.as_str()),
        );
        entries.insert(
            SmolStr::new("OccupationState"),
            Value::from(self.occupation.as_str()),
        );
        entries.insert(
            SmolStr::new("OccupierId"),
            Value::String(self.occupier_id.clone()),
        );
        entries.insert(
            SmolStr::new("LastOccupierId"),
            Value::String(self.last_occupier_id.clone()),
        );
        entries.insert(
            SmolStr::new("OperationMode"),
            Value::String(self.operation_mode.clone()),
        );
        entries.insert(
            SmolStr::new("WorkState"),
            Value::String(self.work_state.clone()),
        );
        entries.insert(
            SmolStr::new("ErrorState"),
            Value::String(self.error_state.clone()),
        );
        entries.insert(
            SmolStr::new("LastErrorState"),
            Value::String(self.last_error_state.clone()),
        );
        entries.insert(SmolStr::new("Command"), Value::String(self.command.clone()));
        entries.insert(
            SmolStr::new("LocalOverwrite"),
            Value::String(self.local_overwrite.clone()),
        );
        entries.insert(
            SmolStr::new("LocalOverwriteFree"),
            Value::String(self.local_overwrite_free.clone()),
        );
        Value::Map(entries)
    }

    fn order_tree(&self) -> Value {
        Value::List(self.orders.iter().cloned().map(Value::String).collect())
    }

    // Operations are listed by name; the component dispatches them itself
    // in `invoke` because they need the component state behind the tree.
    fn service_tree(&self) -> Value {
        let mut service = IndexMap::new();
        for operation in SERVICE_OPERATIONS {
            service.insert(SmolStr::new(operation), Value::from(operation));
        }
        Value::Map(service)
    }

    fn operations_tree(&self) -> Value {
        let mut operations = IndexMap::new();
        operations.insert(SmolStr::new("service"), self.service_tree());
        Value::Map(operations)
    }

    fn full_tree(&self) -> Value {
        let mut root = IndexMap::new();
        root.insert(SmolStr::new("status"), self.status_tree());
        root.insert(SmolStr::new("orderList"), self.order_tree());
        root.insert(SmolStr::new("operations"), self.operations_tree());
        Value::Map(root)
    }

    fn dispatch_service(&mut self, operation: &str, sender: &str) -> Result<Value, VabError> {
        debug!(operation, sender, "service operation");
        match operation {
            "occupy" => self.occupy(sender)?,
            "priority" => self.occupy_priority(sender)?,
            "free" => self.free(sender)?,
            "bstate" => {
                self.guard_sender(sender)?;
                self.finish_state();
            }
            "start" | "stop" | "reset" | "abort" | "clear" => {
                self.guard_sender(sender)?;
                self.handle_command(operation);
            }
            _ => return Err(VabError::NotInvocable(SmolStr::new(operation))),
        }
        Ok(Value::Null)
    }
}

impl fmt::Debug for ControlComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlComponent")
            .field("execution_state", &self.execution_state)
            .field("execution_mode", &self.execution_mode)
            .field("occupation", &self.occupation)
            .field("occupier_id", &self.occupier_id)
            .field("orders", &self.orders)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ModelProvider for ControlComponent {
    fn get(&self, path: &ElementPath) -> Result<Value, VabError> {
        let segments: Vec<&str> = path.segments().collect();
        match segments.as_slice() {
            [] => Ok(self.full_tree()),
            ["status"] => Ok(self.status_tree()),
            ["status", field] => self
                .status_tree()
                .get(field)
                .cloned()
                .map_err(|_| not_found(path)),
            ["orderList"] => Ok(self.order_tree()),
            ["orderList", index] => index
                .parse::<usize>()
                .ok()
                .and_then(|slot| self.orders.get(slot))
                .map(|order| Value::String(order.clone()))
                .ok_or_else(|| not_found(path)),
            ["operations"] => Ok(self.operations_tree()),
            ["operations", "service"] => Ok(self.service_tree()),
            ["operations", "service", operation] if SERVICE_OPERATIONS.contains(operation) => {
                Ok(Value::from(*operation))
            }
            _ => Err(not_found(path)),
        }
    }

    fn set(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        let segments: Vec<&str> = path.segments().collect();
        match segments.as_slice() {
            ["status", field] => self.write_status_field(field, &value),
            ["orderList"] => {
                self.orders = order_ids(&value)?;
                self.notify_orders();
                Ok(())
            }
            [] | ["status"] | ["orderList", _] | ["operations", ..] => Err(fixed_structure()),
            _ => Err(not_found(path)),
        }
    }

    fn create(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        let segments: Vec<&str> = path.segments().collect();
        match segments.as_slice() {
            ["orderList"] => {
                let order = SmolStr::new(value.as_str()?);
                self.add_order(order);
                Ok(())
            }
            _ => Err(fixed_structure()),
        }
    }

    fn delete(&mut self, path: &ElementPath) -> Result<(), VabError> {
        let segments: Vec<&str> = path.segments().collect();
        match segments.as_slice() {
            ["orderList", index] => {
                let slot = index
                    .parse::<usize>()
                    .ok()
                    .filter(|slot| *slot < self.orders.len())
                    .ok_or_else(|| not_found(path))?;
                self.orders.remove(slot);
                self.notify_orders();
                Ok(())
            }
            _ => Err(fixed_structure()),
        }
    }

    fn delete_value(&mut self, path: &ElementPath, value: &Value) -> Result<(), VabError> {
        let segments: Vec<&str> = path.segments().collect();
        match segments.as_slice() {
            ["orderList"] => {
                let order = value.as_str()?;
                let position = self
                    .orders
                    .iter()
                    .position(|pending| pending.as_str() == order)
                    .ok_or_else(|| not_found(path))?;
                self.orders.remove(position);
                self.notify_orders();
                Ok(())
            }
            _ => Err(fixed_structure()),
        }
    }

    fn invoke(&mut self, path: &ElementPath, mut params: Vec<Value>) -> Result<Value, VabError> {
        unwrap_typed_params(&mut params);
        let segments: Vec<&str> = path.segments().collect();
        let operation = match segments.as_slice() {
            [operation] | ["operations", operation] | ["operations", "service", operation] => {
                *operation
            }
            _ => return Err(VabError::NotInvocable(path.to_string().into())),
        };
        let sender = params
            .first()
            .map(Value::as_str)
            .transpose()?
            .unwrap_or_default();
        self.dispatch_service(operation, sender)
    }
}

fn not_found(path: &ElementPath) -> VabError {
    VabError::PathNotFound(path.to_string().into())
}

fn unknown_name(what: &str, text: &str) -> VabError {
    VabError::Provider(format!("unknown {what} '{text}'").into())
}

fn fixed_structure() -> VabError {
    VabError::Provider(SmolStr::new("control component structure is fixed"))
}

fn order_ids(value: &Value) -> Result<Vec<SmolStr>, VabError> {
    value
        .as_list()?
        .iter()
        .map(|entry| entry.as_str().map(SmolStr::new))
        .collect()
}
