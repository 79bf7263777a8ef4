//! Execution lifecycle driven through commands and finish orders.

use vab_control::{ControlComponent, ExecutionState};
use vab_core::{ElementPath, ModelProvider, Value};

fn status(component: &ControlComponent, field: &str) -> String {
    let path = ElementPath::parse("status").child(field);
    component
        .get(&path)
        .expect("status field")
        .as_str()
        .expect("status text")
        .to_owned()
}

#[test]
fn production_cycle_over_commands_and_finishes() {
    let mut component = ControlComponent::new();
    assert_eq!(component.execution_state(), ExecutionState::Idle);

    component.handle_command("start");
    assert_eq!(component.execution_state(), ExecutionState::Starting);
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Execute);
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Completing);
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Complete);
    component.handle_command("reset");
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Idle);
}

#[test]
fn abort_is_acknowledged_with_clear() {
    let mut component = ControlComponent::new();
    component.handle_command("start");
    component.finish_state();
    component.handle_command("abort");
    assert_eq!(component.execution_state(), ExecutionState::Aborting);
    component.finish_state();
    component.handle_command("clear");
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Stopped);
}

#[test]
fn inapplicable_commands_record_without_transition() {
    let mut component = ControlComponent::new();
    component.handle_command("reset");
    assert_eq!(component.execution_state(), ExecutionState::Idle);
    assert_eq!(component.command(), "reset");
    component.handle_command("resume");
    assert_eq!(component.execution_state(), ExecutionState::Idle);
    assert_eq!(component.command(), "resume");
}

#[test]
fn finish_at_rest_changes_nothing() {
    let mut component = ControlComponent::new();
    component.finish_state();
    component.finish_state();
    assert_eq!(component.execution_state(), ExecutionState::Idle);
}

#[test]
fn commands_parse_case_insensitively_but_record_verbatim() {
    let mut component = ControlComponent::new();
    component.handle_command("START");
    assert_eq!(component.execution_state(), ExecutionState::Starting);
    assert_eq!(component.command(), "START");
}

#[test]
fn status_fields_read_through_the_provider() {
    let mut component = ControlComponent::new();
    assert_eq!(status(&component, "ExecutionState"), "idle");
    assert_eq!(status(&component, "ExecutionMode"), "auto");
    assert_eq!(status(&component, "OccupationState"), "free");

    component.handle_command("start");
    assert_eq!(status(&component, "ExecutionState"), "starting");
    assert_eq!(status(&component, "Command"), "start");
}

#[test]
fn status_writes_route_through_the_provider() {
    let mut component = ControlComponent::new();
    component
        .set(&ElementPath::parse("status/Command"), Value::from("start"))
        .expect("command write");
    assert_eq!(component.execution_state(), ExecutionState::Starting);

    component
        .set(
            &ElementPath::parse("status/ExecutionState"),
            Value::from("Aborted"),
        )
        .expect("forced state");
    assert_eq!(component.execution_state(), ExecutionState::Aborted);
    assert_eq!(status(&component, "ExecutionState"), "aborted");

    let err = component
        .set(
            &ElementPath::parse("status/ExecutionState"),
            Value::from("sideways"),
        )
        .expect_err("unknown state");
    assert!(err.to_string().contains("unknown execution state"));
}

#[test]
fn error_state_writes_stash_the_previous_one() {
    let mut component = ControlComponent::new();
    component.set_error_state("overtemperature");
    component.set_error_state("none");
    assert_eq!(component.error_state(), "none");
    assert_eq!(component.last_error_state(), "overtemperature");
    assert_eq!(status(&component, "LastErrorState"), "overtemperature");
}

#[test]
fn local_overwrites_are_ignored_in_auto_mode() {
    let mut component = ControlComponent::new();
    component.set_local_overwrite("halt");
    assert_eq!(status(&component, "LocalOverwrite"), "");

    component
        .set(
            &ElementPath::parse("status/ExecutionMode"),
            Value::from("manual"),
        )
        .expect("mode write");
    component.set_local_overwrite("halt");
    assert_eq!(status(&component, "LocalOverwrite"), "halt");
}

#[test]
fn the_full_tree_has_status_orders_and_operations() {
    let component = ControlComponent::new();
    let root = component.get(&ElementPath::root()).expect("root tree");
    let status = root.get("status").expect("status map");
    assert_eq!(
        status.get("ExecutionState").expect("state entry"),
        &Value::from("idle")
    );
    assert!(matches!(
        root.get("orderList").expect("order entry"),
        Value::List(orders) if orders.is_empty()
    ));
    let service = root
        .get("operations")
        .expect("operations map")
        .get("service")
        .expect("service map");
    assert_eq!(service.get("start").expect("start entry"), &Value::from("start"));
}

#[test]
fn unknown_paths_and_structure_edits_are_rejected() {
    let mut component = ControlComponent::new();
    let missing = component
        .get(&ElementPath::parse("status/Speed"))
        .expect_err("unknown field read");
    assert!(missing.to_string().contains("path not found"));

    let fixed = component
        .create(&ElementPath::parse("status/Speed"), Value::from(3))
        .expect_err("structure edit");
    assert!(fixed.to_string().contains("structure is fixed"));

    let gone = component
        .set(&ElementPath::parse("telemetry"), Value::from(1))
        .expect_err("unknown branch write");
    assert!(gone.to_string().contains("path not found"));
}
