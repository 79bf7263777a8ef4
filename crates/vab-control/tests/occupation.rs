//! Occupation lease semantics and the occupier audit trail.

use vab_control::{ControlComponent, ExecutionState, OccupationState};
use vab_core::{ElementPath, ModelProvider, Value};

#[test]
fn occupier_writes_keep_an_audit_trail() {
    let mut component = ControlComponent::new();
    component.set_occupier_id("A");
    component.set_occupier_id("B");
    assert_eq!(component.occupier_id(), "B");
    assert_eq!(component.last_occupier_id(), "A");
}

#[test]
fn occupy_and_free_round_trip() {
    let mut component = ControlComponent::new();
    component.occupy("press-17").expect("free lease");
    assert_eq!(component.occupation_state(), OccupationState::Occupied);
    assert_eq!(component.occupier_id(), "press-17");

    component.occupy("press-17").expect("same occupier again");

    let err = component.occupy("rival").expect_err("lease is taken");
    assert!(err.to_string().contains("occupied by 'press-17'"));

    let err = component
        .free("rival")
        .expect_err("only the occupier frees");
    assert!(err.to_string().contains("occupied by 'press-17'"));

    component.free("press-17").expect("occupier frees");
    assert_eq!(component.occupation_state(), OccupationState::Free);
    assert_eq!(component.occupier_id(), "");
    assert_eq!(component.last_occupier_id(), "press-17");

    component.free("anyone").expect("freeing a free lease");
}

#[test]
fn priority_displaces_a_normal_occupier() {
    let mut component = ControlComponent::new();
    component.occupy("worker").expect("free lease");
    component
        .occupy_priority("supervisor")
        .expect("priority seizes");
    assert_eq!(component.occupation_state(), OccupationState::Priority);
    assert_eq!(component.occupier_id(), "supervisor");
    assert_eq!(component.last_occupier_id(), "worker");
}

#[test]
fn local_lock_shuts_out_priority() {
    let mut component = ControlComponent::new();
    component.set_occupier_id("panel");
    component.set_occupation_state(OccupationState::Local);
    let err = component
        .occupy_priority("remote")
        .expect_err("locally locked");
    assert!(err.to_string().contains("occupied by 'panel'"));
    component
        .occupy_priority("panel")
        .expect("local holder upgrades");
}

#[test]
fn service_operations_obey_the_occupier() {
    let mut component = ControlComponent::new();
    let occupy = ElementPath::parse("operations/service/occupy");
    let start = ElementPath::parse("operations/service/start");

    component
        .invoke(&occupy, vec![Value::from("line-a")])
        .expect("occupy");
    let err = component
        .invoke(&start, vec![Value::from("line-b")])
        .expect_err("stranger commands");
    assert!(err.to_string().contains("occupied by 'line-a'"));
    assert_eq!(component.execution_state(), ExecutionState::Idle);

    component
        .invoke(&start, vec![Value::from("line-a")])
        .expect("occupier commands");
    assert_eq!(component.execution_state(), ExecutionState::Starting);
}

#[test]
fn anonymous_senders_drive_a_free_component() {
    let mut component = ControlComponent::new();
    component
        .invoke(&ElementPath::parse("operations/service/start"), vec![])
        .expect("free component obeys anyone");
    assert_eq!(component.execution_state(), ExecutionState::Starting);
}

#[test]
fn short_operation_paths_dispatch_too() {
    let mut component = ControlComponent::new();
    component
        .invoke(&ElementPath::parse("occupy"), vec![Value::from("a")])
        .expect("bare dispatch");
    component
        .invoke(&ElementPath::parse("operations/free"), vec![Value::from("a")])
        .expect("short dispatch");
    assert_eq!(component.occupation_state(), OccupationState::Free);
    assert_eq!(component.last_occupier_id(), "a");
}

#[test]
fn bstate_finishes_the_current_transition() {
    let mut component = ControlComponent::new();
    let service = |name: &str| ElementPath::parse("operations/service").child(name);
    component.invoke(&service("start"), vec![]).expect("start");
    component.invoke(&service("bstate"), vec![]).expect("finish");
    assert_eq!(component.execution_state(), ExecutionState::Execute);
}

#[test]
fn unknown_operations_are_not_invocable() {
    let mut component = ControlComponent::new();
    let err = component
        .invoke(&ElementPath::parse("operations/service/jump"), vec![])
        .expect_err("unknown operation");
    assert!(err.to_string().contains("not invocable"));
}
