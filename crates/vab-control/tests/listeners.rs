//! Listener notification contract.

use std::sync::{Arc, Mutex};

use vab_control::{ControlComponent, ControlComponentListener, ExecutionState, OccupationState};
use vab_core::{ElementPath, Value};

struct Recorder {
    tag: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn attach(component: &mut ControlComponent, tag: &'static str) -> Arc<Mutex<Vec<String>>> {
        let journal = Arc::new(Mutex::new(Vec::new()));
        component.add_listener(Box::new(Recorder {
            tag,
            journal: Arc::clone(&journal),
        }));
        journal
    }

    fn push(&self, event: String) {
        self.journal.lock().expect("journal lock").push(event);
    }
}

impl ControlComponentListener for Recorder {
    fn on_variable_change(&mut self, path: &ElementPath, _value: &Value) {
        self.push(format!("{} var {path}", self.tag));
    }

    fn on_execution_state_change(&mut self, state: ExecutionState) {
        self.push(format!("{} state {state}", self.tag));
    }

    fn on_occupation_change(&mut self, state: OccupationState, occupier: &str) {
        self.push(format!("{} lease {state} {occupier}", self.tag));
    }

    fn on_command(&mut self, command: &str) {
        self.push(format!("{} command {command}", self.tag));
    }
}

fn events(journal: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

#[test]
fn a_command_fires_variable_command_and_state_hooks() {
    let mut component = ControlComponent::new();
    let journal = Recorder::attach(&mut component, "r");
    component.handle_command("start");
    assert_eq!(
        events(&journal),
        [
            "r var status/Command",
            "r command start",
            "r var status/ExecutionState",
            "r state starting",
        ]
    );
}

#[test]
fn listeners_fire_in_registration_order() {
    let mut component = ControlComponent::new();
    let journal = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second"] {
        component.add_listener(Box::new(Recorder {
            tag,
            journal: Arc::clone(&journal),
        }));
    }
    component.set_work_state("milling");
    assert_eq!(
        events(&journal),
        ["first var status/WorkState", "second var status/WorkState"]
    );
}

#[test]
fn occupation_hooks_report_the_committed_lease() {
    let mut component = ControlComponent::new();
    let journal = Recorder::attach(&mut component, "r");
    component.occupy("line-a").expect("free lease");

    let leases: Vec<String> = events(&journal)
        .into_iter()
        .filter(|event| event.contains("lease"))
        .collect();
    assert_eq!(leases.last().map(String::as_str), Some("r lease occupied line-a"));
    assert!(events(&journal).contains(&"r var status/OccupierId".to_owned()));
}

#[test]
fn ignored_writes_fire_nothing() {
    let mut component = ControlComponent::new();
    let journal = Recorder::attach(&mut component, "r");

    // Auto mode swallows local overwrites and Idle has nothing to finish.
    component.set_local_overwrite("halt");
    component.finish_state();
    assert!(events(&journal).is_empty());

    // An inapplicable command still records its text.
    component.handle_command("resume");
    assert_eq!(
        events(&journal),
        ["r var status/Command", "r command resume"]
    );
}

#[test]
fn removed_listeners_fall_silent() {
    let mut component = ControlComponent::new();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let id = component.add_listener(Box::new(Recorder {
        tag: "gone",
        journal: Arc::clone(&journal),
    }));
    assert!(component.remove_listener(id));
    assert!(!component.remove_listener(id));

    component.handle_command("start");
    assert!(events(&journal).is_empty());
}

#[test]
fn order_changes_notify_the_list_path() {
    let mut component = ControlComponent::new();
    let journal = Recorder::attach(&mut component, "r");
    component.add_order("job-1");
    component.clear_order();
    assert_eq!(events(&journal), ["r var orderList", "r var orderList"]);
}
