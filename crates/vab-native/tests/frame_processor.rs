use std::cell::RefCell;

use vab_core::{ElementPath, ModelProvider, VabError, Value};
use vab_native::{Frame, FrameProcessor};

#[derive(Debug, Default, Clone, PartialEq)]
struct Recording {
    operation: String,
    path: String,
    value: Option<Value>,
    params: Vec<Value>,
}

/// Provider that records the last dispatched call instead of holding a
/// model. `get` answers 2 and `invoke` answers 3 so responses can be
/// told apart.
#[derive(Debug, Default)]
struct RecordingProvider {
    recording: RefCell<Recording>,
    fail: Option<VabError>,
}

impl RecordingProvider {
    fn failing(err: VabError) -> Self {
        Self {
            recording: RefCell::default(),
            fail: Some(err),
        }
    }

    fn last(&self) -> Recording {
        self.recording.borrow().clone()
    }

    fn note(
        &self,
        operation: &str,
        path: &ElementPath,
        value: Option<Value>,
        params: Vec<Value>,
    ) -> Result<(), VabError> {
        *self.recording.borrow_mut() = Recording {
            operation: operation.to_owned(),
            path: path.to_string(),
            value,
            params,
        };
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ModelProvider for RecordingProvider {
    fn get(&self, path: &ElementPath) -> Result<Value, VabError> {
        self.note("get", path, None, Vec::new())?;
        Ok(Value::from(2))
    }

    fn set(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.note("set", path, Some(value), Vec::new())
    }

    fn create(&mut self, path: &ElementPath, value: Value) -> Result<(), VabError> {
        self.note("create", path, Some(value), Vec::new())
    }

    fn delete(&mut self, path: &ElementPath) -> Result<(), VabError> {
        self.note("delete", path, None, Vec::new())
    }

    fn delete_value(&mut self, path: &ElementPath, value: &Value) -> Result<(), VabError> {
        self.note("delete-value", path, Some(value.clone()), Vec::new())
    }

    fn invoke(&mut self, path: &ElementPath, params: Vec<Value>) -> Result<Value, VabError> {
        self.note("invoke", path, None, params)?;
        Ok(Value::from(3))
    }
}

#[test]
fn get_dispatches_and_wraps_the_entity() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let response = processor.process(&Frame::get("frozen/yoghurt"));

    assert!(response.is_success());
    assert_eq!(response.entity().expect("entity"), Some(Value::from(2)));
    let last = processor.provider().last();
    assert_eq!(last.operation, "get");
    assert_eq!(last.path, "frozen/yoghurt");
}

#[test]
fn set_forwards_the_decoded_value() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let request = Frame::set("plant/aas", &Value::from(10)).expect("frame");
    let response = processor.process(&request);

    assert!(response.is_success());
    assert_eq!(response.entity().expect("entity"), None);
    let last = processor.provider().last();
    assert_eq!(last.operation, "set");
    assert_eq!(last.path, "plant/aas");
    assert_eq!(last.value, Some(Value::from(10)));
}

#[test]
fn create_forwards_the_decoded_value() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let request = Frame::create("plant/orders", &Value::from("job-7")).expect("frame");
    let response = processor.process(&request);

    assert!(response.is_success());
    let last = processor.provider().last();
    assert_eq!(last.operation, "create");
    assert_eq!(last.value, Some(Value::from("job-7")));
}

#[test]
fn delete_variants_dispatch_separately() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());

    assert!(processor.process(&Frame::delete("plant/orders/0")).is_success());
    let last = processor.provider().last();
    assert_eq!(last.operation, "delete");
    assert_eq!(last.value, None);

    let request = Frame::delete_value("plant/orders", &Value::from("job-7")).expect("frame");
    assert!(processor.process(&request).is_success());
    let last = processor.provider().last();
    assert_eq!(last.operation, "delete-value");
    assert_eq!(last.value, Some(Value::from("job-7")));
}

#[test]
fn invoke_passes_a_single_parameter_plain() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let request = Frame::invoke("ops/run", &[Value::from(5)]).expect("frame");
    let response = processor.process(&request);

    assert!(response.is_success());
    assert_eq!(response.entity().expect("entity"), Some(Value::from(3)));
    let last = processor.provider().last();
    assert_eq!(last.operation, "invoke");
    assert_eq!(last.params, vec![Value::from(5)]);
}

#[test]
fn invoke_splats_array_payloads_into_parameters() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let request = Frame::invoke("ops/run", &[Value::from(1), Value::from(2)]).expect("frame");
    processor.process(&request);

    let last = processor.provider().last();
    assert_eq!(last.params, vec![Value::from(1), Value::from(2)]);
}

// A lone list parameter is indistinguishable from a parameter array on
// the wire, so it arrives as several parameters.
#[test]
fn single_list_parameter_arrives_splatted() {
    let mut processor = FrameProcessor::new(RecordingProvider::default());
    let list = Value::List(vec![Value::from(1), Value::from(2)]);
    let request = Frame::invoke("ops/run", std::slice::from_ref(&list)).expect("frame");
    processor.process(&request);

    let last = processor.provider().last();
    assert_eq!(last.params, vec![Value::from(1), Value::from(2)]);
}

#[test]
fn provider_errors_become_error_responses() {
    let failing = RecordingProvider::failing(VabError::PathNotFound("nowhere".into()));
    let mut processor = FrameProcessor::new(failing);
    let response = processor.process(&Frame::get("nowhere"));

    assert!(!response.is_success());
    assert_eq!(response.error_text(), "path not found 'nowhere'");
}
