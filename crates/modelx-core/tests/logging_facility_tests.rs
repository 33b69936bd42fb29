#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use modelx_core::errors::ModelXError;
use modelx_core::logging_facility::test_capture::init_test_capture;
use modelx_core::schema::{
    EVENT_CONSTRAINT_FAILED, EVENT_DISCARDED, EVENT_END, EVENT_END_ERROR, EVENT_LISTENER_FAILED, EVENT_START,
};
use modelx_core::{log_op_end, log_op_error, log_op_start, LogEvent, Rule, Value};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    assert_eq!(
        capture.count_events(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)),
        1
    );
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42, entry_count = 3);

    let events = capture.events();
    let end_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END))
        .expect("end event");
    assert_eq!(end_event.field("duration_ms"), Some("42"));
    assert_eq!(end_event.field("entry_count"), Some("3"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = ModelXError::ElementNotFound {
        element_id: "e1".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events();
    let error_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("error event");
    assert_eq!(error_event.field("err.code"), Some("ERR_NOT_FOUND"));
}

#[test]
fn test_failing_listener_is_logged_and_batch_continues() {
    let capture = init_test_capture();
    let mut session = common::new_session();
    session.subscribe(|event| match event {
        LogEvent::Inserted { .. } => Err("listener refused".into()),
        LogEvent::Committed { .. } => panic!("listener crashed"),
        LogEvent::Removed { .. } => Ok(()),
    });

    session.begin("listener batch").unwrap();
    let e = session.create_element("Class").unwrap();
    session.assign(&e, "name", Value::from("Still here")).unwrap();
    let op_id = session.commit().unwrap().to_string();

    assert_eq!(session.operation().unwrap().ops.len(), 2);
    assert_eq!(session.repo().get(&e).unwrap().str_attr("name"), Some("Still here"));

    let failures = capture.for_operation(EVENT_LISTENER_FAILED, &op_id);
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].op.as_deref(), Some("inserted"));
    assert_eq!(failures[0].field("panicked"), Some("false"));
    assert_eq!(failures[0].field("error"), Some("listener refused"));
    assert_eq!(failures[1].op.as_deref(), Some("committed"));
    assert_eq!(failures[1].field("panicked"), Some("true"));
    assert!(failures.iter().all(|ev| ev.field("err.code") == Some("ERR_CALLBACK_FAILED")));
}

#[test]
fn test_failing_constraint_is_logged() {
    let capture = init_test_capture();
    let mut session = common::new_session();
    common::build_package(&mut session);
    let rule_id = "test_constraint_logged_unique_5";
    session.add_rules([Rule::new(rule_id, "errors", ["Package"], |_, _| Err("no answer".into()))]);

    let failures = session.validate();
    assert_eq!(failures.len(), 1);

    let logged: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_CONSTRAINT_FAILED) && e.field("rule_id") == Some(rule_id))
        .collect();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].field("err.code"), Some("ERR_CALLBACK_FAILED"));
    assert_eq!(logged[0].field("error"), Some("no answer"));
}

#[test]
fn test_discard_is_logged() {
    let capture = init_test_capture();
    let mut session = common::new_session();

    session.begin("test_discard_logged_unique_6").unwrap();
    let op_id = session.operation().unwrap().id.to_string();
    session.create_element("Class").unwrap();
    session.discard().unwrap();

    let discarded = capture.for_operation(EVENT_DISCARDED, &op_id);
    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].field("entry_count"), Some("1"));
}
