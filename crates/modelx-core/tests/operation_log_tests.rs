#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use modelx_core::{Element, ElementId, OpEntry, OperationLog, Repository, Value};
use proptest::prelude::*;
use serde_json::json;

fn repo_with_items() -> (Repository, ElementId) {
    let mut repo = Repository::new();
    let e = ElementId::from("e");
    repo.add(Element::new("e", "Holder").with_attr("items", Value::Refs(vec![])))
        .unwrap();
    (repo, e)
}

#[test]
fn test_shadow_indices_track_earlier_entries() {
    let (repo, e) = repo_with_items();
    let mut log = OperationLog::new();
    let (v1, v2, v3) = (ElementId::from("v1"), ElementId::from("v2"), ElementId::from("v3"));

    log.begin("fill", false).unwrap();
    assert_eq!(log.field_insert(&repo, &e, "items", &v1).unwrap(), 0);
    assert_eq!(log.field_insert(&repo, &e, "items", &v2).unwrap(), 1);
    assert_eq!(log.field_remove(&repo, &e, "items", &v1).unwrap(), 0);
    assert_eq!(log.field_insert(&repo, &e, "items", &v3).unwrap(), 1);

    let positions: Vec<(char, usize)> = log
        .end()
        .unwrap()
        .ops
        .iter()
        .map(|entry| match entry {
            OpEntry::FieldInsert(arg) | OpEntry::FieldRemove(arg) => (entry.opcode(), arg.pos),
            other => panic!("unexpected entry {:?}", other),
        })
        .collect();
    assert_eq!(positions, vec![('i', 0), ('i', 1), ('r', 0), ('i', 1)]);
}

#[test]
fn test_removing_absent_value_is_contract_error() {
    let (repo, e) = repo_with_items();
    let mut log = OperationLog::new();

    log.begin("bad", false).unwrap();
    let err = log
        .field_remove(&repo, &e, "items", &ElementId::from("nope"))
        .unwrap_err();
    assert_eq!(err.category(), modelx_core::ErrorCategory::Contract);
    assert!(log.operation().unwrap().is_empty());
}

#[test]
fn test_insert_then_end_commits_one_entry() {
    let mut session = common::new_session();

    session.begin("t1").unwrap();
    let e = session.create_element("Class").unwrap();
    session.commit().unwrap();

    let operation = session.operation().unwrap();
    assert_eq!(operation.name, "t1");
    assert_eq!(operation.ops.len(), 1);
    match &operation.ops[0] {
        OpEntry::Insert(snapshot) => assert_eq!(snapshot.root, e),
        other => panic!("expected insert, got {:?}", other),
    }
}

#[test]
fn test_discard_drops_operation_but_keeps_applied_change() {
    let mut session = common::new_session();

    session.begin("t2").unwrap();
    let e2 = session.create_element("Class").unwrap();
    session.discard().unwrap();

    assert!(session.operation().is_none());
    assert!(session.repo().contains(&e2));
    assert!(!session.history().can_undo());
}

#[test]
fn test_nested_begin_is_rejected() {
    let mut session = common::new_session();
    session.begin("outer").unwrap();

    let err = session.begin("inner").unwrap_err();
    assert_eq!(err.category(), modelx_core::ErrorCategory::Contract);
    assert_eq!(session.operation().unwrap().name, "outer");
}

#[test]
fn test_committed_operation_wire_shape() {
    let mut session = common::new_session();
    let (root, a, b) = common::build_package(&mut session);

    session.begin("shuffle").unwrap();
    session.reorder(&root, "owned", &b, 0).unwrap();
    session.add_ref(&root, "imports", &a).unwrap();
    session.commit().unwrap();

    let wire = session.operation().unwrap().to_json().unwrap();
    assert_eq!(wire["name"], "shuffle");
    assert_eq!(wire["bypass"], false);
    assert!(wire["time"].as_i64().unwrap() > 0);
    assert!(wire["id"].is_string());
    assert_eq!(
        wire["ops"],
        json!([
            {"op": "o", "arg": {"elem": root, "field": "owned", "val": b, "pos": 0, "oldPos": 1}},
            {"op": "i", "arg": {"elem": root, "field": "imports", "val": a, "pos": 0}}
        ])
    );

    let parsed = modelx_core::Operation::from_json(wire).unwrap();
    assert_eq!(&parsed, session.operation().unwrap());
}

#[test]
fn test_insert_snapshot_captures_owned_subtree() {
    let mut session = common::new_session();
    let (root, _, _) = common::build_package(&mut session);

    session.begin("remove").unwrap();
    session.delete(&root).unwrap();
    session.commit().unwrap();

    match &session.operation().unwrap().ops[0] {
        OpEntry::Remove(snapshot) => {
            assert_eq!(snapshot.root, root);
            assert_eq!(snapshot.len(), 3);
        }
        other => panic!("expected remove, got {:?}", other),
    }
    assert!(session.repo().is_empty());
}

#[derive(Debug, Clone)]
enum RefEdit {
    Add(u8),
    Remove(u8),
}

fn ref_edit() -> impl Strategy<Value = RefEdit> {
    prop_oneof![
        (0u8..6).prop_map(RefEdit::Add),
        (0u8..6).prop_map(RefEdit::Remove),
    ]
}

proptest! {
    /// Any interleaving of inserts and removes in one operation records
    /// indices that replay to the live result in both directions
    #[test]
    fn prop_recorded_indices_replay_exactly(edits in proptest::collection::vec(ref_edit(), 1..24)) {
        let mut session = common::new_session();
        let (root, _, _) = common::build_package(&mut session);
        let before = session.repo().digest();

        session.begin("edits").unwrap();
        for edit in &edits {
            match edit {
                RefEdit::Add(n) => {
                    session.add_ref(&root, "imports", &ElementId::from(format!("t{}", n))).unwrap();
                }
                RefEdit::Remove(n) => {
                    let target = ElementId::from(format!("t{}", n));
                    let present = session.repo().collection(&root, "imports").unwrap().contains(&target);
                    prop_assert_eq!(session.remove_ref(&root, "imports", &target).is_ok(), present);
                }
            }
        }
        session.commit().unwrap();
        let after = session.repo().digest();

        if session.history().peek_undo().map(|op| op.name.as_str()) == Some("edits") {
            session.undo().unwrap();
            prop_assert_eq!(session.repo().digest(), before);
            session.redo().unwrap();
        }
        prop_assert_eq!(session.repo().digest(), after);
    }
}
