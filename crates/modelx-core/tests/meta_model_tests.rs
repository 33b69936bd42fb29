#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use modelx_core::meta::SchemaFragment;
use modelx_core::{AttributeDescriptor, AttributeKind, MetaModel, ModelXError, TypeDescriptor};
use proptest::prelude::*;
use serde_json::json;

fn names(meta: &MetaModel, type_name: &str) -> Vec<String> {
    meta.resolve(type_name)
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect()
}

fn single(descriptor: TypeDescriptor) -> SchemaFragment {
    let mut fragment = SchemaFragment::new();
    fragment.insert(descriptor.name.clone(), descriptor);
    fragment
}

#[test]
fn test_resolve_base_then_derived_regardless_of_order() {
    let a = TypeDescriptor::class("A").attribute(AttributeDescriptor::new("x", AttributeKind::Prim, "String"));
    let b = TypeDescriptor::class("B")
        .extends("A")
        .attribute(AttributeDescriptor::new("y", AttributeKind::Prim, "String"));

    let mut forward = MetaModel::new();
    forward.register(single(a.clone()));
    forward.register(single(b.clone()));

    let mut backward = MetaModel::new();
    backward.register(single(b));
    backward.register(single(a));

    assert_eq!(names(&forward, "B"), vec!["x", "y"]);
    assert_eq!(names(&backward, "B"), vec!["x", "y"]);
}

#[test]
fn test_class_diagram_schema_resolves() {
    let mut meta = MetaModel::new();
    meta.register_json(&common::uml_schema()).unwrap();

    assert_eq!(
        names(&meta, "Class"),
        vec!["name", "visibility", "attributes", "abstract", "font"]
    );
    assert!(meta.is_subtype("Interface", "Named"));
    assert!(!meta.is_subtype("Package", "Classifier"));
    assert_eq!(
        meta.literals("Visibility").unwrap(),
        ["public", "protected", "private"]
    );
}

#[test]
fn test_unknown_type_and_broken_chain() {
    let mut meta = MetaModel::new();
    meta.register_json(&json!({"Orphan": {"kind": "class", "super": "Missing"}}))
        .unwrap();

    assert!(matches!(
        meta.resolve("Nothing"),
        Err(ModelXError::UnknownType { .. })
    ));
    match meta.resolve("Orphan") {
        Err(ModelXError::UnknownType { type_name }) => assert_eq!(type_name, "Missing"),
        other => panic!("expected UnknownType, got {:?}", other),
    }
}

#[test]
fn test_unknown_attribute_kind_rejects_whole_fragment() {
    let mut meta = MetaModel::new();
    let result = meta.register_str(
        r#"{
            "Fine": {"kind": "class"},
            "Broken": {"attributes": [{"name": "blob", "kind": "bytes", "type": "X"}]}
        }"#,
    );

    assert!(matches!(result, Err(ModelXError::UnknownAttributeKind { .. })));
    assert_eq!(
        result.unwrap_err().category(),
        modelx_core::ErrorCategory::Contract
    );
    assert!(meta.is_empty());
}

#[test]
fn test_finalize_interns_every_type() {
    let mut meta = MetaModel::new();
    meta.register_json(&common::uml_schema()).unwrap();
    meta.finalize();

    let ids: std::collections::HashSet<_> = meta
        .type_names()
        .map(|name| meta.type_id(name).unwrap())
        .collect();
    assert_eq!(ids.len(), meta.len());
    assert!(meta.is_subtype("Class", "Named"));
    assert!(meta.is_subtype_of_any("Attribute", &["Package", "Named"]));
}

proptest! {
    /// Registering a chain of types one by one in any order resolves the
    /// same as registering it in declaration order
    #[test]
    fn prop_resolve_is_order_independent(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
        let chain: Vec<TypeDescriptor> = (0..6)
            .map(|i| {
                let descriptor = TypeDescriptor::class(format!("T{}", i))
                    .attribute(AttributeDescriptor::new(format!("a{}", i), AttributeKind::Prim, "String"));
                if i == 0 { descriptor } else { descriptor.extends(format!("T{}", i - 1)) }
            })
            .collect();

        let mut meta = MetaModel::new();
        for index in &order {
            meta.register(single(chain[*index].clone()));
        }

        prop_assert_eq!(names(&meta, "T5"), vec!["a0", "a1", "a2", "a3", "a4", "a5"]);
        prop_assert!(meta.is_subtype("T5", "T0"));
        prop_assert!(!meta.is_subtype("T0", "T5"));
    }
}
