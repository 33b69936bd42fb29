use modelx_core::{ElementId, Rule, Session};
use serde_json::json;

/// A small class-diagram schema: packages own classifiers, classifiers own
/// attributes, associations weakly reference their ends
#[allow(dead_code)]
pub fn uml_schema() -> serde_json::Value {
    json!({
        "Visibility": {"kind": "enum", "literals": ["public", "protected", "private"]},
        "Font": {"kind": "class"},
        "Named": {
            "kind": "class",
            "attributes": [
                {"name": "name", "kind": "prim", "type": "String", "default": ""},
                {"name": "visibility", "kind": "enum", "type": "Visibility", "default": "public"}
            ]
        },
        "Package": {
            "kind": "class",
            "super": "Named",
            "attributes": [
                {"name": "owned", "kind": "objs", "type": "Named"},
                {"name": "imports", "kind": "refs", "type": "Package"}
            ]
        },
        "Classifier": {
            "kind": "class",
            "super": "Named",
            "attributes": [
                {"name": "attributes", "kind": "objs", "type": "Attribute"},
                {"name": "abstract", "kind": "prim", "type": "Boolean", "default": false},
                {"name": "font", "kind": "var", "type": "Font", "default": {"family": "sans", "size": 10}}
            ]
        },
        "Class": {"kind": "class", "super": "Classifier"},
        "Interface": {"kind": "class", "super": "Classifier"},
        "Attribute": {
            "kind": "class",
            "super": "Named",
            "attributes": [{"name": "type", "kind": "ref", "type": "Classifier"}]
        },
        "Association": {
            "kind": "class",
            "super": "Named",
            "attributes": [
                {"name": "ends", "kind": "refs", "type": "Classifier"}
            ]
        }
    })
}

/// A session with the class-diagram schema registered
#[allow(dead_code)]
pub fn new_session() -> Session {
    let mut session = Session::new();
    session.register_schema(&uml_schema()).unwrap();
    session
}

/// "Name must not be empty", applying to every named element
#[allow(dead_code)]
pub fn non_empty_name_rule() -> Rule {
    Rule::new("R1", "name must be non-empty", ["Named"], |element, _| {
        Ok(element.str_attr("name").is_some_and(|name| !name.is_empty()))
    })
}

/// Build `root` package with two classes, committed as one operation
///
/// Returns (root, first class, second class).
#[allow(dead_code)]
pub fn build_package(session: &mut Session) -> (ElementId, ElementId, ElementId) {
    session.begin("build package").unwrap();
    let root = session.create_element("Package").unwrap();
    session.assign(&root, "name", "root".into()).unwrap();
    let a = session.create_child(&root, "owned", "Class").unwrap();
    session.assign(&a, "name", "A".into()).unwrap();
    let b = session.create_child(&root, "owned", "Class").unwrap();
    session.assign(&b, "name", "B".into()).unwrap();
    session.commit().unwrap();
    (root, a, b)
}
