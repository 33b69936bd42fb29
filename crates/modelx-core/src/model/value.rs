use serde::{Deserialize, Serialize};

use crate::guard::CallbackError;
use crate::ElementId;

/// Typed attribute value
///
/// One variant per attribute kind. Owning variants (`Obj`, `Objs`) hold the
/// ids of children in the arena; weak variants (`Ref`, `Refs`) may name ids
/// that no longer exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    /// Literal name of an enum type
    Enum(String),
    Ref(Option<ElementId>),
    Refs(Vec<ElementId>),
    Obj(Option<ElementId>),
    Objs(Vec<ElementId>),
    Custom(CustomValue),
}

impl Value {
    /// Convert a schema default into a scalar value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            other => Value::Custom(CustomValue::new("json", other.clone())),
        }
    }

    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "str",
            Value::Enum(_) => "enum",
            Value::Ref(_) => "ref",
            Value::Refs(_) => "refs",
            Value::Obj(_) => "obj",
            Value::Objs(_) => "objs",
            Value::Custom(_) => "custom",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// True for `Obj` and `Objs`
    pub fn is_owning(&self) -> bool {
        matches!(self, Value::Obj(_) | Value::Objs(_))
    }

    /// Ids of owned children, in order
    pub fn owned_ids(&self) -> Vec<&ElementId> {
        match self {
            Value::Obj(Some(id)) => vec![id],
            Value::Objs(ids) => ids.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Ids of weakly referenced elements, in order
    pub fn weak_ids(&self) -> Vec<&ElementId> {
        match self {
            Value::Ref(Some(id)) => vec![id],
            Value::Refs(ids) => ids.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Ordered id collection of an `Objs` or `Refs` value
    pub fn collection(&self) -> Option<&Vec<ElementId>> {
        match self {
            Value::Objs(ids) | Value::Refs(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn collection_mut(&mut self) -> Option<&mut Vec<ElementId>> {
        match self {
            Value::Objs(ids) | Value::Refs(ids) => Some(ids),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Opaque attribute value owned by a custom type (fonts, colors, geometry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomValue {
    #[serde(rename = "type")]
    pub type_name: String,
    pub data: serde_json::Value,
}

impl CustomValue {
    pub fn new(type_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            data,
        }
    }
}

/// Read, serialize, and deserialize hooks for one custom value type
///
/// `read` produces the value captured as the old value of a field
/// assignment. `serialize` produces the data written into snapshots and
/// `deserialize` turns that data back into a live value when a snapshot is
/// restored, so the two must be inverses. All three default to a plain
/// copy. Hook failures are caught by the repository and fall back to the
/// copy.
pub trait CustomValueHooks: Send + Sync {
    fn read(&self, value: &CustomValue) -> Result<CustomValue, CallbackError> {
        Ok(value.clone())
    }

    fn serialize(&self, value: &CustomValue) -> Result<serde_json::Value, CallbackError> {
        Ok(value.data.clone())
    }

    fn deserialize(&self, type_name: &str, data: &serde_json::Value) -> Result<CustomValue, CallbackError> {
        Ok(CustomValue::new(type_name, data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_is_tagged() {
        let v = Value::Objs(vec![ElementId::from("a"), ElementId::from("b")]);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"kind": "objs", "value": ["a", "b"]})
        );
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), json!({"kind": "null"}));

        let back: Value = serde_json::from_value(json!({"kind": "ref", "value": null})).unwrap();
        assert_eq!(back, Value::Ref(None));
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&json!(3)), Value::Int(3));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Real(1.5));
        assert_eq!(Value::from_json(&json!("x")), Value::Str("x".to_string()));
        assert_eq!(Value::from_json(&json!(true)), Value::Bool(true));
    }

    #[test]
    fn test_owned_and_weak_ids() {
        let owned = Value::Obj(Some(ElementId::from("c")));
        assert_eq!(owned.owned_ids(), vec![&ElementId::from("c")]);
        assert!(owned.weak_ids().is_empty());

        let weak = Value::Refs(vec![ElementId::from("x")]);
        assert!(weak.owned_ids().is_empty());
        assert_eq!(weak.collection().map(Vec::len), Some(1));
        assert!(Value::Ref(None).collection().is_none());
    }

    struct Upper;

    impl CustomValueHooks for Upper {
        fn serialize(&self, value: &CustomValue) -> Result<serde_json::Value, CallbackError> {
            let name = value.data.as_str().ok_or("not a string")?;
            Ok(json!(name.to_uppercase()))
        }
    }

    #[test]
    fn test_custom_hook_defaults() {
        let value = CustomValue::new("Font", json!("serif"));
        assert_eq!(Upper.read(&value).unwrap(), value);
        assert_eq!(Upper.serialize(&value).unwrap(), json!("SERIF"));
        assert_eq!(Upper.deserialize("Font", &json!("SERIF")).unwrap(), CustomValue::new("Font", json!("SERIF")));
        assert!(Upper
            .serialize(&CustomValue::new("Font", json!(1)))
            .is_err());
    }
}
