use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::ElementId;

/// A live element of the model graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Weak back-reference to the owning element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementId>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            parent: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs.get(field)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.attrs.insert(field.into(), value)
    }

    /// Ids of all owned children, field by field
    pub fn owned_children(&self) -> Vec<&ElementId> {
        self.attrs.values().flat_map(Value::owned_ids).collect()
    }

    /// Owning field that holds `child`, if any
    pub fn owning_field_of(&self, child: &ElementId) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(_, v)| v.owned_ids().contains(&child))
            .map(|(k, _)| k.as_str())
    }

    /// Text of a string attribute, if set
    pub fn str_attr(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}
