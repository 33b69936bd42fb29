use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::graph::SubtreeSnapshot;
use crate::model::Value;
use crate::{ElementId, OperationId};

/// Payload of a field assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignArg {
    pub elem: ElementId,
    pub field: String,
    pub val: Value,
    pub old_val: Value,
}

/// Payload of a collection insert or remove
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedArg {
    pub elem: ElementId,
    pub field: String,
    pub val: ElementId,
    pub pos: usize,
}

/// Payload of a move within one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderArg {
    pub elem: ElementId,
    pub field: String,
    pub val: ElementId,
    pub pos: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_pos: Option<usize>,
}

/// Payload of a move between owners
///
/// `elem` is the moved child; `field` is the owning collection on both
/// owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocateArg {
    pub elem: ElementId,
    pub field: String,
    pub old_parent: ElementId,
    pub new_parent: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_pos: Option<usize>,
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg")]
pub enum OpEntry {
    #[serde(rename = "I")]
    Insert(SubtreeSnapshot),
    #[serde(rename = "R")]
    Remove(SubtreeSnapshot),
    #[serde(rename = "a")]
    FieldAssign(AssignArg),
    #[serde(rename = "i")]
    FieldInsert(IndexedArg),
    #[serde(rename = "r")]
    FieldRemove(IndexedArg),
    #[serde(rename = "o")]
    FieldReorder(ReorderArg),
    #[serde(rename = "l")]
    FieldRelocate(RelocateArg),
}

impl OpEntry {
    /// Single-letter wire opcode
    pub fn opcode(&self) -> char {
        match self {
            OpEntry::Insert(_) => 'I',
            OpEntry::Remove(_) => 'R',
            OpEntry::FieldAssign(_) => 'a',
            OpEntry::FieldInsert(_) => 'i',
            OpEntry::FieldRemove(_) => 'r',
            OpEntry::FieldReorder(_) => 'o',
            OpEntry::FieldRelocate(_) => 'l',
        }
    }

    /// Element the entry is about
    pub fn element_id(&self) -> &ElementId {
        match self {
            OpEntry::Insert(s) | OpEntry::Remove(s) => &s.root,
            OpEntry::FieldAssign(a) => &a.elem,
            OpEntry::FieldInsert(a) | OpEntry::FieldRemove(a) => &a.elem,
            OpEntry::FieldReorder(a) => &a.elem,
            OpEntry::FieldRelocate(a) => &a.elem,
        }
    }
}

/// A named, atomic batch of recorded mutations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    /// Creation time in epoch milliseconds
    pub time: i64,
    pub name: String,
    /// Bypass operations are replayable but stay out of undo history
    pub bypass: bool,
    pub ops: Vec<OpEntry>,
}

impl Operation {
    pub fn new(id: OperationId, name: impl Into<String>, bypass: bool) -> Self {
        Self {
            id,
            time: Utc::now().timestamp_millis(),
            name: name.into(),
            bypass,
            ops: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Serialize to the JSON wire shape
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a value cannot be encoded.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse from the JSON wire shape
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the JSON does not have the operation shape.
    pub fn from_json(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
