use serde::{Deserialize, Serialize};

use crate::model::Element;
use crate::ElementId;

/// An element and its owned subtree, captured as plain data
///
/// `elements` is in pre-order: the root comes first, and every element
/// precedes its owned children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeSnapshot {
    pub root: ElementId,
    pub elements: Vec<Element>,
}

impl SubtreeSnapshot {
    pub fn root_element(&self) -> Option<&Element> {
        self.elements.first()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.iter().map(|e| &e.id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
