//! Per-operation shadow copies of collections
//!
//! The first time an operation touches `(element, field)`, the live
//! collection is cloned. Later inserts and removes in the same operation
//! are applied to the clone, so each recorded index is relative to the
//! state left by the entries before it. A relocate is mirrored into the
//! shadows of both owners; a reorder never touches them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::errors::{ModelXError, Result};
use crate::graph::Repository;
use crate::ElementId;

#[derive(Debug, Default)]
pub struct Shadows {
    collections: HashMap<(ElementId, String), Vec<ElementId>>,
}

impl Shadows {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, repo: &Repository, id: &ElementId, field: &str) -> Result<&mut Vec<ElementId>> {
        match self.collections.entry((id.clone(), field.to_string())) {
            Entry::Occupied(shadow) => Ok(shadow.into_mut()),
            Entry::Vacant(slot) => {
                let live = repo.collection(id, field)?.clone();
                Ok(slot.insert(live))
            }
        }
    }

    /// Insert into the shadow, returning the recorded index
    ///
    /// `pos` of `None` appends.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` for a position past the end, plus the
    /// lookup errors of [`Repository::collection`].
    pub fn insert(
        &mut self,
        repo: &Repository,
        id: &ElementId,
        field: &str,
        value: &ElementId,
        pos: Option<usize>,
    ) -> Result<usize> {
        let shadow = self.entry(repo, id, field)?;
        let index = pos.unwrap_or(shadow.len());
        if index > shadow.len() {
            return Err(ModelXError::IndexOutOfBounds {
                element_id: id.to_string(),
                field: field.to_string(),
                index,
                len: shadow.len(),
            });
        }
        shadow.insert(index, value.clone());
        Ok(index)
    }

    /// Remove a value from the shadow, returning the recorded index
    ///
    /// # Errors
    ///
    /// Returns `ValueNotInCollection` if the value is absent.
    pub fn remove(&mut self, repo: &Repository, id: &ElementId, field: &str, value: &ElementId) -> Result<usize> {
        let shadow = self.entry(repo, id, field)?;
        let index = shadow
            .iter()
            .position(|v| v == value)
            .ok_or_else(|| ModelXError::ValueNotInCollection {
                element_id: id.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            })?;
        shadow.remove(index);
        Ok(index)
    }

    /// Remove by position, returning the value that was there
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `pos` is past the end.
    pub fn remove_at(&mut self, repo: &Repository, id: &ElementId, field: &str, pos: usize) -> Result<ElementId> {
        let shadow = self.entry(repo, id, field)?;
        if pos >= shadow.len() {
            return Err(ModelXError::IndexOutOfBounds {
                element_id: id.to_string(),
                field: field.to_string(),
                index: pos,
                len: shadow.len(),
            });
        }
        Ok(shadow.remove(pos))
    }

    /// Mirror a move of `child` between two owners' collections
    ///
    /// Only shadows that already exist change; a collection not yet touched
    /// is cloned from the live state when first needed.
    pub fn relocate(&mut self, field: &str, child: &ElementId, old_parent: &ElementId, new_parent: &ElementId) {
        if let Some(shadow) = self.collections.get_mut(&(old_parent.clone(), field.to_string())) {
            shadow.retain(|v| v != child);
        }
        if let Some(shadow) = self.collections.get_mut(&(new_parent.clone(), field.to_string())) {
            shadow.push(child.clone());
        }
    }

    pub fn get(&self, id: &ElementId, field: &str) -> Option<&[ElementId]> {
        self.collections
            .get(&(id.clone(), field.to_string()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn clear(&mut self) {
        self.collections.clear();
    }
}
