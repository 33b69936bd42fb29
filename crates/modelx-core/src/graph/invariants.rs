//! Structural checks of the ownership tree
//!
//! Each `find_*` function reports every violation of one invariant;
//! [`validate_structure`] runs them all and fails on the first one found.

use std::collections::{BTreeMap, HashSet};

use super::repository::Repository;
use crate::errors::{ModelXError, Result};
use crate::meta::MetaModel;
use crate::ElementId;

/// Check if an element's parent chain loops
pub fn has_cycle(repo: &Repository, id: &ElementId) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(id);

    while let Some(cursor) = current {
        if !visited.insert(cursor) {
            return true;
        }
        current = repo.find(cursor).and_then(|e| e.parent.as_ref());
    }

    false
}

/// Owning edges naming elements absent from the repository
///
/// Returns (owner, field, missing child) tuples
pub fn find_dangling_owned(repo: &Repository) -> Vec<(ElementId, String, ElementId)> {
    let mut dangling = Vec::new();

    for element in repo.iter() {
        for (field, value) in &element.attrs {
            for child in value.owned_ids() {
                if !repo.contains(child) {
                    dangling.push((element.id.clone(), field.clone(), child.clone()));
                }
            }
        }
    }

    dangling
}

/// Elements held by more than one owning edge
///
/// An element listed twice in the same collection counts as two owners.
pub fn find_multiple_owners(repo: &Repository) -> Vec<(ElementId, Vec<ElementId>)> {
    let mut owners: BTreeMap<&ElementId, Vec<ElementId>> = BTreeMap::new();

    for element in repo.iter() {
        for child in element.owned_children() {
            owners.entry(child).or_default().push(element.id.clone());
        }
    }

    owners
        .into_iter()
        .filter(|(_, list)| list.len() > 1)
        .map(|(child, list)| (child.clone(), list))
        .collect()
}

/// Elements whose parent chain loops, with the parent they point at
pub fn find_ownership_cycles(repo: &Repository) -> Vec<(ElementId, ElementId)> {
    repo.iter()
        .filter(|e| has_cycle(repo, &e.id))
        .filter_map(|e| e.parent.clone().map(|p| (e.id.clone(), p)))
        .collect()
}

/// Parent pointers that disagree with the owning edges
///
/// Returns (element, owner by edge, parent pointer) tuples. Elements owned
/// by several parents are reported by [`find_multiple_owners`] instead.
pub fn find_parent_mismatches(
    repo: &Repository,
) -> Vec<(ElementId, Option<ElementId>, Option<ElementId>)> {
    let mut edge_owner: BTreeMap<&ElementId, Vec<&ElementId>> = BTreeMap::new();
    for element in repo.iter() {
        for child in element.owned_children() {
            edge_owner.entry(child).or_default().push(&element.id);
        }
    }

    let mut mismatches = Vec::new();
    for element in repo.iter() {
        let expected = match edge_owner.get(&element.id).map(Vec::as_slice) {
            None | Some([]) => None,
            Some([single]) => Some(*single),
            Some(_) => continue,
        };
        if expected != element.parent.as_ref() {
            mismatches.push((
                element.id.clone(),
                expected.cloned(),
                element.parent.clone(),
            ));
        }
    }

    mismatches
}

/// Elements whose type, or one of its ancestors, is not registered
pub fn find_unresolved_types(repo: &Repository, meta: &MetaModel) -> Vec<(ElementId, String)> {
    repo.iter()
        .filter(|e| meta.super_chain(&e.type_name).is_err())
        .map(|e| (e.id.clone(), e.type_name.clone()))
        .collect()
}

/// Validate the ownership tree and type resolution
///
/// # Errors
///
/// Returns the first violation found, checked in this order: dangling
/// owned ids, multiple owners, ownership cycles, parent pointer
/// mismatches, unresolved types. Call the `find_*` functions for an
/// exhaustive report.
pub fn validate_structure(repo: &Repository, meta: &MetaModel) -> Result<()> {
    if let Some((element_id, field, child_id)) = find_dangling_owned(repo).into_iter().next() {
        return Err(ModelXError::DanglingOwnedElement {
            element_id: element_id.to_string(),
            field,
            child_id: child_id.to_string(),
        });
    }

    if let Some((element_id, owners)) = find_multiple_owners(repo).into_iter().next() {
        return Err(ModelXError::MultipleOwners {
            element_id: element_id.to_string(),
            owners: owners.iter().map(ToString::to_string).collect(),
        });
    }

    if let Some((element_id, parent_id)) = find_ownership_cycles(repo).into_iter().next() {
        return Err(ModelXError::OwnershipCycle {
            element_id: element_id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }

    if let Some((element_id, expected, actual)) = find_parent_mismatches(repo).into_iter().next() {
        return Err(ModelXError::ParentPointerMismatch {
            element_id: element_id.to_string(),
            expected: expected.map(|e| e.to_string()),
            actual: actual.map(|a| a.to_string()),
        });
    }

    if let Some((element_id, type_name)) = find_unresolved_types(repo, meta).into_iter().next() {
        return Err(ModelXError::UnresolvedType {
            element_id: element_id.to_string(),
            type_name,
        });
    }

    Ok(())
}
