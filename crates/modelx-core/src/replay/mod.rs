//! Forward and backward replay of committed operations
//!
//! Entries carry everything replay needs: old values, full snapshots, and
//! both indices of a move. Replay runs against a staged copy of the
//! repository and swaps it in only when every entry applied, so a failed
//! replay leaves the graph untouched. Nothing is recorded.

pub mod history;

pub use history::History;

use crate::errors::{ModelXError, Result};
use crate::graph::Repository;
use crate::model::Value;
use crate::oplog::{OpEntry, Operation};
use crate::ElementId;

/// Apply an operation's entries in recorded order
///
/// # Errors
///
/// Returns `ReplayMismatch` or a lookup error if the repository is not in
/// the state the operation was recorded against. The repository is left
/// unchanged in that case.
pub fn redo(repo: &mut Repository, operation: &Operation) -> Result<()> {
    let mut staged = repo.clone();
    for entry in &operation.ops {
        apply(&mut staged, entry)?;
    }
    *repo = staged;
    tracing::debug!(operation_id = %operation.id, entry_count = operation.ops.len(), "redo");
    Ok(())
}

/// Apply the inverse of an operation's entries in reverse order
///
/// # Errors
///
/// Same as [`redo`].
pub fn undo(repo: &mut Repository, operation: &Operation) -> Result<()> {
    let mut staged = repo.clone();
    for entry in operation.ops.iter().rev() {
        revert(&mut staged, entry)?;
    }
    *repo = staged;
    tracing::debug!(operation_id = %operation.id, entry_count = operation.ops.len(), "undo");
    Ok(())
}

fn apply(repo: &mut Repository, entry: &OpEntry) -> Result<()> {
    match entry {
        OpEntry::Insert(snapshot) => repo.restore(snapshot),
        OpEntry::Remove(snapshot) => repo.remove_subtree(&snapshot.root).map(|_| ()),
        OpEntry::FieldAssign(arg) => repo.set_field(&arg.elem, &arg.field, arg.val.clone()).map(|_| ()),
        OpEntry::FieldInsert(arg) => insert_at(repo, &arg.elem, &arg.field, &arg.val, arg.pos),
        OpEntry::FieldRemove(arg) => remove_at(repo, &arg.elem, &arg.field, &arg.val, arg.pos),
        OpEntry::FieldReorder(arg) => repo
            .move_within(&arg.elem, &arg.field, &arg.val, arg.pos)
            .map(|_| ()),
        OpEntry::FieldRelocate(arg) => {
            let index = position(repo, &arg.old_parent, &arg.field, &arg.elem)?;
            remove_at(repo, &arg.old_parent, &arg.field, &arg.elem, index)?;
            let end = repo.collection(&arg.new_parent, &arg.field)?.len();
            insert_at(repo, &arg.new_parent, &arg.field, &arg.elem, end)
        }
    }
}

fn revert(repo: &mut Repository, entry: &OpEntry) -> Result<()> {
    match entry {
        OpEntry::Insert(snapshot) => repo.remove_subtree(&snapshot.root).map(|_| ()),
        OpEntry::Remove(snapshot) => repo.restore(snapshot),
        OpEntry::FieldAssign(arg) => repo
            .set_field(&arg.elem, &arg.field, arg.old_val.clone())
            .map(|_| ()),
        OpEntry::FieldInsert(arg) => remove_at(repo, &arg.elem, &arg.field, &arg.val, arg.pos),
        OpEntry::FieldRemove(arg) => insert_at(repo, &arg.elem, &arg.field, &arg.val, arg.pos),
        OpEntry::FieldReorder(arg) => {
            let old_pos = arg.old_pos.ok_or_else(|| ModelXError::ReplayMismatch {
                element_id: arg.elem.to_string(),
                field: arg.field.clone(),
                reason: "reorder recorded without its old index".to_string(),
            })?;
            repo.move_within(&arg.elem, &arg.field, &arg.val, old_pos)
                .map(|_| ())
        }
        OpEntry::FieldRelocate(arg) => {
            let index = position(repo, &arg.new_parent, &arg.field, &arg.elem)?;
            remove_at(repo, &arg.new_parent, &arg.field, &arg.elem, index)?;
            let end = repo.collection(&arg.old_parent, &arg.field)?.len();
            insert_at(repo, &arg.old_parent, &arg.field, &arg.elem, arg.old_pos.unwrap_or(end).min(end))
        }
    }
}

/// Insert into a collection; owned children get their parent pointer
fn insert_at(repo: &mut Repository, id: &ElementId, field: &str, value: &ElementId, pos: usize) -> Result<()> {
    let owning = is_owning(repo, id, field);
    let collection = repo.collection_mut(id, field)?;
    if pos > collection.len() {
        return Err(mismatch(
            id,
            field,
            format!("insert position {} past end {}", pos, collection.len()),
        ));
    }
    collection.insert(pos, value.clone());
    if owning {
        repo.set_parent(value, Some(id.clone()));
    }
    Ok(())
}

/// Remove from a collection, checking the recorded value sits at `pos`
fn remove_at(repo: &mut Repository, id: &ElementId, field: &str, value: &ElementId, pos: usize) -> Result<()> {
    let owning = is_owning(repo, id, field);
    let collection = repo.collection_mut(id, field)?;
    if collection.get(pos) != Some(value) {
        return Err(mismatch(id, field, format!("expected {} at position {}", value, pos)));
    }
    collection.remove(pos);
    if owning && repo.find(value).and_then(|e| e.parent.as_ref()) == Some(id) {
        repo.set_parent(value, None);
    }
    Ok(())
}

fn position(repo: &Repository, id: &ElementId, field: &str, value: &ElementId) -> Result<usize> {
    repo.collection(id, field)?
        .iter()
        .position(|v| v == value)
        .ok_or_else(|| mismatch(id, field, format!("{} is not in the collection", value)))
}

fn is_owning(repo: &Repository, id: &ElementId, field: &str) -> bool {
    matches!(repo.field(id, field), Ok(Value::Objs(_)))
}

fn mismatch(id: &ElementId, field: &str, reason: String) -> ModelXError {
    ModelXError::ReplayMismatch {
        element_id: id.to_string(),
        field: field.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Element;
    use crate::oplog::OperationLog;

    fn id(s: &str) -> ElementId {
        ElementId::from(s)
    }

    fn repo() -> Repository {
        let mut repo = Repository::new();
        for name in ["p1", "p2"] {
            repo.add(Element::new(name, "Package").with_attr("owned", Value::Objs(vec![])))
                .unwrap();
        }
        for name in ["a", "b"] {
            repo.add(Element::new(name, "Class").with_attr("name", name)).unwrap();
            repo.attach(&id("p1"), "owned", &id(name), None).unwrap();
        }
        repo
    }

    #[test]
    fn test_reorder_roundtrip() {
        let mut repo = repo();
        let before = repo.digest();
        let mut log = OperationLog::new();

        log.begin("reorder", false).unwrap();
        log.field_reorder(&repo, &id("p1"), "owned", &id("b"), 0).unwrap();
        repo.move_within(&id("p1"), "owned", &id("b"), 0).unwrap();
        let operation = log.end().unwrap().clone();
        let after = repo.digest();

        undo(&mut repo, &operation).unwrap();
        assert_eq!(repo.digest(), before);
        redo(&mut repo, &operation).unwrap();
        assert_eq!(repo.digest(), after);
    }

    #[test]
    fn test_relocate_roundtrip() {
        let mut repo = repo();
        let before = repo.digest();
        let mut log = OperationLog::new();

        log.begin("move", false).unwrap();
        log.field_relocate(&repo, &id("a"), "owned", &id("p1"), &id("p2")).unwrap();
        repo.detach(&id("p1"), "owned", &id("a")).unwrap();
        repo.attach(&id("p2"), "owned", &id("a"), None).unwrap();
        let operation = log.end().unwrap().clone();
        let after = repo.digest();

        undo(&mut repo, &operation).unwrap();
        assert_eq!(repo.digest(), before);
        assert_eq!(repo.get(&id("a")).unwrap().parent, Some(id("p1")));

        redo(&mut repo, &operation).unwrap();
        assert_eq!(repo.digest(), after);
        assert_eq!(repo.get(&id("a")).unwrap().parent, Some(id("p2")));
    }

    #[test]
    fn test_mismatched_state_is_reported() {
        let mut repo = repo();
        let mut log = OperationLog::new();

        log.begin("drop", false).unwrap();
        log.field_remove(&repo, &id("p1"), "owned", &id("a")).unwrap();
        let operation = log.end().unwrap().clone();

        repo.detach(&id("p1"), "owned", &id("a")).unwrap();
        repo.detach(&id("p1"), "owned", &id("b")).unwrap();
        assert!(matches!(
            redo(&mut repo, &operation),
            Err(ModelXError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_undo_leaves_repository_untouched() {
        let mut repo = repo();
        let mut log = OperationLog::new();

        log.begin("rename", false).unwrap();
        log.field_assign(&repo, &id("a"), "name", Value::from("a2")).unwrap();
        repo.set_field(&id("a"), "name", Value::from("a2")).unwrap();
        log.field_assign(&repo, &id("p1"), "label", Value::from("p1-2")).unwrap();
        repo.set_field(&id("p1"), "label", Value::from("p1-2")).unwrap();
        let operation = log.end().unwrap().clone();

        repo.remove_subtree(&id("a")).unwrap();
        let before = repo.digest();
        assert!(matches!(
            undo(&mut repo, &operation),
            Err(ModelXError::ElementNotFound { .. })
        ));
        assert_eq!(repo.digest(), before);
        assert_eq!(repo.field(&id("p1"), "label").unwrap(), &Value::from("p1-2"));
    }
}
