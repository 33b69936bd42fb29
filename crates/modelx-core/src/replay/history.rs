use crate::errors::{ModelXError, Result};
use crate::graph::Repository;
use crate::oplog::Operation;

/// Undo and redo stacks of committed operations
///
/// Bypass operations are never pushed. A new push clears the redo stack;
/// with a depth limit the oldest undo entries are dropped first.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo: Vec<Operation>,
    redo: Vec<Operation>,
    depth: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `depth` undoable operations
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Record a committed operation; returns false if it was a bypass
    pub fn push(&mut self, operation: Operation) -> bool {
        if operation.bypass {
            return false;
        }
        self.redo.clear();
        self.undo.push(operation);
        if let Some(depth) = self.depth {
            let excess = self.undo.len().saturating_sub(depth);
            self.undo.drain(..excess);
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Operation the next undo would revert
    pub fn peek_undo(&self) -> Option<&Operation> {
        self.undo.last()
    }

    pub fn peek_redo(&self) -> Option<&Operation> {
        self.redo.last()
    }

    /// Revert the most recent operation
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo`, or the replay error; a failed operation
    /// stays on the undo stack and the repository is left unchanged.
    pub fn undo(&mut self, repo: &mut Repository) -> Result<&Operation> {
        let operation = self.undo.pop().ok_or(ModelXError::NothingToUndo)?;
        if let Err(err) = super::undo(repo, &operation) {
            self.undo.push(operation);
            return Err(err);
        }
        self.redo.push(operation);
        self.redo.last().ok_or_else(|| ModelXError::Internal {
            message: "redo stack empty after push".to_string(),
        })
    }

    /// Re-apply the most recently undone operation
    ///
    /// # Errors
    ///
    /// Returns `NothingToRedo`, or the replay error; a failed operation
    /// stays on the redo stack and the repository is left unchanged.
    pub fn redo(&mut self, repo: &mut Repository) -> Result<&Operation> {
        let operation = self.redo.pop().ok_or(ModelXError::NothingToRedo)?;
        if let Err(err) = super::redo(repo, &operation) {
            self.redo.push(operation);
            return Err(err);
        }
        self.undo.push(operation);
        self.undo.last().ok_or_else(|| ModelXError::Internal {
            message: "undo stack empty after push".to_string(),
        })
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, Value};
    use crate::oplog::{AssignArg, OpEntry};
    use crate::{ElementId, OperationId};

    fn rename(to: &str, from: &str, bypass: bool) -> Operation {
        let mut op = Operation::new(OperationId::new(), format!("rename {}", to), bypass);
        op.ops.push(OpEntry::FieldAssign(AssignArg {
            elem: ElementId::from("e"),
            field: "name".to_string(),
            val: Value::from(to),
            old_val: Value::from(from),
        }));
        op
    }

    fn repo() -> Repository {
        let mut repo = Repository::new();
        repo.add(Element::new("e", "Class").with_attr("name", "v0")).unwrap();
        repo
    }

    fn name(repo: &Repository) -> &str {
        repo.get(&ElementId::from("e")).unwrap().str_attr("name").unwrap()
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut repo = repo();
        let mut history = History::new();

        repo.set_field(&"e".into(), "name", Value::from("v1")).unwrap();
        assert!(history.push(rename("v1", "v0", false)));

        assert_eq!(history.undo(&mut repo).unwrap().name, "rename v1");
        assert_eq!(name(&repo), "v0");
        assert!(history.can_redo());

        history.redo(&mut repo).unwrap();
        assert_eq!(name(&repo), "v1");
        assert!(matches!(history.redo(&mut repo), Err(ModelXError::NothingToRedo)));
    }

    #[test]
    fn test_bypass_not_recorded_and_push_clears_redo() {
        let mut repo = repo();
        let mut history = History::new();

        assert!(!history.push(rename("x", "v0", true)));
        assert!(!history.can_undo());
        assert!(matches!(history.undo(&mut repo), Err(ModelXError::NothingToUndo)));

        history.push(rename("v1", "v0", false));
        history.undo(&mut repo).unwrap();
        assert_eq!(history.redo_len(), 1);
        history.push(rename("v2", "v0", false));
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_depth_limit_drops_oldest() {
        let mut history = History::with_depth(2);
        for i in 0..5 {
            history.push(rename(&format!("v{}", i + 1), &format!("v{}", i), false));
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.peek_undo().map(|o| o.name.as_str()), Some("rename v5"));
    }

    #[test]
    fn test_failed_undo_stays_on_stack() {
        let mut repo = Repository::new();
        let mut history = History::new();
        history.push(rename("v1", "v0", false));

        assert!(matches!(
            history.undo(&mut repo),
            Err(ModelXError::ElementNotFound { .. })
        ));
        assert_eq!(history.undo_len(), 1);
    }
}
