use std::time::Instant;

use super::observer::{ListenerId, LogEvent, Observers};
use super::operation::{AssignArg, IndexedArg, OpEntry, Operation, RelocateArg, ReorderArg};
use super::shadow::Shadows;
use crate::errors::{ModelXError, Result};
use crate::graph::Repository;
use crate::guard::CallbackError;
use crate::model::Value;
use crate::schema::EVENT_DISCARDED;
use crate::{log_op_end, log_op_error, log_op_start, ElementId, OperationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogState {
    Idle,
    Recording,
}

/// Records graph mutations into named operations
///
/// At most one operation records at a time: `begin` moves the log from
/// idle to recording, `end` or `discard` moves it back. Recording calls
/// read the repository to capture snapshots, old values and indices, but
/// never modify it. Callers apply the mutation themselves, after recording
/// it.
///
/// `discard` drops the entries but does not revert mutations that were
/// already applied.
#[derive(Debug)]
pub struct OperationLog {
    state: LogState,
    /// In-progress operation while recording, last committed one while idle
    operation: Option<Operation>,
    shadows: Shadows,
    observers: Observers,
    started: Option<Instant>,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            state: LogState::Idle,
            operation: None,
            shadows: Shadows::new(),
            observers: Observers::default(),
            started: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == LogState::Recording
    }

    /// The operation in progress, or the last committed one
    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    /// Shadow of a collection touched by the operation in progress
    pub fn shadow(&self, id: &ElementId, field: &str) -> Option<&[ElementId]> {
        self.shadows.get(id, field)
    }

    // ===== Observers =====

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LogEvent<'_>) -> std::result::Result<(), CallbackError> + 'static,
    {
        self.observers.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ===== Lifecycle =====

    /// Start recording a new operation with a time-ordered id
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` if an operation is already recording.
    pub fn begin(&mut self, name: &str, bypass: bool) -> Result<()> {
        self.begin_with_id(OperationId::new(), name, bypass)
    }

    /// Start recording a new operation under a caller-supplied id
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` if an operation is already recording.
    pub fn begin_with_id(&mut self, id: OperationId, name: &str, bypass: bool) -> Result<()> {
        if let (LogState::Recording, Some(current)) = (self.state, &self.operation) {
            let err = ModelXError::OperationInProgress {
                name: name.to_string(),
                current: current.name.clone(),
            };
            log_op_error!("begin", err.clone(), duration_ms = 0);
            return Err(err);
        }

        log_op_start!("begin", operation_id = %id, operation_name = name, bypass = bypass);
        self.operation = Some(Operation::new(id, name, bypass));
        self.shadows.clear();
        self.state = LogState::Recording;
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Finalize the operation in progress
    ///
    /// Drops the shadows, notifies listeners, and returns the committed
    /// operation. It stays available through [`OperationLog::operation`]
    /// until the next `begin`.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle.
    pub fn end(&mut self) -> Result<&Operation> {
        self.require_recording("end")?;
        self.state = LogState::Idle;
        self.shadows.clear();
        let duration_ms = self.elapsed_ms();

        let Some(operation) = self.operation.as_ref() else {
            return Err(ModelXError::Internal {
                message: "recording without an operation".to_string(),
            });
        };
        log_op_end!(
            "end",
            duration_ms = duration_ms,
            operation_id = %operation.id,
            entry_count = operation.ops.len()
        );
        self.observers
            .notify(&LogEvent::Committed { operation });
        Ok(operation)
    }

    /// Drop the operation in progress and its shadows
    ///
    /// Mutations already applied to the graph are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle.
    pub fn discard(&mut self) -> Result<()> {
        self.require_recording("discard")?;
        if let Some(operation) = self.operation.take() {
            tracing::info!(
                component = module_path!(),
                op = "discard",
                event = EVENT_DISCARDED,
                operation_id = %operation.id,
                entry_count = operation.ops.len()
            );
        }
        self.state = LogState::Idle;
        self.shadows.clear();
        self.started = None;
        Ok(())
    }

    // ===== Recording =====

    /// Record the insertion of an element and its owned subtree
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle or `ElementNotFound`.
    pub fn insert(&mut self, repo: &Repository, id: &ElementId) -> Result<()> {
        self.require_recording("insert")?;
        let snapshot = repo.snapshot(id).inspect_err(|e| log_failure("insert", e))?;
        self.push(OpEntry::Insert(snapshot));
        self.notify_last();
        Ok(())
    }

    /// Record the removal of an element and its owned subtree
    ///
    /// Must be called before the subtree leaves the repository.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle or `ElementNotFound`.
    pub fn remove(&mut self, repo: &Repository, id: &ElementId) -> Result<()> {
        self.require_recording("remove")?;
        let snapshot = repo.snapshot(id).inspect_err(|e| log_failure("remove", e))?;
        self.push(OpEntry::Remove(snapshot));
        self.notify_last();
        Ok(())
    }

    /// Record a field assignment, capturing the current value as old value
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle or `ElementNotFound`.
    pub fn field_assign(&mut self, repo: &Repository, id: &ElementId, field: &str, value: Value) -> Result<()> {
        self.require_recording("field_assign")?;
        let old_val = repo
            .read_field(id, field)
            .inspect_err(|e| log_failure("field_assign", e))?;
        self.push(OpEntry::FieldAssign(AssignArg {
            elem: id.clone(),
            field: field.to_string(),
            val: value,
            old_val,
        }));
        Ok(())
    }

    /// Record an append to a collection; returns the recorded index
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, or a lookup error if the
    /// field is not a collection.
    pub fn field_insert(&mut self, repo: &Repository, id: &ElementId, field: &str, value: &ElementId) -> Result<usize> {
        self.record_insert(repo, id, field, value, None)
    }

    /// Record an insert at `pos`; returns the recorded index
    ///
    /// # Errors
    ///
    /// As [`OperationLog::field_insert`], plus `IndexOutOfBounds`.
    pub fn field_insert_at(
        &mut self,
        repo: &Repository,
        id: &ElementId,
        field: &str,
        value: &ElementId,
        pos: usize,
    ) -> Result<usize> {
        self.record_insert(repo, id, field, value, Some(pos))
    }

    fn record_insert(
        &mut self,
        repo: &Repository,
        id: &ElementId,
        field: &str,
        value: &ElementId,
        pos: Option<usize>,
    ) -> Result<usize> {
        self.require_recording("field_insert")?;
        let index = self
            .shadows
            .insert(repo, id, field, value, pos)
            .inspect_err(|e| log_failure("field_insert", e))?;
        self.push(OpEntry::FieldInsert(IndexedArg {
            elem: id.clone(),
            field: field.to_string(),
            val: value.clone(),
            pos: index,
        }));
        Ok(index)
    }

    /// Record the removal of a value from a collection; returns its index
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `ValueNotInCollection` if
    /// the value is not in the shadow, or a lookup error.
    pub fn field_remove(&mut self, repo: &Repository, id: &ElementId, field: &str, value: &ElementId) -> Result<usize> {
        self.require_recording("field_remove")?;
        let index = self
            .shadows
            .remove(repo, id, field, value)
            .inspect_err(|e| log_failure("field_remove", e))?;
        self.push(OpEntry::FieldRemove(IndexedArg {
            elem: id.clone(),
            field: field.to_string(),
            val: value.clone(),
            pos: index,
        }));
        Ok(index)
    }

    /// Record the removal at `pos`; returns the removed value
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `IndexOutOfBounds`, or a
    /// lookup error.
    pub fn field_remove_at(&mut self, repo: &Repository, id: &ElementId, field: &str, pos: usize) -> Result<ElementId> {
        self.require_recording("field_remove")?;
        let value = self
            .shadows
            .remove_at(repo, id, field, pos)
            .inspect_err(|e| log_failure("field_remove", e))?;
        self.push(OpEntry::FieldRemove(IndexedArg {
            elem: id.clone(),
            field: field.to_string(),
            val: value.clone(),
            pos,
        }));
        Ok(value)
    }

    /// Record a move of `value` to `pos` within a collection
    ///
    /// The current live index is recorded as the old position. Shadows are
    /// neither consulted nor updated, so a later insert or remove on the
    /// same collection in this operation indexes against the pre-move
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `ValueNotInCollection`, or
    /// a lookup error.
    pub fn field_reorder(
        &mut self,
        repo: &Repository,
        id: &ElementId,
        field: &str,
        value: &ElementId,
        pos: usize,
    ) -> Result<()> {
        self.require_recording("field_reorder")?;
        let old_pos = live_index(repo, id, field, value).inspect_err(|e| log_failure("field_reorder", e))?;
        self.push(OpEntry::FieldReorder(ReorderArg {
            elem: id.clone(),
            field: field.to_string(),
            val: value.clone(),
            pos,
            old_pos: Some(old_pos),
        }));
        Ok(())
    }

    /// Record a move of `child` from one owner's collection to another's
    ///
    /// Existing shadows of both owners follow the move, so later inserts
    /// and removes on either collection index against the moved state.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `ValueNotInCollection` if
    /// `child` is not in the old owner's collection, or a lookup error.
    pub fn field_relocate(
        &mut self,
        repo: &Repository,
        child: &ElementId,
        field: &str,
        old_parent: &ElementId,
        new_parent: &ElementId,
    ) -> Result<()> {
        self.require_recording("field_relocate")?;
        let old_pos =
            live_index(repo, old_parent, field, child).inspect_err(|e| log_failure("field_relocate", e))?;
        self.push(OpEntry::FieldRelocate(RelocateArg {
            elem: child.clone(),
            field: field.to_string(),
            old_parent: old_parent.clone(),
            new_parent: new_parent.clone(),
            old_pos: Some(old_pos),
        }));
        self.shadows.relocate(field, child, old_parent, new_parent);
        Ok(())
    }

    // ===== Internals =====

    /// Fail with a contract error unless an operation is recording
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle.
    pub fn require_recording(&self, op: &str) -> Result<()> {
        if self.state == LogState::Recording {
            return Ok(());
        }
        let err = ModelXError::NoOperationInProgress { op: op.to_string() };
        log_op_error!(op, err.clone(), duration_ms = 0);
        Err(err)
    }

    fn push(&mut self, entry: OpEntry) {
        if let Some(operation) = self.operation.as_mut() {
            tracing::debug!(
                operation_id = %operation.id,
                opcode = %entry.opcode(),
                element_id = %entry.element_id(),
                "record"
            );
            operation.ops.push(entry);
        }
    }

    fn notify_last(&mut self) {
        let Some(operation) = self.operation.as_ref() else {
            return;
        };
        let event = match operation.ops.last() {
            Some(OpEntry::Insert(snapshot)) => LogEvent::Inserted {
                operation: &operation.id,
                snapshot,
            },
            Some(OpEntry::Remove(snapshot)) => LogEvent::Removed {
                operation: &operation.id,
                snapshot,
            },
            _ => return,
        };
        self.observers.notify(&event);
    }

    fn elapsed_ms(&mut self) -> u64 {
        self.started
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

fn live_index(repo: &Repository, id: &ElementId, field: &str, value: &ElementId) -> Result<usize> {
    repo.collection(id, field)?
        .iter()
        .position(|v| v == value)
        .ok_or_else(|| ModelXError::ValueNotInCollection {
            element_id: id.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn log_failure(op: &str, err: &ModelXError) {
    log_op_error!(op, err.clone(), duration_ms = 0);
}
