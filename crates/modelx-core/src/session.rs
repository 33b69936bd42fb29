//! Owned context holding every piece of mutable state
//!
//! A [`Session`] bundles the registry, the element arena, the rule table,
//! the operation log, the id generator, and undo history. Its mutators
//! record each change in the current operation and then apply it, so a
//! committed operation replays to exactly the state the mutators produced.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::errors::{ModelXError, Result};
use crate::graph::{self, Repository};
use crate::guard::CallbackError;
use crate::id::IdGenerator;
use crate::logging_facility;
use crate::meta::{AttributeKind, MetaModel};
use crate::model::{CustomValueHooks, Element, Value};
use crate::oplog::{ListenerId, LogEvent, Operation, OperationLog};
use crate::replay::History;
use crate::rules::{Rule, RuleSet, ValidationFailure};
use crate::{log_op_error, ElementId, OperationId};

#[derive(Debug, Default)]
pub struct Session {
    meta: MetaModel,
    repo: Repository,
    rules: RuleSet,
    log: OperationLog,
    ids: IdGenerator,
    history: History,
    config: SessionConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from configuration
    ///
    /// Initializes logging if the config names a profile.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        if let Some(profile) = config.log_profile {
            logging_facility::init(profile);
        }

        let mut ids = IdGenerator::new();
        if let Some(base) = &config.id_base {
            ids.set_base(base)?;
        }
        if let Some(base) = config.id_base_numeric {
            ids.set_base_numeric(base);
        }
        let history = match config.history_depth {
            Some(depth) => History::with_depth(depth),
            None => History::new(),
        };

        Ok(Self {
            ids,
            history,
            config,
            ..Self::default()
        })
    }

    /// Drop all types, elements, rules, listeners, and history
    ///
    /// The id base and custom value hooks are kept.
    pub fn reset(&mut self) {
        self.meta.clear();
        self.repo.clear();
        self.rules.clear();
        self.log = OperationLog::new();
        self.history.clear();
        tracing::debug!("session reset");
    }

    // ===== Accessors =====

    pub fn meta(&self) -> &MetaModel {
        &self.meta
    }

    /// Direct registry access; registering here drops the is-a table until
    /// the next [`MetaModel::finalize`] or [`Session::register_schema`]
    pub fn meta_mut(&mut self) -> &mut MetaModel {
        &mut self.meta
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Direct repository access; changes made here are not recorded
    pub fn repo_mut(&mut self) -> &mut Repository {
        &mut self.repo
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ===== Registration =====

    /// Merge a JSON schema fragment into the registry
    ///
    /// The is-a table is rebuilt after every accepted fragment.
    ///
    /// # Errors
    ///
    /// See [`MetaModel::register_json`].
    pub fn register_schema(&mut self, fragment: &serde_json::Value) -> Result<usize> {
        let count = self.meta.register_json(fragment)?;
        self.meta.finalize();
        Ok(count)
    }

    pub fn add_rules<I: IntoIterator<Item = Rule>>(&mut self, rules: I) {
        self.rules.add_rules(rules);
    }

    pub fn register_custom(&mut self, type_name: impl Into<String>, hooks: Arc<dyn CustomValueHooks>) {
        self.repo.register_custom(type_name, hooks);
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LogEvent<'_>) -> std::result::Result<(), CallbackError> + 'static,
    {
        self.log.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.log.unsubscribe(id)
    }

    // ===== Operation lifecycle =====

    /// Begin a recorded operation that will enter undo history
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` if one is already recording.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        self.begin_operation(name, false)
    }

    /// Begin a recorded operation that stays out of undo history
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` if one is already recording.
    pub fn begin_bypass(&mut self, name: &str) -> Result<()> {
        self.begin_operation(name, true)
    }

    fn begin_operation(&mut self, name: &str, bypass: bool) -> Result<()> {
        if self.log.is_recording() {
            return self.log.begin(name, bypass);
        }
        let id = OperationId::from_string(self.ids.generate().into_string());
        self.log.begin_with_id(id, name, bypass)
    }

    /// Finalize the current operation and push it onto undo history
    ///
    /// Empty and bypass operations are not pushed.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle.
    pub fn commit(&mut self) -> Result<OperationId> {
        let operation = self.log.end()?;
        let id = operation.id.clone();
        if !operation.is_empty() {
            let operation = operation.clone();
            self.history.push(operation);
        }
        Ok(id)
    }

    /// Drop the current operation without reverting applied changes
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle.
    pub fn discard(&mut self) -> Result<()> {
        self.log.discard()
    }

    /// The operation in progress or the last committed one
    pub fn operation(&self) -> Option<&Operation> {
        self.log.operation()
    }

    // ===== Recorded mutators =====

    /// Create an unowned element of `type_name` with schema defaults
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle or `UnknownType`.
    pub fn create_element(&mut self, type_name: &str) -> Result<ElementId> {
        self.log.require_recording("create_element")?;
        let id = self.repo.create(&self.meta, &mut self.ids, type_name)?;
        self.log.insert(&self.repo, &id)?;
        Ok(id)
    }

    /// Create an element of `type_name` owned by `parent.field`
    ///
    /// # Errors
    ///
    /// As [`Session::add_child`], plus `UnknownType`.
    pub fn create_child(&mut self, parent: &ElementId, field: &str, type_name: &str) -> Result<ElementId> {
        self.log.require_recording("create_child")?;
        self.repo.check_slot(parent, field, None)?;
        let mut element = Element::new(self.ids.generate(), type_name);
        element.attrs = self.meta.instantiate_defaults(type_name)?;
        self.add_child(parent, field, element)
    }

    /// Insert a new element as the last child of an owning field
    ///
    /// Records an Insert of the element followed by the field change on the
    /// owner (a collection insert for `objs`, an assignment for `obj`).
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `DuplicateElement`, or the
    /// slot errors of [`Repository::check_slot`].
    pub fn add_child(&mut self, parent: &ElementId, field: &str, mut element: Element) -> Result<ElementId> {
        self.log.require_recording("add_child")?;
        if self.repo.contains(&element.id) {
            return Err(ModelXError::DuplicateElement {
                element_id: element.id.to_string(),
            });
        }
        self.repo.check_slot(parent, field, None)?;
        let collection = matches!(self.repo.field(parent, field)?, Value::Objs(_));

        let id = element.id.clone();
        element.parent = Some(parent.clone());
        self.repo.add(element)?;
        self.log.insert(&self.repo, &id)?;

        if collection {
            let index = self.log.field_insert(&self.repo, parent, field, &id)?;
            self.repo.insert_into(parent, field, &id, index)?;
        } else {
            let value = Value::Obj(Some(id.clone()));
            self.log.field_assign(&self.repo, parent, field, value.clone())?;
            self.repo.set_field(parent, field, value)?;
        }
        Ok(id)
    }

    /// Remove an element and its owned subtree
    ///
    /// Weak references to removed elements elsewhere are left dangling.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle or `ElementNotFound`.
    pub fn delete(&mut self, id: &ElementId) -> Result<()> {
        self.log.require_recording("delete")?;
        self.repo.get(id)?;
        let owner = self.repo.owner_of(id);

        self.log.remove(&self.repo, id)?;
        if let Some((parent, field)) = owner {
            if matches!(self.repo.field(&parent, &field)?, Value::Objs(_)) {
                self.log.field_remove(&self.repo, &parent, &field, id)?;
            } else {
                self.log
                    .field_assign(&self.repo, &parent, &field, Value::Obj(None))?;
            }
            self.repo.detach(&parent, &field, id)?;
        }
        self.repo.remove_subtree(id)?;
        Ok(())
    }

    /// Assign a non-owning field
    ///
    /// Enum values must name a literal of the attribute's enum type when the
    /// schema declares one.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `ElementNotFound`, or
    /// `FieldKindMismatch` for owning fields and unknown literals.
    pub fn assign(&mut self, id: &ElementId, field: &str, value: Value) -> Result<()> {
        self.log.require_recording("assign")?;
        let element = self.repo.get(id)?;
        if value.is_owning() || element.get(field).is_some_and(Value::is_owning) {
            return Err(ModelXError::FieldKindMismatch {
                element_id: id.to_string(),
                field: field.to_string(),
                expected: "a non-owning field".to_string(),
            });
        }
        if let (Value::Enum(literal), Ok(Some(attribute))) =
            (&value, self.meta.attribute(&element.type_name, field))
        {
            let known = attribute.kind == AttributeKind::Enum
                && self
                    .meta
                    .literals(&attribute.type_name)
                    .is_ok_and(|literals| literals.contains(literal));
            if !known {
                return Err(ModelXError::FieldKindMismatch {
                    element_id: id.to_string(),
                    field: field.to_string(),
                    expected: format!("a literal of {}", attribute.type_name),
                });
            }
        }

        self.log.field_assign(&self.repo, id, field, value.clone())?;
        self.repo.set_field(id, field, value)?;
        Ok(())
    }

    /// Append a weak reference to a `refs` field; returns its index
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, or `FieldKindMismatch` if
    /// the field is not `refs`.
    pub fn add_ref(&mut self, id: &ElementId, field: &str, target: &ElementId) -> Result<usize> {
        self.log.require_recording("add_ref")?;
        self.require_refs(id, field)?;
        let index = self.log.field_insert(&self.repo, id, field, target)?;
        self.repo.insert_into(id, field, target, index)?;
        Ok(index)
    }

    /// Remove a weak reference from a `refs` field; returns its index
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `FieldKindMismatch`, or
    /// `ValueNotInCollection`.
    pub fn remove_ref(&mut self, id: &ElementId, field: &str, target: &ElementId) -> Result<usize> {
        self.log.require_recording("remove_ref")?;
        self.require_refs(id, field)?;
        let index = self.log.field_remove(&self.repo, id, field, target)?;
        self.repo.remove_from(id, field, target, index)?;
        Ok(index)
    }

    /// Move `value` to `pos` within an `objs` or `refs` field
    ///
    /// Returns the previous index. A reorder does not update the shadow of
    /// its collection, so it is only accepted before the operation's first
    /// insert or remove on that collection; inserts and removes after it
    /// are fine. Reorder first or split the work into two operations.
    ///
    /// # Errors
    ///
    /// Returns `NoOperationInProgress` when idle, `ReorderAfterEdit` if the
    /// collection was already edited in this operation,
    /// `ValueNotInCollection`, or a lookup error.
    pub fn reorder(&mut self, id: &ElementId, field: &str, value: &ElementId, pos: usize) -> Result<usize> {
        self.log.require_recording("reorder")?;
        if self.log.shadow(id, field).is_some() {
            let err = ModelXError::ReorderAfterEdit {
                element_id: id.to_string(),
                field: field.to_string(),
            };
            log_op_error!("reorder", err.clone(), duration_ms = 0);
            return Err(err);
        }
        self.log.field_reorder(&self.repo, id, field, value, pos)?;
        self.repo.move_within(id, field, value, pos)
    }

    /// Move an owned child to the end of the same field on another owner
    ///
    /// # Errors
    ///
    /// - `NoOperationInProgress` when idle
    /// - `NotOwned` if `child` has no owner
    /// - `FieldKindMismatch` unless the field is `objs` on both owners
    /// - `OwnershipCycle` if `new_parent` is inside the child's subtree
    pub fn relocate(&mut self, child: &ElementId, new_parent: &ElementId) -> Result<()> {
        self.log.require_recording("relocate")?;
        let (old_parent, field) = self
            .repo
            .owner_of(child)
            .ok_or_else(|| ModelXError::NotOwned {
                element_id: child.to_string(),
            })?;
        for owner in [&old_parent, new_parent] {
            if !matches!(self.repo.field(owner, &field)?, Value::Objs(_)) {
                return Err(ModelXError::FieldKindMismatch {
                    element_id: owner.to_string(),
                    field: field.clone(),
                    expected: "objs".to_string(),
                });
            }
        }
        self.repo.check_new_parent(new_parent, child)?;

        self.log
            .field_relocate(&self.repo, child, &field, &old_parent, new_parent)?;
        self.repo.detach(&old_parent, &field, child)?;
        self.repo.attach(new_parent, &field, child, None)?;
        Ok(())
    }

    fn require_refs(&self, id: &ElementId, field: &str) -> Result<()> {
        match self.repo.field(id, field)? {
            Value::Refs(_) => Ok(()),
            _ => Err(ModelXError::FieldKindMismatch {
                element_id: id.to_string(),
                field: field.to_string(),
                expected: "refs".to_string(),
            }),
        }
    }

    // ===== History =====

    /// Revert the most recent committed operation
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` while recording, `NothingToUndo`, or a
    /// replay error.
    pub fn undo(&mut self) -> Result<OperationId> {
        self.require_idle("undo")?;
        Ok(self.history.undo(&mut self.repo)?.id.clone())
    }

    /// Re-apply the most recently undone operation
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` while recording, `NothingToRedo`, or a
    /// replay error.
    pub fn redo(&mut self) -> Result<OperationId> {
        self.require_idle("redo")?;
        Ok(self.history.redo(&mut self.repo)?.id.clone())
    }

    fn require_idle(&self, op: &str) -> Result<()> {
        match self.log.operation() {
            Some(current) if self.log.is_recording() => Err(ModelXError::OperationInProgress {
                name: op.to_string(),
                current: current.name.clone(),
            }),
            _ => Ok(()),
        }
    }

    // ===== Validation =====

    /// Evaluate all rules over the graph
    pub fn validate(&self) -> Vec<ValidationFailure> {
        self.rules.validate(&self.repo, &self.meta)
    }

    /// Evaluate all applicable rules on one element
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if the element does not exist.
    pub fn validate_element(&self, id: &ElementId) -> Result<Vec<ValidationFailure>> {
        self.rules.validate_element(&self.repo, &self.meta, id)
    }

    /// Check the ownership tree and type resolution
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate_structure(&self) -> Result<()> {
        graph::validate_structure(&self.repo, &self.meta)
    }
}
