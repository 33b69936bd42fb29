use std::sync::Arc;

use crate::graph::Repository;
use crate::guard::CallbackError;
use crate::meta::MetaModel;
use crate::model::Element;
use crate::ElementId;

/// Read-only view of the graph handed to constraints
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub repo: &'a Repository,
    pub meta: &'a MetaModel,
}

impl<'a> RuleContext<'a> {
    pub fn new(repo: &'a Repository, meta: &'a MetaModel) -> Self {
        Self { repo, meta }
    }

    pub fn find(&self, id: &ElementId) -> Option<&'a Element> {
        self.repo.find(id)
    }

    pub fn instances_of<S: AsRef<str>>(&self, type_names: &[S]) -> Vec<&'a Element> {
        self.repo.instances_of(self.meta, type_names)
    }

    pub fn is_a(&self, element: &Element, type_name: &str) -> bool {
        self.meta.is_subtype(&element.type_name, type_name)
    }
}

/// Predicate evaluated per element; `Ok(false)` is a violation
pub type Constraint =
    Arc<dyn Fn(&Element, &RuleContext<'_>) -> Result<bool, CallbackError> + Send + Sync>;

/// A named constraint over instances of some types
#[derive(Clone)]
pub struct Rule {
    pub id: String,
    pub message: String,
    /// Types (and their subtypes) the rule applies to
    pub applies_to: Vec<String>,
    /// Types (and their subtypes) excluded even if they match `applies_to`
    pub exceptions: Vec<String>,
    constraint: Constraint,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("applies_to", &self.applies_to)
            .field("exceptions", &self.exceptions)
            .finish_non_exhaustive()
    }
}

impl Rule {
    pub fn new<I, S, F>(id: impl Into<String>, message: impl Into<String>, applies_to: I, constraint: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Element, &RuleContext<'_>) -> Result<bool, CallbackError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            message: message.into(),
            applies_to: applies_to.into_iter().map(Into::into).collect(),
            exceptions: Vec::new(),
            constraint: Arc::new(constraint),
        }
    }

    pub fn except<I, S>(mut self, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exceptions = exceptions.into_iter().map(Into::into).collect();
        self
    }

    /// True if `element` is an instance of an applicable, non-excepted type
    pub fn applies(&self, element: &Element, meta: &MetaModel) -> bool {
        meta.is_subtype_of_any(&element.type_name, self.applies_to.as_slice())
            && !meta.is_subtype_of_any(&element.type_name, self.exceptions.as_slice())
    }

    /// Evaluate the constraint without any guard
    ///
    /// # Errors
    ///
    /// Propagates the constraint's own error.
    pub fn check(&self, element: &Element, ctx: &RuleContext<'_>) -> Result<bool, CallbackError> {
        (self.constraint)(element, ctx)
    }
}
