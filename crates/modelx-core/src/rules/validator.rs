use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::rule::{Rule, RuleContext};
use crate::errors::{ExError, ModelXError, Result};
use crate::graph::Repository;
use crate::guard::run_guarded;
use crate::meta::MetaModel;
use crate::model::Element;
use crate::schema::EVENT_CONSTRAINT_FAILED;
use crate::{log_op_end, log_op_start, ElementId};

/// One violated (or failed) constraint on one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub element_id: ElementId,
    pub rule_id: String,
    pub message: String,
    /// Set when the constraint errored or panicked instead of answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Rule table in registration order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: IndexMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a rule; a replaced rule keeps its position
    pub fn add_rule(&mut self, rule: Rule) {
        tracing::debug!(rule_id = %rule.id, "register rule");
        self.rules.insert(rule.id.clone(), rule);
    }

    pub fn add_rules<I: IntoIterator<Item = Rule>>(&mut self, rules: I) {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn remove_rule(&mut self, id: &str) -> Option<Rule> {
        self.rules.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Evaluate every rule on every applicable element
    ///
    /// Never stops early: a constraint that answers false, returns `Err`,
    /// or panics yields a failure for that element and evaluation moves on.
    /// Failures are ordered by rule registration, then element insertion.
    pub fn validate(&self, repo: &Repository, meta: &MetaModel) -> Vec<ValidationFailure> {
        let start = Instant::now();
        log_op_start!("validate", rule_count = self.rules.len(), element_count = repo.len());

        let ctx = RuleContext::new(repo, meta);
        let mut failures = Vec::new();
        for rule in self.rules.values() {
            for element in repo.iter().filter(|e| rule.applies(e, meta)) {
                failures.extend(evaluate(rule, element, &ctx));
            }
        }

        log_op_end!(
            "validate",
            duration_ms = start.elapsed().as_millis() as u64,
            failure_count = failures.len()
        );
        failures
    }

    /// Evaluate every applicable rule on one element
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if the element does not exist.
    pub fn validate_element(&self, repo: &Repository, meta: &MetaModel, id: &ElementId) -> Result<Vec<ValidationFailure>> {
        let element = repo.get(id)?;
        let ctx = RuleContext::new(repo, meta);
        Ok(self
            .rules
            .values()
            .filter(|rule| rule.applies(element, meta))
            .filter_map(|rule| evaluate(rule, element, &ctx))
            .collect())
    }
}

fn evaluate(rule: &Rule, element: &Element, ctx: &RuleContext<'_>) -> Option<ValidationFailure> {
    let failure = |error: Option<String>| ValidationFailure {
        element_id: element.id.clone(),
        rule_id: rule.id.clone(),
        message: rule.message.clone(),
        error,
    };

    match run_guarded(|| rule.check(element, ctx)) {
        Ok(true) => None,
        Ok(false) => Some(failure(None)),
        Err(err) => {
            let ex: ExError = ModelXError::ConstraintFailed {
                rule_id: rule.id.clone(),
                element_id: element.id.to_string(),
                message: err.message().to_string(),
                panicked: err.is_panic(),
            }
            .into();
            tracing::warn!(
                component = module_path!(),
                op = "validate",
                event = EVENT_CONSTRAINT_FAILED,
                rule_id = %rule.id,
                element_id = %element.id,
                panicked = err.is_panic(),
                error = err.message(),
                err.code = ex.code(),
                "{}",
                ex.message()
            );
            Some(failure(Some(err.to_string())))
        }
    }
}
