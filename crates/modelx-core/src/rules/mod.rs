//! Declarative constraints over the live graph

pub mod rule;
pub mod validator;

pub use rule::{Constraint, Rule, RuleContext};
pub use validator::{RuleSet, ValidationFailure};
