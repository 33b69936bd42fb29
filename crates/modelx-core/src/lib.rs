//! ModelX Core - schema-driven object-graph store with a reversible change log
//!
//! This crate provides:
//! - A time-ordered identifier generator with a base64 codec
//! - A runtime-extensible meta-model registry with single inheritance
//! - An element arena with exclusive ownership edges and weak references
//! - An operation log that records every mutation as a replayable batch
//! - Undo/redo replay of recorded batches
//! - A total rule validator over the live graph
//! - Structural invariant checks of the ownership tree
//!
//! All process-wide state is owned by a [`Session`], constructed once per
//! process or test and reset explicitly.

pub mod config;
pub mod errors;
pub mod graph;
pub mod guard;
pub mod id;
pub mod logging_facility;
pub mod meta;
pub mod model;
pub mod oplog;
pub mod replay;
pub mod rules;
pub mod session;

// Re-export commonly used types
pub use config::SessionConfig;
pub use errors::{ErrorCategory, ExError, ExErrorKind, ModelXError, Result};
pub use graph::{Repository, SubtreeSnapshot};
pub use id::IdGenerator;
pub use meta::{AttributeDescriptor, AttributeKind, MetaModel, TypeDescriptor, TypeKind};
pub use model::{CustomValue, CustomValueHooks, Element, Value};
pub use modelx_core_types::{schema, ElementId, OperationId};
pub use oplog::{ListenerId, LogEvent, OpEntry, Operation, OperationLog};
pub use replay::History;
pub use rules::{Rule, RuleContext, RuleSet, ValidationFailure};
pub use session::Session;
