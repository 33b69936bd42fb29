//! Core types shared across ModelX crates
//!
//! - **Identity types**: ElementId, OperationId
//! - **Schema constants**: Canonical log field keys and event names

pub mod ids;
pub mod schema;

pub use ids::{ElementId, OperationId};
