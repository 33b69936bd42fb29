//! Element arena with ownership and weak-reference navigation

pub mod invariants;
pub mod repository;
pub mod snapshot;

pub use invariants::validate_structure;
pub use repository::Repository;
pub use snapshot::SubtreeSnapshot;
