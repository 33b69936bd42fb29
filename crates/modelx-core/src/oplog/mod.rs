//! Transactional change log
//!
//! Every mutation of the graph is recorded as an entry of the operation in
//! progress. A committed [`Operation`] is self-contained: it carries old
//! values and full subtree snapshots, so it can be replayed in either
//! direction without consulting anything else.

pub mod log;
pub mod observer;
pub mod operation;
pub mod shadow;

pub use log::OperationLog;
pub use observer::{ListenerId, LogEvent};
pub use operation::{AssignArg, IndexedArg, OpEntry, Operation, RelocateArg, ReorderArg};
