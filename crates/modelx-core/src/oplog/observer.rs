use std::collections::BTreeMap;

use super::operation::Operation;
use crate::errors::{ExError, ModelXError};
use crate::graph::SubtreeSnapshot;
use crate::guard::{run_guarded, CallbackError};
use crate::schema::EVENT_LISTENER_FAILED;
use crate::OperationId;

/// Notification delivered to log listeners
#[derive(Debug, Clone, Copy)]
pub enum LogEvent<'a> {
    Inserted {
        operation: &'a OperationId,
        snapshot: &'a SubtreeSnapshot,
    },
    Removed {
        operation: &'a OperationId,
        snapshot: &'a SubtreeSnapshot,
    },
    Committed {
        operation: &'a Operation,
    },
}

impl LogEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            LogEvent::Inserted { .. } => "inserted",
            LogEvent::Removed { .. } => "removed",
            LogEvent::Committed { .. } => "committed",
        }
    }

    pub fn operation_id(&self) -> &OperationId {
        match self {
            LogEvent::Inserted { operation, .. } | LogEvent::Removed { operation, .. } => *operation,
            LogEvent::Committed { operation } => &operation.id,
        }
    }
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Listener = Box<dyn FnMut(&LogEvent<'_>) -> Result<(), CallbackError>>;

/// Listeners in subscription order
#[derive(Default)]
pub struct Observers {
    listeners: BTreeMap<ListenerId, Listener>,
    next_id: u64,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Observers {
    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.insert(id, listener);
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener
    ///
    /// A listener that errors or panics is logged and skipped; the rest
    /// still run. Returns the number of failed listeners.
    pub fn notify(&mut self, event: &LogEvent<'_>) -> usize {
        let mut failures = 0;
        for (id, listener) in self.listeners.iter_mut() {
            if let Err(failure) = run_guarded(|| listener(event)) {
                failures += 1;
                let ex: ExError = ModelXError::ListenerFailed {
                    listener_id: id.0,
                    operation_id: event.operation_id().to_string(),
                    message: failure.message().to_string(),
                    panicked: failure.is_panic(),
                }
                .into();
                tracing::warn!(
                    component = module_path!(),
                    op = event.name(),
                    event = EVENT_LISTENER_FAILED,
                    listener_id = id.0,
                    operation_id = %event.operation_id(),
                    panicked = failure.is_panic(),
                    error = failure.message(),
                    err.code = ex.code(),
                    "{}",
                    ex.message()
                );
            }
        }
        failures
    }
}
