//! Boundary guard for caller-supplied callbacks
//!
//! Observers and rule constraints are user code. Whatever they do, an
//! `Err` return or a panic, must stay inside the boundary and come back as
//! plain data so the surrounding batch or validation pass can continue.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Error type callbacks may return
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Why a guarded callback did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// The callback returned `Err`
    Error(String),
    /// The callback panicked
    Panic(String),
}

impl CallbackFailure {
    pub fn message(&self) -> &str {
        match self {
            CallbackFailure::Error(m) | CallbackFailure::Panic(m) => m,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, CallbackFailure::Panic(_))
    }
}

impl std::fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackFailure::Error(m) => write!(f, "error: {}", m),
            CallbackFailure::Panic(m) => write!(f, "panic: {}", m),
        }
    }
}

/// Run `f`, converting both `Err` and panics into a [`CallbackFailure`]
pub fn run_guarded<T, F>(f: F) -> Result<T, CallbackFailure>
where
    F: FnOnce() -> Result<T, CallbackError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CallbackFailure::Error(err.to_string())),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passes_through() {
        let result = run_guarded(|| Ok(7));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_err_is_captured() {
        let result: Result<(), _> = run_guarded(|| Err("boom".into()));
        assert_eq!(result, Err(CallbackFailure::Error("boom".to_string())));
    }

    #[test]
    fn test_panic_is_captured() {
        let result: Result<(), _> = run_guarded(|| panic!("kaboom"));
        let failure = result.unwrap_err();
        assert!(failure.is_panic());
        assert_eq!(failure.message(), "kaboom");
    }

    #[test]
    fn test_formatted_panic_is_captured() {
        let n = 3;
        let result: Result<(), _> = run_guarded(|| panic!("bad {}", n));
        assert_eq!(result.unwrap_err().message(), "bad 3");
    }
}
