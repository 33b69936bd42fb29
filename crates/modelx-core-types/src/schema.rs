//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names consistent across the log sink.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_ELEMENT_ID: &str = "element_id";
pub const FIELD_OPERATION_ID: &str = "operation_id";
pub const FIELD_RULE_ID: &str = "rule_id";
pub const FIELD_TYPE_NAME: &str = "type_name";
pub const FIELD_LISTENER_ID: &str = "listener_id";

// Collection sizes
pub const FIELD_ENTRY_COUNT: &str = "entry_count";
pub const FIELD_FAILURE_COUNT: &str = "failure_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_LISTENER_FAILED: &str = "listener_failed";
pub const EVENT_CONSTRAINT_FAILED: &str = "constraint_failed";
pub const EVENT_DISCARDED: &str = "discarded";
