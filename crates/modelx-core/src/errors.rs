use thiserror::Error;

/// Result type alias using ModelXError
pub type Result<T> = std::result::Result<T, ModelXError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Contract
    ContractViolation,
    OperationInProgress,
    NoOperation,
    UnknownAttributeKind,

    // Lookup / data
    InvalidInput,
    NotFound,
    AlreadyExists,
    UnknownType,
    Decode,

    // Structural
    CycleDetected,
    MultipleParents,
    IllegalReparent,
    InvariantViolation,

    // Replay
    ReplayFailed,
    NothingToReplay,

    // Diagnostic
    CallbackFailed,

    // Integration
    Serialization,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::ContractViolation => "ERR_CONTRACT_VIOLATION",
            ExErrorKind::OperationInProgress => "ERR_OPERATION_IN_PROGRESS",
            ExErrorKind::NoOperation => "ERR_NO_OPERATION",
            ExErrorKind::UnknownAttributeKind => "ERR_UNKNOWN_ATTRIBUTE_KIND",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::UnknownType => "ERR_UNKNOWN_TYPE",
            ExErrorKind::Decode => "ERR_DECODE",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::MultipleParents => "ERR_MULTIPLE_PARENTS",
            ExErrorKind::IllegalReparent => "ERR_ILLEGAL_REPARENT",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::ReplayFailed => "ERR_REPLAY_FAILED",
            ExErrorKind::NothingToReplay => "ERR_NOTHING_TO_REPLAY",
            ExErrorKind::CallbackFailed => "ERR_CALLBACK_FAILED",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and context for
/// debugging. Built from a [`ModelXError`] at logging boundaries.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    element_id: Option<String>,
    field: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            element_id: None,
            field: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add element ID context
    pub fn with_element_id(mut self, id: impl Into<String>) -> Self {
        self.element_id = Some(id.into());
        self
    }

    /// Add field name context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn element_id(&self) -> Option<&str> {
        self.element_id.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(element_id) = &self.element_id {
            write!(f, " (element_id: {})", element_id)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// How an error is expected to be handled by the caller
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Programming error: the call itself was illegal in the current state
    Contract,
    /// Recoverable failure caused by bad input or a missing entity
    Data,
    /// Observer or constraint failure; logged and folded into the batch or
    /// validation result, never returned to the caller
    Diagnostic,
}

/// Error taxonomy for ModelX operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelXError {
    // ===== Contract Errors =====
    /// `begin` called while another operation is recording
    #[error("Cannot begin operation '{name}': operation '{current}' is still in progress")]
    OperationInProgress { name: String, current: String },

    /// A recording call was made with no operation in progress
    #[error("No operation in progress for '{op}'")]
    NoOperationInProgress { op: String },

    /// A schema fragment used an attribute kind outside the closed set
    #[error("Unknown attribute kind '{kind}' for {type_name}.{attribute}")]
    UnknownAttributeKind {
        type_name: String,
        attribute: String,
        kind: String,
    },

    /// Unknown type kind in a schema fragment
    #[error("Unknown type kind '{kind}' for {type_name}")]
    UnknownTypeKind { type_name: String, kind: String },

    /// Value is not present in the shadow of the target collection
    #[error("Value {value} is not in {element_id}.{field}")]
    ValueNotInCollection {
        element_id: String,
        field: String,
        value: String,
    },

    /// Position is outside the bounds of the target collection
    #[error("Index {index} out of bounds for {element_id}.{field} (len {len})")]
    IndexOutOfBounds {
        element_id: String,
        field: String,
        index: usize,
        len: usize,
    },

    /// Reorder on a collection that already has inserts or removes recorded
    /// in the operation in progress
    #[error("Cannot reorder {element_id}.{field}: the collection was already edited in this operation")]
    ReorderAfterEdit { element_id: String, field: String },

    // ===== Data Errors =====
    /// Identifier could not be decoded
    #[error("Cannot decode identifier '{input}': {reason}")]
    IdDecode { input: String, reason: String },

    /// Identifier base prefix is not valid hex
    #[error("Invalid identifier base '{base}': {reason}")]
    InvalidIdBase { base: String, reason: String },

    /// Type name is not registered
    #[error("Unknown type: {type_name}")]
    UnknownType { type_name: String },

    /// Super chain loops back on itself
    #[error("Inheritance cycle detected at type {type_name}")]
    InheritanceCycle { type_name: String },

    /// Element not found in repository
    #[error("Element not found: {element_id}")]
    ElementNotFound { element_id: String },

    /// Element id already present in repository
    #[error("Element already exists: {element_id}")]
    DuplicateElement { element_id: String },

    /// Element has no such attribute
    #[error("Element {element_id} has no field '{field}'")]
    UnknownField { element_id: String, field: String },

    /// Attribute holds a different value kind than the operation requires
    #[error("Field {element_id}.{field} is not {expected}")]
    FieldKindMismatch {
        element_id: String,
        field: String,
        expected: String,
    },

    /// Child already has an owner
    #[error("Element {element_id} is already owned by {owner_id}")]
    AlreadyOwned { element_id: String, owner_id: String },

    /// Attaching would make an element its own ancestor
    #[error("Attaching {element_id} under {parent_id} would create an ownership cycle")]
    OwnershipCycle {
        element_id: String,
        parent_id: String,
    },

    /// Single-valued owning slot is already filled
    #[error("Field {element_id}.{field} already owns an element")]
    SlotOccupied { element_id: String, field: String },

    /// Element has no owner to detach from
    #[error("Element {element_id} is not owned")]
    NotOwned { element_id: String },

    // ===== Structural Invariant Errors =====
    /// Owning attribute names an element absent from the repository
    #[error("Element {element_id} owns missing element {child_id} via '{field}'")]
    DanglingOwnedElement {
        element_id: String,
        field: String,
        child_id: String,
    },

    /// Element appears in more than one owning collection
    #[error("Element {element_id} is owned by multiple parents: {owners:?}")]
    MultipleOwners {
        element_id: String,
        owners: Vec<String>,
    },

    /// Parent pointer disagrees with the owning edge
    #[error("Element {element_id} parent pointer is {actual:?}, owning edge says {expected:?}")]
    ParentPointerMismatch {
        element_id: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Element's declared type is not registered
    #[error("Element {element_id} has unresolved type {type_name}")]
    UnresolvedType {
        element_id: String,
        type_name: String,
    },

    // ===== Replay Errors =====
    /// Nothing left on the undo stack
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing left on the redo stack
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Recorded entry does not match the live graph
    #[error("Replay mismatch at {element_id}.{field}: {reason}")]
    ReplayMismatch {
        element_id: String,
        field: String,
        reason: String,
    },

    // ===== Diagnostic Errors =====
    /// A log listener returned `Err` or panicked
    #[error("Listener {listener_id} failed during operation {operation_id}: {message}")]
    ListenerFailed {
        listener_id: u64,
        operation_id: String,
        message: String,
        panicked: bool,
    },

    /// A rule constraint returned `Err` or panicked
    #[error("Constraint {rule_id} failed on {element_id}: {message}")]
    ConstraintFailed {
        rule_id: String,
        element_id: String,
        message: String,
        panicked: bool,
    },

    // ===== Generic Errors =====
    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ModelXError {
    /// Classify the error by how callers are expected to treat it
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelXError::OperationInProgress { .. }
            | ModelXError::NoOperationInProgress { .. }
            | ModelXError::UnknownAttributeKind { .. }
            | ModelXError::UnknownTypeKind { .. }
            | ModelXError::ValueNotInCollection { .. }
            | ModelXError::IndexOutOfBounds { .. }
            | ModelXError::ReorderAfterEdit { .. } => ErrorCategory::Contract,
            ModelXError::ListenerFailed { .. } | ModelXError::ConstraintFailed { .. } => {
                ErrorCategory::Diagnostic
            }
            _ => ErrorCategory::Data,
        }
    }
}

/// Conversion from ModelXError to ExError
impl From<ModelXError> for ExError {
    fn from(err: ModelXError) -> Self {
        let message = err.to_string();
        match err {
            ModelXError::OperationInProgress { name, .. } => {
                ExError::new(ExErrorKind::OperationInProgress)
                    .with_op(name)
                    .with_message(message)
            }

            ModelXError::NoOperationInProgress { op } => ExError::new(ExErrorKind::NoOperation)
                .with_op(op)
                .with_message(message),

            ModelXError::UnknownAttributeKind {
                type_name,
                attribute,
                ..
            } => ExError::new(ExErrorKind::UnknownAttributeKind)
                .with_element_id(type_name)
                .with_field(attribute)
                .with_message(message),

            ModelXError::UnknownTypeKind { type_name, .. } => {
                ExError::new(ExErrorKind::ContractViolation)
                    .with_element_id(type_name)
                    .with_message(message)
            }

            ModelXError::ValueNotInCollection {
                element_id, field, ..
            }
            | ModelXError::IndexOutOfBounds {
                element_id, field, ..
            }
            | ModelXError::ReorderAfterEdit { element_id, field } => ExError::new(ExErrorKind::ContractViolation)
                .with_element_id(element_id)
                .with_field(field)
                .with_message(message),

            ModelXError::IdDecode { .. } => ExError::new(ExErrorKind::Decode).with_message(message),

            ModelXError::InvalidIdBase { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }

            ModelXError::UnknownType { type_name } => ExError::new(ExErrorKind::UnknownType)
                .with_element_id(type_name)
                .with_message(message),

            ModelXError::InheritanceCycle { type_name } => ExError::new(ExErrorKind::CycleDetected)
                .with_element_id(type_name)
                .with_message(message),

            ModelXError::ElementNotFound { element_id } => ExError::new(ExErrorKind::NotFound)
                .with_element_id(element_id)
                .with_message(message),

            ModelXError::DuplicateElement { element_id } => {
                ExError::new(ExErrorKind::AlreadyExists)
                    .with_element_id(element_id)
                    .with_message(message)
            }

            ModelXError::UnknownField { element_id, field }
            | ModelXError::FieldKindMismatch {
                element_id, field, ..
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_element_id(element_id)
                .with_field(field)
                .with_message(message),

            ModelXError::AlreadyOwned { element_id, .. } => {
                ExError::new(ExErrorKind::MultipleParents)
                    .with_element_id(element_id)
                    .with_message(message)
            }

            ModelXError::OwnershipCycle { element_id, .. } => {
                ExError::new(ExErrorKind::CycleDetected)
                    .with_element_id(element_id)
                    .with_message(message)
            }

            ModelXError::SlotOccupied { element_id, field } => {
                ExError::new(ExErrorKind::IllegalReparent)
                    .with_element_id(element_id)
                    .with_field(field)
                    .with_message(message)
            }

            ModelXError::NotOwned { element_id } => ExError::new(ExErrorKind::IllegalReparent)
                .with_element_id(element_id)
                .with_message(message),

            ModelXError::DanglingOwnedElement {
                element_id, field, ..
            } => ExError::new(ExErrorKind::InvariantViolation)
                .with_element_id(element_id)
                .with_field(field)
                .with_message(message),

            ModelXError::MultipleOwners { element_id, .. } => {
                ExError::new(ExErrorKind::MultipleParents)
                    .with_element_id(element_id)
                    .with_message(message)
            }

            ModelXError::ParentPointerMismatch { element_id, .. }
            | ModelXError::UnresolvedType { element_id, .. } => {
                ExError::new(ExErrorKind::InvariantViolation)
                    .with_element_id(element_id)
                    .with_message(message)
            }

            ModelXError::NothingToUndo | ModelXError::NothingToRedo => {
                ExError::new(ExErrorKind::NothingToReplay).with_message(message)
            }

            ModelXError::ReplayMismatch {
                element_id, field, ..
            } => ExError::new(ExErrorKind::ReplayFailed)
                .with_element_id(element_id)
                .with_field(field)
                .with_message(message),

            ModelXError::ListenerFailed { operation_id, .. } => {
                ExError::new(ExErrorKind::CallbackFailed)
                    .with_op(operation_id)
                    .with_message(message)
            }

            ModelXError::ConstraintFailed {
                rule_id, element_id, ..
            } => ExError::new(ExErrorKind::CallbackFailed)
                .with_op(rule_id)
                .with_element_id(element_id)
                .with_message(message),

            ModelXError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            ModelXError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            ModelXError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}

impl From<serde_json::Error> for ModelXError {
    fn from(err: serde_json::Error) -> Self {
        ModelXError::Serialization {
            message: err.to_string(),
        }
    }
}
