//! Runtime error taxonomy.
//!
//! Every detected invariant violation is reported through [`RuntimeError`]
//! and propagated with `?`. Nothing in the core swallows one of these: the
//! embedding layer either recovers or terminates.

use crate::oid::Oid;

/// Errors raised by runtime operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// A value was converted to a kind it does not have.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind the value actually has.
        found: &'static str,
    },

    /// Misuse of the object protocol: writing a magic attribute, replacing a
    /// non-erasable payload, applying a closure without applying function, ...
    #[error("protocol violation in {operation}{}: {detail}", on_object(.object))]
    ProtocolViolation {
        /// The operation that detected the violation.
        operation: &'static str,
        /// The offending object, when there is one.
        object: Option<Oid>,
        /// Human readable description.
        detail: String,
    },

    /// A bounded walk (inheritance chain, GC marking, environment lookup)
    /// went deeper than its ceiling.
    #[error("{what} exceeded maximal depth {limit}")]
    DepthExceeded {
        /// What was being walked.
        what: &'static str,
        /// The ceiling that was hit.
        limit: usize,
    },

    /// The heap or a registry is in an impossible state.
    #[error("corrupted runtime state: {0}")]
    Corrupted(String),

    /// Text that does not denote a valid object id.
    #[error("invalid object id {0:?}")]
    InvalidOid(String),

    /// A positional access outside of a sequence or component vector.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index, possibly negative.
        index: i64,
        /// The length of the indexed container.
        len: usize,
    },

    /// A constructor argument outside of its domain (NaN double, bad name, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias used throughout the runtime.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

fn on_object(object: &Option<Oid>) -> String {
    match object {
        Some(oid) => format!(" on {oid}"),
        None => String::new(),
    }
}

impl RuntimeError {
    /// Shorthand for a protocol violation on a given object.
    pub fn protocol(operation: &'static str, object: Option<Oid>, detail: impl Into<String>) -> Self {
        RuntimeError::ProtocolViolation {
            operation,
            object,
            detail: detail.into(),
        }
    }

    /// Shorthand for a type mismatch.
    #[inline]
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        RuntimeError::TypeMismatch { expected, found }
    }

    /// Whether this error denotes misuse rather than heap corruption.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, RuntimeError::ProtocolViolation { .. })
    }
}
