//! Error types for store operations.

use std::fmt;
use thiserror::Error;

/// A single failed item inside a bulk operation.
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in the input.
    pub index: usize,
    /// Identifier of the item.
    pub id: String,
    /// The failure reported for the item.
    pub error: StoreError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({}): {}", self.index, self.id, self.error)
    }
}

/// All errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists for the identifier.
    #[error("document not found: {id}")]
    NotFound {
        /// Document identifier.
        id: String,
    },

    /// A document already exists for the identifier.
    #[error("document already exists: {id}")]
    AlreadyExists {
        /// Document identifier.
        id: String,
    },

    /// The requested write durability could not be met.
    #[error("durability requirement cannot be satisfied: {0}")]
    DurabilityUnsatisfiable(String),

    /// The document changed since it was read (CAS mismatch).
    #[error("document changed concurrently: {id}")]
    Conflict {
        /// Document identifier.
        id: String,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Operation timeout.
    #[error("operation timed out")]
    Timeout,

    /// Bulk operation where at least one item failed.
    #[error("bulk operation failed for {} item(s)", failures.len())]
    PartialBatchFailure {
        /// Per-item failure detail, in input order.
        failures: Vec<ItemFailure>,
    },

    /// A query expected a single result but got a different count.
    #[error("incorrect result size: expected {expected}, got {actual}")]
    IncorrectResultSize {
        /// Expected number of results.
        expected: usize,
        /// Actual number of results.
        actual: usize,
    },

    /// A query method declares conflicting execution shapes.
    #[error("ambiguous query method: {0}")]
    AmbiguousQuery(String),

    /// The store cannot run the requested execution.
    #[error("unsupported execution: {0}")]
    UnsupportedExecution(String),

    /// A query could not be derived from a method name.
    #[error("query derivation error: {0}")]
    QueryDerivation(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }

    /// Create an already-exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        StoreError::AlreadyExists { id: id.into() }
    }

    /// Create a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        StoreError::Conflict { id: id.into() }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    /// Create a store-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::StoreUnavailable(msg.into())
    }

    /// Create a durability error.
    pub fn durability(msg: impl Into<String>) -> Self {
        StoreError::DurabilityUnsatisfiable(msg.into())
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout)
    }

    /// Whether the error must abort a bulk operation instead of being
    /// recorded against a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }

    /// Get the document identifier the error refers to, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoreError::NotFound { id }
            | StoreError::AlreadyExists { id }
            | StoreError::Conflict { id } => Some(id),
            _ => None,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Deserialization(err.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error kind enumeration for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document missing.
    NotFound,
    /// Document already present.
    AlreadyExists,
    /// Write could not be acknowledged as requested.
    Durability,
    /// Concurrent modification.
    Conflict,
    /// Caller supplied bad input.
    InvalidArgument,
    /// Transport-level failure.
    Unavailable,
    /// Timeout error.
    Timeout,
    /// Bulk operation with failed items.
    PartialBatch,
    /// Query declaration or result shape problem.
    Query,
    /// Serialization error.
    Serialization,
    /// Internal error.
    Internal,
}

impl StoreError {
    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StoreError::DurabilityUnsatisfiable(_) => ErrorKind::Durability,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::StoreUnavailable(_) => ErrorKind::Unavailable,
            StoreError::Timeout => ErrorKind::Timeout,
            StoreError::PartialBatchFailure { .. } => ErrorKind::PartialBatch,
            StoreError::IncorrectResultSize { .. }
            | StoreError::AmbiguousQuery(_)
            | StoreError::UnsupportedExecution(_)
            | StoreError::QueryDerivation(_) => ErrorKind::Query,
            StoreError::Serialization(_) | StoreError::Deserialization(_) => {
                ErrorKind::Serialization
            }
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("user::1");
        assert_eq!(err.to_string(), "document not found: user::1");
    }

    #[test]
    fn test_error_id() {
        assert_eq!(StoreError::already_exists("a").id(), Some("a"));
        assert_eq!(StoreError::conflict("b").id(), Some("b"));
        assert_eq!(StoreError::Timeout.id(), None);
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(StoreError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::durability("majority").kind(),
            ErrorKind::Durability
        );
        assert_eq!(StoreError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            StoreError::AmbiguousQuery("countAndExists".into()).kind(),
            ErrorKind::Query
        );
    }

    #[test]
    fn test_is_fatal() {
        assert!(StoreError::unavailable("connection reset").is_fatal());
        assert!(!StoreError::not_found("x").is_fatal());
        assert!(!StoreError::Timeout.is_fatal());
    }

    #[test]
    fn test_partial_batch_display() {
        let err = StoreError::PartialBatchFailure {
            failures: vec![ItemFailure {
                index: 1,
                id: "missing".to_string(),
                error: StoreError::not_found("missing"),
            }],
        };
        assert_eq!(err.to_string(), "bulk operation failed for 1 item(s)");
        assert_eq!(err.kind(), ErrorKind::PartialBatch);
    }

    #[test]
    fn test_item_failure_display() {
        let failure = ItemFailure {
            index: 2,
            id: "b".to_string(),
            error: StoreError::Timeout,
        };
        assert_eq!(failure.to_string(), "#2 (b): operation timed out");
    }

    #[test]
    fn test_from_bson_de_error() {
        let doc = bson::doc! { "name": 5 };
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Named {
            name: String,
        }
        let err: StoreError = bson::from_document::<Named>(doc).unwrap_err().into();
        assert!(matches!(err, StoreError::Deserialization(_)));
    }
}
