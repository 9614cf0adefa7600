//! Call status for remote operations.
//!
//! Every remote operation reports its outcome as an [`RpcResult`]. Failures
//! are values, never panics: a caller on the other side of the transport
//! sees a failed-call status and decides what to do. Conditions that must
//! not be recovered from (broken harness invariants) are handled by the
//! service itself and never reach this type.

use std::io;

use thiserror::Error;

/// Result of a remote operation.
pub type RpcResult<T> = Result<T, RpcError>;

/// Numeric status codes, for operations that report a probe result as an
/// integer rather than an error.
pub mod status {
    /// Success.
    pub const OK: i32 = 0;
    /// An argument was invalid (`-EINVAL`).
    pub const BAD_VALUE: i32 = -22;
    /// The remote object or its process is gone (`-EPIPE`).
    pub const DEAD_OBJECT: i32 = -32;
    /// The operation is not valid in the current state (`-ENOSYS`).
    pub const INVALID_OPERATION: i32 = -38;
    /// An I/O failure on a descriptor (`-EIO`).
    pub const IO_ERROR: i32 = -5;
    /// The transaction failed for an unspecified reason.
    pub const FAILED_TRANSACTION: i32 = i32::MIN + 2;
}

/// Recoverable failure kinds of a remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// A required reference was absent, or the object the operation needs
    /// (for instance the owning server) no longer exists.
    #[error("null reference")]
    NullPointer,

    /// The target object was released while the call was in flight.
    #[error("dead object")]
    DeadObject,

    /// The operation is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Descriptor or pipe I/O failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The transport could not complete the transaction.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl RpcError {
    /// Integer status equivalent of this error.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::NullPointer => status::BAD_VALUE,
            Self::DeadObject => status::DEAD_OBJECT,
            Self::InvalidOperation(_) => status::INVALID_OPERATION,
            Self::Io(_) => status::IO_ERROR,
            Self::Transaction(_) => status::FAILED_TRANSACTION,
        }
    }

    /// Returns true for the null-reference kind.
    pub fn is_null_pointer(&self) -> bool {
        matches!(self, Self::NullPointer)
    }
}

impl From<io::Error> for RpcError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_negative_and_distinct() {
        let errors = [
            RpcError::NullPointer,
            RpcError::DeadObject,
            RpcError::InvalidOperation("x".to_string()),
            RpcError::Io("x".to_string()),
            RpcError::Transaction("x".to_string()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(RpcError::status_code).collect();
        assert!(codes.iter().all(|&c| c < status::OK));

        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn io_errors_convert() {
        let err: RpcError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err, RpcError::Io("pipe closed".to_string()));
        assert!(!err.is_null_pointer());
        assert!(RpcError::NullPointer.is_null_pointer());
    }
}
