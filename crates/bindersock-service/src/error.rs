//! Service-side error types.
//!
//! Remote operations report [`bindersock_core::RpcError`]. This module covers
//! the local helpers tests drive directly.

use thiserror::Error;

/// Errors from local service helpers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Fewer callbacks arrived than expected before the deadline.
    #[error("timed out waiting for {expected} callbacks, received {received}")]
    CallbackTimeout {
        /// Number of values waited for
        expected: usize,
        /// Number of values recorded at the deadline
        received: usize,
    },
}
