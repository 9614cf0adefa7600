//! Transport error types.

use std::io;

use thiserror::Error;

/// Errors from building or using a transport context.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Certificate or key material could not be produced or parsed.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// A `rustls` configuration could not be built.
    #[error("invalid TLS config: {0}")]
    Config(String),

    /// The peer's certificate was rejected by the configured verifier.
    #[error("peer certificate rejected: {0}")]
    Rejected(String),

    /// The TLS handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
