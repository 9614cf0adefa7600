//! Harness error types.

use bindersock_proto::{FileDescriptorTransportMode, ProtocolError};
use bindersock_transport::TransportError;
use thiserror::Error;

/// Errors from setting up or checking a test process.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Options violate their invariants.
    #[error("invalid harness options: {0}")]
    InvalidOptions(String),

    /// The server does not support the client's descriptor mode.
    #[error("descriptor mode {0:?} not supported by server")]
    UnsupportedFdMode(FileDescriptorTransportMode),

    /// The server refused another session.
    #[error("server session limit {0} reached")]
    TooManySessions(usize),

    /// The server was shut down.
    #[error("server is shut down")]
    ServerShutDown,

    /// Session `index` could not be established and failures are not
    /// tolerated.
    #[error("session {index} failed to connect: {source}")]
    ConnectFailed {
        /// Position of the session in the requested set
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<HarnessError>,
    },

    /// A session references more objects than just its root at teardown.
    #[error("session {session} still references {count} objects, expected 1")]
    LeakedBinders {
        /// Session id
        session: u64,
        /// Distinct references still known
        count: usize,
    },

    /// Control-channel framing or record failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport context or handshake failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Control-channel I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
