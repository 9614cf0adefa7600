//! In-process conformance harness for bindersock.
//!
//! Stands up a mock service behind an in-process server and hands tests the
//! root interface of each session, so the full operation set can be driven
//! for every socket type and security mode without spawning processes.
//!
//! # Components
//!
//! - [`ProcessSession`]: one simulated service process, started through the
//!   control-channel exchange
//! - [`LocalServer`] and [`LocalSession`]: the server-side handle the service
//!   reports on
//! - [`SessionProxy`]: per-session forwarding stub that counts transactions
//!   and known references
//! - [`HarnessOptions`] and [`test_matrix`]: parameterization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod local_server;
pub mod logging;
pub mod options;
pub mod process;
pub mod proxy;
pub mod socket_type;

pub use error::{HarnessError, Result};
pub use local_server::{LocalServer, LocalSession, ServerLimits};
pub use logging::init_logging;
pub use options::{HarnessOptions, SERVER_VERSION};
pub use process::ProcessSession;
pub use proxy::SessionProxy;
pub use socket_type::{
    RpcSecurity, SocketType, TestParam, security_or_die, socket_type_or_die, test_matrix,
};
