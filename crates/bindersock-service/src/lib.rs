//! Mock RPC service for the bindersock conformance harness.
//!
//! The service is what the transport under test talks to. Each operation
//! isolates one behaviour a socket transport must preserve: string and
//! reference round trips, nested calls, blocking, callbacks, descriptor
//! streaming and process death.
//!
//! # Components
//!
//! - [`MockService`]: implements [`bindersock_core::BinderRpcTest`]
//! - [`ProcessState`] and [`SessionCounter`]: state shared per simulated
//!   process
//! - [`CallbackSink`]: what tests hand to `do_callback`
//! - [`BlockMutex`] and [`BackgroundTasks`]: the synchronization primitives
//!   behind `lock`/`unlock_in_ms_async` and delayed work
//! - [`mock_file_descriptor`]: pipes with fixed content
//! - [`SystemEnv`]: production time and randomness

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod block_mutex;
pub mod callback;
pub mod error;
pub mod lifecycle;
pub mod mock_fd;
pub mod service;
pub mod session;
pub mod state;
pub mod system_env;
pub mod tasks;

pub use block_mutex::BlockMutex;
pub use callback::CallbackSink;
pub use error::ServiceError;
pub use lifecycle::{DIE_EXIT_STATUS, die, fatal};
pub use mock_fd::{mock_file_descriptor, read_to_end};
pub use service::{MockService, ServiceConfig};
pub use session::{MockSession, SessionCounter};
pub use state::ProcessState;
pub use system_env::SystemEnv;
pub use tasks::BackgroundTasks;
