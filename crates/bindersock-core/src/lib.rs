//! Core object model for the bindersock conformance harness.
//!
//! A binder-style RPC transport moves calls between processes and lets both
//! sides exchange references to objects that live on the other side. This
//! crate defines what those references look like to the code under test,
//! independent of any socket or security layer:
//!
//! - [`Binder`]: the base of every remote-invokable object (identity + ping)
//! - [`interfaces`]: the three interfaces the conformance suite exercises
//! - [`RpcError`]: the recoverable failure kinds a call can report
//! - [`ServerHandle`] / [`ServerRegistry`]: the view of the transport's server
//!   that the mock service is allowed to have
//! - [`Environment`]: time and randomness, injectable for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binder;
pub mod env;
pub mod error;
pub mod interfaces;
pub mod server;

pub use binder::{Binder, LocalBinder, SpBinder, same_binder, same_object};
pub use env::Environment;
pub use error::{RpcError, RpcResult, status};
pub use interfaces::{
    BinderRpcCallback, BinderRpcSession, BinderRpcTest, CALLBACK_DESCRIPTOR, SESSION_DESCRIPTOR,
    TEST_DESCRIPTOR,
};
pub use server::{ServerHandle, ServerKey, ServerLink, ServerRegistry, SessionHandle};
