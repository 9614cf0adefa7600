//! Remote interfaces exercised by the conformance suite.
//!
//! Each interface is a plain trait over [`Binder`]. The mock service
//! implements [`BinderRpcTest`]; tests implement [`BinderRpcCallback`] to
//! receive callbacks; sessions opened through the service implement
//! [`BinderRpcSession`]. Transport proxies implement the same traits by
//! forwarding, so calling code cannot tell local from remote.

use std::{os::fd::OwnedFd, sync::Arc};

use async_trait::async_trait;

use crate::{
    binder::{Binder, SpBinder},
    error::RpcResult,
};

/// Descriptor of [`BinderRpcSession`].
pub const SESSION_DESCRIPTOR: &str = "bindersock.IBinderRpcSession";
/// Descriptor of [`BinderRpcCallback`].
pub const CALLBACK_DESCRIPTOR: &str = "bindersock.IBinderRpcCallback";
/// Descriptor of [`BinderRpcTest`].
pub const TEST_DESCRIPTOR: &str = "bindersock.IBinderRpcTest";

/// A named session object created on demand by the service.
#[async_trait]
pub trait BinderRpcSession: Binder {
    /// Name given at creation.
    async fn get_name(&self) -> RpcResult<String>;
}

/// Receiver of values delivered by `do_callback`.
#[async_trait]
pub trait BinderRpcCallback: Binder {
    /// Acknowledged delivery: returns once the value has been recorded.
    async fn send_callback(&self, value: &str) -> RpcResult<()>;

    /// Fire-and-forget delivery.
    async fn send_oneway_callback(&self, value: &str) -> RpcResult<()>;
}

/// The service under test.
///
/// Operations model the situations a socket transport must get right:
/// reference identity, nesting, blocking, callbacks, descriptor streaming
/// and process lifecycle.
#[async_trait]
pub trait BinderRpcTest: Binder {
    /// Accept and discard a string.
    async fn send_string(&self, value: &str) -> RpcResult<()>;

    /// Return `value` concatenated with itself.
    async fn double_string(&self, value: &str) -> RpcResult<String>;

    /// Port of the connecting client, 0 where the transport has none.
    async fn get_client_port(&self) -> RpcResult<u32>;

    /// Distinct reference count for every live session on the server.
    async fn count_binders(&self) -> RpcResult<Vec<usize>>;

    /// Always an absent reference.
    async fn get_null_binder(&self) -> RpcResult<Option<SpBinder>>;

    /// Probe `binder` and return the probe's status code.
    async fn ping_me(&self, binder: Option<SpBinder>) -> RpcResult<i32>;

    /// Return `binder` unchanged.
    async fn repeat_binder(&self, binder: Option<SpBinder>) -> RpcResult<Option<SpBinder>>;

    /// Store `binder` in the held-reference slot.
    async fn hold_binder(&self, binder: Option<SpBinder>) -> RpcResult<()>;

    /// Contents of the held-reference slot.
    async fn get_held_binder(&self) -> RpcResult<Option<SpBinder>>;

    /// Bounce `count` nested calls between this object and `binder`.
    async fn nest_me(&self, binder: Option<Arc<dyn BinderRpcTest>>, count: i32) -> RpcResult<()>;

    /// The same object on every call.
    async fn always_give_me_the_same_binder(&self) -> RpcResult<SpBinder>;

    /// Create a new session object named `name`.
    async fn open_session(&self, name: &str) -> RpcResult<Arc<dyn BinderRpcSession>>;

    /// Number of session objects currently alive.
    async fn get_num_open_sessions(&self) -> RpcResult<usize>;

    /// Take the blocking mutex and keep it.
    async fn lock(&self) -> RpcResult<()>;

    /// Release the blocking mutex after `ms` milliseconds.
    async fn unlock_in_ms_async(&self, ms: u32) -> RpcResult<()>;

    /// Take and immediately release the blocking mutex.
    async fn lock_unlock(&self) -> RpcResult<()>;

    /// Sleep for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u32) -> RpcResult<()>;

    /// Sleep for `ms` milliseconds; same observable latency as `sleep_ms`.
    async fn sleep_ms_async(&self, ms: u32) -> RpcResult<()>;

    /// Deliver `value` to `callback`, now or from a background task.
    async fn do_callback(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()>;

    /// Same contract as `do_callback`.
    async fn do_callback_async(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()>;

    /// Terminate the hosting process.
    ///
    /// A local implementation never returns. A proxy returns `DeadObject`
    /// once the peer has exited.
    async fn die(&self, cleanup: bool) -> RpcResult<()>;

    /// Ask the owning server to shut down from a background task.
    async fn schedule_shutdown(&self) -> RpcResult<()>;

    /// Query the kernel calling identity, which is meaningless over sockets.
    async fn use_kernel_binder_calling_id(&self) -> RpcResult<()>;

    /// A descriptor that reads back exactly `content`.
    async fn echo_as_file(&self, content: &str) -> RpcResult<OwnedFd>;

    /// A descriptor that reads back the concatenation of `files`.
    async fn concat_files(&self, files: Vec<OwnedFd>) -> RpcResult<OwnedFd>;
}
