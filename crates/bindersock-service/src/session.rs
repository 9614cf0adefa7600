//! Session objects and the live-session count.
//!
//! # Invariants
//!
//! - [`SessionCounter::live`] equals the number of [`MockSession`] values
//!   constructed with that counter and not yet dropped

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bindersock_core::{Binder, BinderRpcSession, RpcResult, SESSION_DESCRIPTOR};

/// Shared count of live sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionCounter(Arc<AtomicUsize>);

impl SessionCounter {
    /// Counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions currently alive.
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A named session, counted while alive.
#[derive(Debug)]
pub struct MockSession {
    name: String,
    counter: SessionCounter,
}

impl MockSession {
    /// Create a session and count it in `counter`.
    pub fn new(name: impl Into<String>, counter: SessionCounter) -> Self {
        counter.enter();
        Self { name: name.into(), counter }
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.counter.leave();
    }
}

impl Binder for MockSession {
    fn descriptor(&self) -> &'static str {
        SESSION_DESCRIPTOR
    }
}

#[async_trait]
impl BinderRpcSession for MockSession {
    async fn get_name(&self) -> RpcResult<String> {
        Ok(self.name.clone())
    }
}
