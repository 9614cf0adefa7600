//! Callback sink used by tests to receive `do_callback` deliveries.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use bindersock_core::{Binder, BinderRpcCallback, CALLBACK_DESCRIPTOR, RpcResult};
use tokio::sync::Notify;

use crate::error::ServiceError;

/// Append-only record of delivered values.
///
/// # Invariants
///
/// - Values appear in the order their deliveries acquired the lock
/// - A delivered value is visible to `values()` before the delivery returns
#[derive(Debug, Default)]
pub struct CallbackSink {
    values: Mutex<Vec<String>>,
    delivered: Notify,
}

impl CallbackSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn values(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Number of values delivered so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` values arrived and return the first
    /// `count` of them.
    pub async fn wait_for(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, ServiceError> {
        let wait = async {
            loop {
                let notified = self.delivered.notified();
                {
                    let values = self.lock();
                    if values.len() >= count {
                        return values[..count].to_vec();
                    }
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ServiceError::CallbackTimeout { expected: count, received: self.len() })
    }

    fn record(&self, value: &str) {
        self.lock().push(value.to_string());
        self.delivered.notify_one();
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.values.lock().expect("Mutex poisoned")
    }
}

impl Binder for CallbackSink {
    fn descriptor(&self) -> &'static str {
        CALLBACK_DESCRIPTOR
    }
}

#[async_trait]
impl BinderRpcCallback for CallbackSink {
    async fn send_callback(&self, value: &str) -> RpcResult<()> {
        self.record(value);
        Ok(())
    }

    async fn send_oneway_callback(&self, value: &str) -> RpcResult<()> {
        self.record(value);
        Ok(())
    }
}
