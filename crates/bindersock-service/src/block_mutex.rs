//! A mutex that is acquired by one call and released by another.
//!
//! `lock()` and the later unlock arrive as separate remote calls, possibly on
//! different workers, so ownership cannot be tied to a guard. The mutex is a
//! single-permit semaphore whose permit is forgotten on `lock()` and
//! returned on `unlock()`.

use std::sync::atomic::{AtomicBool, Ordering};

use bindersock_core::{RpcError, RpcResult};
use tokio::sync::Semaphore;

/// Guard-less mutual exclusion.
///
/// # Invariants
///
/// - At most one holder at a time; waiters are not ordered
/// - `unlock()` without a holder is rejected and leaves the mutex unchanged
#[derive(Debug)]
pub struct BlockMutex {
    permit: Semaphore,
    held: AtomicBool,
}

impl Default for BlockMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockMutex {
    /// Unlocked mutex.
    pub fn new() -> Self {
        Self { permit: Semaphore::new(1), held: AtomicBool::new(false) }
    }

    /// Wait for the mutex and keep it.
    pub async fn lock(&self) -> RpcResult<()> {
        let permit = self.acquire().await?;
        permit.forget();
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Release a mutex taken by [`Self::lock`].
    pub fn unlock(&self) -> RpcResult<()> {
        if self.held.swap(false, Ordering::SeqCst) {
            self.permit.add_permits(1);
            Ok(())
        } else {
            Err(RpcError::InvalidOperation("unlock of a mutex that is not held".to_string()))
        }
    }

    /// Wait for the mutex, then release it immediately.
    pub async fn lock_unlock(&self) -> RpcResult<()> {
        drop(self.acquire().await?);
        Ok(())
    }

    /// Returns true while some caller holds the mutex through `lock()`.
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> RpcResult<tokio::sync::SemaphorePermit<'_>> {
        self.permit
            .acquire()
            .await
            .map_err(|_| RpcError::InvalidOperation("mutex closed".to_string()))
    }
}
