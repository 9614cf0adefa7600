//! Environment abstraction for time and randomness.
//!
//! The mock service sleeps on request and the local server hands out random
//! session ids. Both go through this trait so tests can observe or replace
//! the clock, and production runs use real system resources.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context
/// - `sleep(d)` does not complete before `d` has elapsed on `now()`'s clock
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for session ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
