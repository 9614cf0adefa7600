//! State shared by every service instance of one simulated process.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use bindersock_core::{LocalBinder, SpBinder};

use crate::session::SessionCounter;

/// Held reference, singleton and live-session count.
///
/// Injected into each [`crate::MockService`] so that two simulated processes
/// in one test binary never see each other's state.
#[derive(Default)]
pub struct ProcessState {
    held: Mutex<Option<SpBinder>>,
    singleton: OnceLock<SpBinder>,
    sessions: SessionCounter,
}

impl fmt::Debug for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessState")
            .field("holding", &self.held().is_some())
            .field("singleton_created", &self.singleton.get().is_some())
            .field("live_sessions", &self.sessions.live())
            .finish()
    }
}

impl ProcessState {
    /// Fresh state: nothing held, no singleton, no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held reference.
    pub fn hold(&self, binder: Option<SpBinder>) {
        *self.lock_held() = binder;
    }

    /// Current held reference.
    pub fn held(&self) -> Option<SpBinder> {
        self.lock_held().clone()
    }

    /// The singleton, created on first use.
    pub fn singleton(&self) -> SpBinder {
        self.singleton.get_or_init(LocalBinder::new_ref).clone()
    }

    /// Live-session counter shared with every session this process opens.
    pub fn sessions(&self) -> &SessionCounter {
        &self.sessions
    }

    #[allow(clippy::expect_used)]
    fn lock_held(&self) -> MutexGuard<'_, Option<SpBinder>> {
        self.held.lock().expect("Mutex poisoned")
    }
}
