//! The mock service's view of the transport server.
//!
//! The service must be able to enumerate sessions and request shutdown, but
//! it must never keep the server alive. The server registers itself in a
//! [`ServerRegistry`] and the service holds only a [`ServerLink`]: a key
//! resolved on demand. Once the last strong reference to the server is
//! dropped, the link resolves to `None` and server-dependent operations
//! report a null reference.
//!
//! # Invariants
//!
//! - The registry stores `Weak` references only
//! - Keys are never reused within one registry

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

/// One client session on a server.
pub trait SessionHandle: Send + Sync {
    /// Number of distinct remote objects this session currently references.
    fn count_binders(&self) -> usize;
}

/// The server that accepted the connection a call arrived on.
pub trait ServerHandle: Send + Sync {
    /// Snapshot of all live sessions.
    fn list_sessions(&self) -> Vec<Arc<dyn SessionHandle>>;

    /// Request shutdown. Returns `false` if the server refused or could not
    /// stop.
    fn shutdown(&self) -> bool;
}

/// Opaque registry key for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerKey(u64);

impl ServerKey {
    /// Raw key value, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server-{}", self.0)
    }
}

/// Weak index of live servers.
#[derive(Default)]
pub struct ServerRegistry {
    next_key: AtomicU64,
    servers: RwLock<HashMap<ServerKey, Weak<dyn ServerHandle>>>,
}

impl fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRegistry").field("entries", &self.read().len()).finish()
    }
}

impl ServerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `server` without taking ownership of it.
    pub fn register<S: ServerHandle + 'static>(&self, server: &Arc<S>) -> ServerKey {
        let weak: Weak<S> = Arc::downgrade(server);
        self.register_weak(weak)
    }

    /// Register a server that may still be under construction, such as the
    /// `Weak` handed out by `Arc::new_cyclic`.
    pub fn register_weak(&self, server: Weak<dyn ServerHandle>) -> ServerKey {
        let key = ServerKey(self.next_key.fetch_add(1, Ordering::Relaxed));

        let mut servers = self.write();
        servers.retain(|_, s| s.strong_count() > 0);
        servers.insert(key, server);

        tracing::debug!(%key, "server registered");
        key
    }

    /// Remove `key`. Returns `false` if it was not registered.
    pub fn unregister(&self, key: ServerKey) -> bool {
        self.write().remove(&key).is_some()
    }

    /// Strong reference to the server behind `key`, if it is still alive.
    pub fn resolve(&self, key: ServerKey) -> Option<Arc<dyn ServerHandle>> {
        self.read().get(&key).and_then(Weak::upgrade)
    }

    /// Number of registered servers that are still alive.
    pub fn len(&self) -> usize {
        self.read().values().filter(|s| s.strong_count() > 0).count()
    }

    /// Returns true if no registered server is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(clippy::expect_used)]
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ServerKey, Weak<dyn ServerHandle>>> {
        self.servers.read().expect("RwLock poisoned")
    }

    #[allow(clippy::expect_used)]
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ServerKey, Weak<dyn ServerHandle>>> {
        self.servers.write().expect("RwLock poisoned")
    }
}

/// Non-owning link from a service to its server.
#[derive(Debug, Clone)]
pub struct ServerLink {
    registry: Arc<ServerRegistry>,
    key: ServerKey,
}

impl ServerLink {
    /// Register `server` in `registry` and link to it.
    pub fn register<S: ServerHandle + 'static>(
        registry: &Arc<ServerRegistry>,
        server: &Arc<S>,
    ) -> Self {
        let key = registry.register(server);
        Self { registry: Arc::clone(registry), key }
    }

    /// Link to an already registered key.
    pub fn new(registry: Arc<ServerRegistry>, key: ServerKey) -> Self {
        Self { registry, key }
    }

    /// The linked key.
    pub fn key(&self) -> ServerKey {
        self.key
    }

    /// Strong reference to the server, if it is still alive.
    pub fn resolve(&self) -> Option<Arc<dyn ServerHandle>> {
        self.registry.resolve(self.key)
    }
}
