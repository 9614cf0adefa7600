//! In-process server hosting one mock service.
//!
//! `LocalServer` plays the transport runtime's part for in-process runs: it
//! accepts sessions, negotiates descriptor modes, runs the TLS handshake
//! for secure contexts, and tracks which objects each session references.
//! The service sees it only through [`ServerHandle`].

use std::{
    os::unix::net::UnixStream,
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bindersock_core::{
    Binder, Environment, RpcError, RpcResult, ServerHandle, ServerLink, ServerRegistry,
    SessionHandle, SpBinder,
};
use bindersock_proto::{FileDescriptorTransportMode, ServerConfig, SocketType};
use bindersock_service::{MockService, ProcessState, ServiceConfig};
use bindersock_transport::{TlsCtx, TransportCtx, TransportError};

use crate::error::{HarnessError, Result};

/// First port handed out for internet sockets.
const EPHEMERAL_PORT_BASE: u32 = 1024;

/// One accepted session.
///
/// # Invariants
///
/// - The binder table holds weak references only, so an object the client
///   released stops being counted
/// - Entries are distinct by reference identity
#[derive(Debug)]
pub struct LocalSession {
    id: u64,
    fd_mode: FileDescriptorTransportMode,
    binders: Mutex<Vec<Weak<dyn Binder>>>,
    transactions: AtomicU64,
    closed: AtomicBool,
}

impl LocalSession {
    fn new(id: u64, fd_mode: FileDescriptorTransportMode) -> Self {
        Self {
            id,
            fd_mode,
            binders: Mutex::new(Vec::new()),
            transactions: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Random session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Negotiated descriptor mode.
    pub fn fd_mode(&self) -> FileDescriptorTransportMode {
        self.fd_mode
    }

    /// Calls made on this session so far, nested calls included.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Returns true once the server shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Count one call; fails once the session is closed.
    pub(crate) fn begin_transaction(&self) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::DeadObject);
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Remember `binder` as known to this session.
    pub(crate) fn record(&self, binder: &SpBinder) {
        let mut binders = self.lock();
        binders.retain(|b| b.strong_count() > 0);
        let ptr = Arc::as_ptr(binder).cast::<()>();
        if !binders.iter().any(|b| b.as_ptr().cast::<()>() == ptr) {
            binders.push(Arc::downgrade(binder));
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock().clear();
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn Binder>>> {
        self.binders.lock().expect("Mutex poisoned")
    }
}

impl SessionHandle for LocalSession {
    fn count_binders(&self) -> usize {
        let mut binders = self.lock();
        binders.retain(|b| b.strong_count() > 0);
        binders.len()
    }
}

/// Server-side limits not carried by [`ServerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerLimits {
    /// Refuse sessions beyond this many; `None` for no limit.
    pub max_sessions: Option<usize>,
}

/// In-process server.
pub struct LocalServer<E: Environment> {
    env: E,
    config: ServerConfig,
    limits: ServerLimits,
    port: u32,
    ctx: Box<dyn TransportCtx>,
    link: ServerLink,
    service: Arc<MockService<E>>,
    sessions: Mutex<Vec<Arc<LocalSession>>>,
    shut_down: AtomicBool,
}

impl<E: Environment> std::fmt::Debug for LocalServer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalServer")
            .field("key", &self.link.key())
            .field("config", &self.config)
            .field("port", &self.port)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> LocalServer<E> {
    /// Start a server for `config` and register it in `registry`.
    ///
    /// The hosted service shares `state` and reaches the server only
    /// through the registry.
    pub fn start(
        env: E,
        config: ServerConfig,
        limits: ServerLimits,
        ctx: Box<dyn TransportCtx>,
        registry: &Arc<ServerRegistry>,
        state: Arc<ProcessState>,
    ) -> Arc<Self> {
        let port = match config.socket_type {
            SocketType::Inet => {
                let span = u64::from(u16::MAX) - u64::from(EPHEMERAL_PORT_BASE);
                EPHEMERAL_PORT_BASE + (env.random_u64() % span) as u32
            },
            SocketType::Vsock => config.vsock_port,
            SocketType::Preconnected | SocketType::Unix | SocketType::UnixBootstrap => 0,
        };

        let server = Arc::new_cyclic(|this: &Weak<Self>| {
            let weak: Weak<dyn ServerHandle> = this.clone();
            let link = ServerLink::new(Arc::clone(registry), registry.register_weak(weak));
            let service = MockService::new(
                env.clone(),
                state,
                ServiceConfig { port, server: Some(link.clone()) },
            );

            Self {
                env,
                config,
                limits,
                port,
                ctx,
                link,
                service,
                sessions: Mutex::new(Vec::new()),
                shut_down: AtomicBool::new(false),
            }
        });

        tracing::info!(
            key = %server.link.key(),
            socket_type = %server.config.socket_type,
            security = %server.config.rpc_security,
            port,
            "server started"
        );
        server
    }

    /// The hosted service.
    pub fn service(&self) -> &Arc<MockService<E>> {
        &self.service
    }

    /// Port reported to clients, 0 where the socket type has none.
    pub fn port(&self) -> u32 {
        self.port
    }

    /// Configuration the server was started with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// This server's transport context.
    pub fn ctx(&self) -> &dyn TransportCtx {
        self.ctx.as_ref()
    }

    /// Returns true once `shutdown` succeeded.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Accept a session from a client using `client` as its context.
    pub async fn accept(
        &self,
        client: &dyn TransportCtx,
        fd_mode: FileDescriptorTransportMode,
    ) -> Result<Arc<LocalSession>> {
        if self.is_shut_down() {
            return Err(HarnessError::ServerShutDown);
        }
        if !self.config.server_supported_fd_modes.contains(&fd_mode) {
            return Err(HarnessError::UnsupportedFdMode(fd_mode));
        }
        if let Some(max) = self.limits.max_sessions
            && self.session_count() >= max
        {
            return Err(HarnessError::TooManySessions(max));
        }
        if client.security() != self.ctx.security() {
            return Err(TransportError::Handshake(format!(
                "client security {} does not match server {}",
                client.security(),
                self.ctx.security()
            ))
            .into());
        }
        if let (Some(server_tls), Some(client_tls)) = (self.ctx.as_tls(), client.as_tls()) {
            handshake(server_tls.clone(), client_tls.clone()).await?;
        }

        let session = Arc::new(LocalSession::new(self.env.random_u64(), fd_mode));
        let root: SpBinder = self.service.clone();
        session.record(&root);
        self.lock_sessions().push(Arc::clone(&session));

        tracing::debug!(session = session.id(), ?fd_mode, "session accepted");
        Ok(session)
    }

    #[allow(clippy::expect_used)]
    fn lock_sessions(&self) -> MutexGuard<'_, Vec<Arc<LocalSession>>> {
        self.sessions.lock().expect("Mutex poisoned")
    }
}

impl<E: Environment> ServerHandle for LocalServer<E> {
    fn list_sessions(&self) -> Vec<Arc<dyn SessionHandle>> {
        self.lock_sessions().iter().map(|s| Arc::clone(s) as Arc<dyn SessionHandle>).collect()
    }

    /// Closes every session. Only the first request succeeds.
    fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::warn!(key = %self.link.key(), "server already shut down");
            return false;
        }

        let sessions = std::mem::take(&mut *self.lock_sessions());
        for session in &sessions {
            session.close();
        }

        tracing::info!(key = %self.link.key(), closed = sessions.len(), "server shut down");
        true
    }
}

/// Run both sides of a TLS handshake over a fresh socket pair.
async fn handshake(server: TlsCtx, client: TlsCtx) -> Result<()> {
    let (server_sock, client_sock) = UnixStream::pair()?;

    let server_side = tokio::task::spawn_blocking(move || server.accept(server_sock).map(drop));
    let client_side = tokio::task::spawn_blocking(move || client.connect(client_sock));
    let (server_result, client_result) = tokio::join!(server_side, client_side);

    // The client stream stays open until the server side has finished.
    let joined = |e: tokio::task::JoinError| TransportError::Handshake(e.to_string());
    let client_stream = client_result.map_err(joined)??;
    server_result.map_err(joined)??;
    drop(client_stream);
    Ok(())
}
