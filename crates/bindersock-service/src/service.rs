//! The mock RPC service.
//!
//! [`MockService`] implements every [`BinderRpcTest`] operation. It owns
//! nothing global: shared state comes in through [`ProcessState`], the owning
//! server through a non-owning [`ServerLink`], and background work runs on
//! the service's own [`BackgroundTasks`].
//!
//! # Invariants
//!
//! - The service never keeps its server alive
//! - Every operation except `die` returns a status; background failures are
//!   logged or fatal, never reported to a caller that has already returned

use std::{
    io,
    os::fd::OwnedFd,
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use bindersock_core::{
    Binder, BinderRpcCallback, BinderRpcSession, BinderRpcTest, Environment, RpcError, RpcResult,
    ServerLink, SpBinder, TEST_DESCRIPTOR, status,
};

use crate::{
    block_mutex::BlockMutex,
    lifecycle::{die, fatal},
    mock_fd::{mock_file_descriptor, read_to_end},
    session::MockSession,
    state::ProcessState,
    tasks::BackgroundTasks,
};

/// Per-instance service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Client port reported by `get_client_port`, 0 where not applicable.
    pub port: u32,
    /// Server hosting this instance, if any.
    pub server: Option<ServerLink>,
}

/// The service under test.
pub struct MockService<E: Environment> {
    this: Weak<Self>,
    env: E,
    config: ServiceConfig,
    state: Arc<ProcessState>,
    mutex: BlockMutex,
    tasks: BackgroundTasks,
}

impl<E: Environment> std::fmt::Debug for MockService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockService")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending_tasks", &self.tasks.pending())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> MockService<E> {
    /// Create a service instance sharing `state` with its process.
    pub fn new(env: E, state: Arc<ProcessState>, config: ServiceConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            env,
            config,
            state,
            mutex: BlockMutex::new(),
            tasks: BackgroundTasks::new(),
        })
    }

    /// Instance configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Process state this instance shares.
    pub fn state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    /// Background executor owned by this instance.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Wait for every pending background job.
    pub async fn drain(&self) {
        self.tasks.drain().await;
    }

    fn sleep(&self, ms: u32) -> impl std::future::Future<Output = ()> + Send {
        self.env.sleep(Duration::from_millis(u64::from(ms)))
    }

    async fn callback(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()> {
        let callback = callback.ok_or(RpcError::NullPointer)?;

        if delayed {
            let value = value.to_string();
            self.tasks.spawn(async move {
                if let Err(e) = deliver(callback.as_ref(), oneway, &value).await {
                    tracing::warn!(error = %e, oneway, "delayed callback failed");
                }
            });
            return Ok(());
        }

        deliver(callback.as_ref(), oneway, value).await
    }
}

async fn deliver(callback: &dyn BinderRpcCallback, oneway: bool, value: &str) -> RpcResult<()> {
    if oneway {
        callback.send_oneway_callback(value).await
    } else {
        callback.send_callback(value).await
    }
}

impl<E: Environment> Binder for MockService<E> {
    fn descriptor(&self) -> &'static str {
        TEST_DESCRIPTOR
    }
}

#[async_trait]
impl<E: Environment> BinderRpcTest for MockService<E> {
    async fn send_string(&self, value: &str) -> RpcResult<()> {
        tracing::trace!(len = value.len(), "send_string");
        Ok(())
    }

    async fn double_string(&self, value: &str) -> RpcResult<String> {
        Ok(value.repeat(2))
    }

    async fn get_client_port(&self) -> RpcResult<u32> {
        Ok(self.config.port)
    }

    async fn count_binders(&self) -> RpcResult<Vec<usize>> {
        let server = self.config.server.as_ref().and_then(ServerLink::resolve).ok_or_else(|| {
            tracing::warn!("count_binders: server is gone");
            RpcError::NullPointer
        })?;

        Ok(server.list_sessions().iter().map(|s| s.count_binders()).collect())
    }

    async fn get_null_binder(&self) -> RpcResult<Option<SpBinder>> {
        Ok(None)
    }

    async fn ping_me(&self, binder: Option<SpBinder>) -> RpcResult<i32> {
        let binder = binder.ok_or(RpcError::NullPointer)?;
        Ok(match binder.ping().await {
            Ok(()) => status::OK,
            Err(e) => e.status_code(),
        })
    }

    async fn repeat_binder(&self, binder: Option<SpBinder>) -> RpcResult<Option<SpBinder>> {
        Ok(binder)
    }

    async fn hold_binder(&self, binder: Option<SpBinder>) -> RpcResult<()> {
        self.state.hold(binder);
        Ok(())
    }

    async fn get_held_binder(&self) -> RpcResult<Option<SpBinder>> {
        Ok(self.state.held())
    }

    async fn nest_me(&self, binder: Option<Arc<dyn BinderRpcTest>>, count: i32) -> RpcResult<()> {
        if count <= 0 {
            return Ok(());
        }

        let binder = binder.ok_or(RpcError::NullPointer)?;
        let this: Arc<dyn BinderRpcTest> = self.this.upgrade().ok_or(RpcError::DeadObject)?;
        binder.nest_me(Some(this), count - 1).await
    }

    async fn always_give_me_the_same_binder(&self) -> RpcResult<SpBinder> {
        Ok(self.state.singleton())
    }

    async fn open_session(&self, name: &str) -> RpcResult<Arc<dyn BinderRpcSession>> {
        tracing::debug!(name, "opening session");
        Ok(Arc::new(MockSession::new(name, self.state.sessions().clone())))
    }

    async fn get_num_open_sessions(&self) -> RpcResult<usize> {
        Ok(self.state.sessions().live())
    }

    async fn lock(&self) -> RpcResult<()> {
        self.mutex.lock().await
    }

    async fn unlock_in_ms_async(&self, ms: u32) -> RpcResult<()> {
        self.sleep(ms).await;
        self.mutex.unlock()
    }

    async fn lock_unlock(&self) -> RpcResult<()> {
        self.mutex.lock_unlock().await
    }

    async fn sleep_ms(&self, ms: u32) -> RpcResult<()> {
        self.sleep(ms).await;
        Ok(())
    }

    async fn sleep_ms_async(&self, ms: u32) -> RpcResult<()> {
        self.sleep(ms).await;
        Ok(())
    }

    async fn do_callback(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()> {
        self.callback(callback, oneway, delayed, value).await
    }

    async fn do_callback_async(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()> {
        self.callback(callback, oneway, delayed, value).await
    }

    async fn die(&self, cleanup: bool) -> RpcResult<()> {
        die(cleanup)
    }

    async fn schedule_shutdown(&self) -> RpcResult<()> {
        let server = self.config.server.as_ref().and_then(ServerLink::resolve).ok_or_else(|| {
            tracing::warn!("schedule_shutdown: server is gone");
            RpcError::NullPointer
        })?;

        self.tasks.spawn(async move {
            if !server.shutdown() {
                fatal("server refused scheduled shutdown");
            }
        });
        Ok(())
    }

    async fn use_kernel_binder_calling_id(&self) -> RpcResult<()> {
        #[cfg(feature = "kernel-ipc")]
        {
            let pid = nix::unistd::getpid();
            tracing::warn!(%pid, "kernel calling identity queried over a socket transport");
        }
        #[cfg(not(feature = "kernel-ipc"))]
        tracing::debug!("kernel calling identity not compiled in");

        Ok(())
    }

    async fn echo_as_file(&self, content: &str) -> RpcResult<OwnedFd> {
        Ok(mock_file_descriptor(&self.tasks, content.as_bytes().to_vec())?)
    }

    async fn concat_files(&self, files: Vec<OwnedFd>) -> RpcResult<OwnedFd> {
        let content = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
            let mut content = Vec::new();
            for fd in files {
                content.extend(read_to_end(fd)?);
            }
            Ok(content)
        })
        .await
        .map_err(|e| RpcError::Transaction(e.to_string()))??;

        Ok(mock_file_descriptor(&self.tasks, content)?)
    }
}

#[cfg(test)]
mod tests {
    use bindersock_core::{LocalBinder, same_binder};

    use super::*;
    use crate::system_env::SystemEnv;

    fn service() -> Arc<MockService<SystemEnv>> {
        MockService::new(SystemEnv::new(), Arc::new(ProcessState::new()), ServiceConfig::default())
    }

    #[tokio::test]
    async fn strings() {
        let svc = service();
        svc.send_string("ignored").await.unwrap();
        assert_eq!(svc.double_string("cool ").await.unwrap(), "cool cool ");
        assert_eq!(svc.double_string("").await.unwrap(), "");
    }

    #[tokio::test]
    async fn client_port_comes_from_config() {
        let svc = MockService::new(
            SystemEnv::new(),
            Arc::new(ProcessState::new()),
            ServiceConfig { port: 4242, server: None },
        );
        assert_eq!(svc.get_client_port().await.unwrap(), 4242);
    }

    #[tokio::test]
    async fn null_and_ping() {
        let svc = service();
        assert!(svc.get_null_binder().await.unwrap().is_none());
        assert_eq!(svc.ping_me(None).await, Err(RpcError::NullPointer));
        assert_eq!(svc.ping_me(Some(LocalBinder::new_ref())).await.unwrap(), status::OK);
    }

    #[tokio::test]
    async fn server_dependent_operations_need_a_server() {
        let svc = service();
        assert_eq!(svc.count_binders().await, Err(RpcError::NullPointer));
        assert_eq!(svc.schedule_shutdown().await, Err(RpcError::NullPointer));
    }

    #[tokio::test]
    async fn repeat_preserves_identity() {
        let svc = service();
        let binder = LocalBinder::new_ref();
        let back = svc.repeat_binder(Some(binder.clone())).await.unwrap().unwrap();
        assert!(same_binder(&binder, &back));
        assert!(svc.repeat_binder(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nest_zero_needs_no_peer() {
        let svc = service();
        svc.nest_me(None, 0).await.unwrap();
        svc.nest_me(None, -3).await.unwrap();
        assert_eq!(svc.nest_me(None, 1).await, Err(RpcError::NullPointer));
    }

    #[tokio::test]
    async fn nest_between_two_services_terminates() {
        let a = service();
        let b = service();
        a.nest_me(Some(b.clone()), 10).await.unwrap();
    }

    #[tokio::test]
    async fn delayed_callback_with_null_is_rejected() {
        let svc = service();
        assert_eq!(svc.do_callback(None, false, true, "x").await, Err(RpcError::NullPointer));
        assert_eq!(svc.tasks().pending(), 0);
    }

    #[tokio::test]
    async fn kernel_identity_query_returns_ok() {
        service().use_kernel_binder_calling_id().await.unwrap();
    }
}
