//! Forwarding stubs that stand in for transport-generated proxies.
//!
//! Every call through a [`SessionProxy`] is one transaction on its session,
//! and every reference that crosses it is entered in the session's binder
//! table. `BinderRpcTest` references travelling across are wrapped in a
//! proxy for the same session, so calls the service makes back to the
//! client (as in `nest_me`) are counted too.

use std::{os::fd::OwnedFd, sync::Arc};

use async_trait::async_trait;
use bindersock_core::{
    Binder, BinderRpcCallback, BinderRpcSession, BinderRpcTest, RpcError, RpcResult, SpBinder,
};
use bindersock_proto::FileDescriptorTransportMode;

use crate::local_server::LocalSession;

/// Proxy for a [`BinderRpcTest`] object reached over one session.
pub struct SessionProxy {
    target: Arc<dyn BinderRpcTest>,
    session: Arc<LocalSession>,
}

impl std::fmt::Debug for SessionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProxy")
            .field("descriptor", &self.target.descriptor())
            .field("session", &self.session.id())
            .finish()
    }
}

impl SessionProxy {
    /// Proxy for `target` over `session`.
    pub fn new(target: Arc<dyn BinderRpcTest>, session: Arc<LocalSession>) -> Arc<Self> {
        Arc::new(Self { target, session })
    }

    /// Session this proxy's calls are counted on.
    pub fn session(&self) -> &Arc<LocalSession> {
        &self.session
    }

    fn begin(&self) -> RpcResult<()> {
        self.session.begin_transaction()
    }

    fn record(&self, binder: Option<&SpBinder>) {
        if let Some(binder) = binder {
            self.session.record(binder);
        }
    }

    fn wrap(&self, binder: Option<Arc<dyn BinderRpcTest>>) -> Option<Arc<dyn BinderRpcTest>> {
        binder.map(|b| {
            let as_binder: SpBinder = b.clone();
            self.session.record(&as_binder);
            let proxy: Arc<dyn BinderRpcTest> = Self::new(b, Arc::clone(&self.session));
            proxy
        })
    }

    fn require_fds(&self) -> RpcResult<()> {
        if self.session.fd_mode() == FileDescriptorTransportMode::None {
            return Err(RpcError::InvalidOperation(
                "descriptor transport not negotiated for this session".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Binder for SessionProxy {
    fn descriptor(&self) -> &'static str {
        self.target.descriptor()
    }

    async fn ping(&self) -> RpcResult<()> {
        if self.session.is_closed() {
            return Err(RpcError::DeadObject);
        }
        self.target.ping().await
    }
}

#[async_trait]
impl BinderRpcTest for SessionProxy {
    async fn send_string(&self, value: &str) -> RpcResult<()> {
        self.begin()?;
        self.target.send_string(value).await
    }

    async fn double_string(&self, value: &str) -> RpcResult<String> {
        self.begin()?;
        self.target.double_string(value).await
    }

    async fn get_client_port(&self) -> RpcResult<u32> {
        self.begin()?;
        self.target.get_client_port().await
    }

    async fn count_binders(&self) -> RpcResult<Vec<usize>> {
        self.begin()?;
        self.target.count_binders().await
    }

    async fn get_null_binder(&self) -> RpcResult<Option<SpBinder>> {
        self.begin()?;
        self.target.get_null_binder().await
    }

    async fn ping_me(&self, binder: Option<SpBinder>) -> RpcResult<i32> {
        self.begin()?;
        self.record(binder.as_ref());
        self.target.ping_me(binder).await
    }

    async fn repeat_binder(&self, binder: Option<SpBinder>) -> RpcResult<Option<SpBinder>> {
        self.begin()?;
        self.record(binder.as_ref());
        self.target.repeat_binder(binder).await
    }

    async fn hold_binder(&self, binder: Option<SpBinder>) -> RpcResult<()> {
        self.begin()?;
        self.record(binder.as_ref());
        self.target.hold_binder(binder).await
    }

    async fn get_held_binder(&self) -> RpcResult<Option<SpBinder>> {
        self.begin()?;
        let held = self.target.get_held_binder().await?;
        self.record(held.as_ref());
        Ok(held)
    }

    async fn nest_me(&self, binder: Option<Arc<dyn BinderRpcTest>>, count: i32) -> RpcResult<()> {
        self.begin()?;
        let binder = self.wrap(binder);
        self.target.nest_me(binder, count).await
    }

    async fn always_give_me_the_same_binder(&self) -> RpcResult<SpBinder> {
        self.begin()?;
        let binder = self.target.always_give_me_the_same_binder().await?;
        self.record(Some(&binder));
        Ok(binder)
    }

    async fn open_session(&self, name: &str) -> RpcResult<Arc<dyn BinderRpcSession>> {
        self.begin()?;
        let session = self.target.open_session(name).await?;
        let as_binder: SpBinder = session.clone();
        self.record(Some(&as_binder));
        Ok(session)
    }

    async fn get_num_open_sessions(&self) -> RpcResult<usize> {
        self.begin()?;
        self.target.get_num_open_sessions().await
    }

    async fn lock(&self) -> RpcResult<()> {
        self.begin()?;
        self.target.lock().await
    }

    async fn unlock_in_ms_async(&self, ms: u32) -> RpcResult<()> {
        self.begin()?;
        self.target.unlock_in_ms_async(ms).await
    }

    async fn lock_unlock(&self) -> RpcResult<()> {
        self.begin()?;
        self.target.lock_unlock().await
    }

    async fn sleep_ms(&self, ms: u32) -> RpcResult<()> {
        self.begin()?;
        self.target.sleep_ms(ms).await
    }

    async fn sleep_ms_async(&self, ms: u32) -> RpcResult<()> {
        self.begin()?;
        self.target.sleep_ms_async(ms).await
    }

    async fn do_callback(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()> {
        self.begin()?;
        let as_binder: Option<SpBinder> = callback.clone().map(|c| c as SpBinder);
        self.record(as_binder.as_ref());
        self.target.do_callback(callback, oneway, delayed, value).await
    }

    async fn do_callback_async(
        &self,
        callback: Option<Arc<dyn BinderRpcCallback>>,
        oneway: bool,
        delayed: bool,
        value: &str,
    ) -> RpcResult<()> {
        self.begin()?;
        let as_binder: Option<SpBinder> = callback.clone().map(|c| c as SpBinder);
        self.record(as_binder.as_ref());
        self.target.do_callback_async(callback, oneway, delayed, value).await
    }

    /// Forwards to the target; for an in-process target this ends the
    /// calling process too.
    async fn die(&self, cleanup: bool) -> RpcResult<()> {
        self.begin()?;
        self.target.die(cleanup).await
    }

    async fn schedule_shutdown(&self) -> RpcResult<()> {
        self.begin()?;
        self.target.schedule_shutdown().await
    }

    async fn use_kernel_binder_calling_id(&self) -> RpcResult<()> {
        self.begin()?;
        self.target.use_kernel_binder_calling_id().await
    }

    async fn echo_as_file(&self, content: &str) -> RpcResult<OwnedFd> {
        self.begin()?;
        self.require_fds()?;
        self.target.echo_as_file(content).await
    }

    async fn concat_files(&self, files: Vec<OwnedFd>) -> RpcResult<OwnedFd> {
        self.begin()?;
        self.require_fds()?;
        self.target.concat_files(files).await
    }
}
