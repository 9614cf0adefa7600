//! One simulated service process and the sessions a test opened to it.
//!
//! Startup follows the control-channel exchange a spawned service process
//! would go through: the driver sends a [`ServerConfig`], the service answers
//! with [`ServerInfo`] (and its certificate under TLS), and before each TLS
//! session the driver sends a [`ClientInfo`] so the service trusts that
//! client. Every message is a length-prefixed frame on a pipe, read and
//! written through the async framer.

use std::{os::fd::OwnedFd, sync::Arc};

use bindersock_core::{ServerHandle, ServerRegistry, SessionHandle};
use bindersock_proto::{
    ClientInfo, RpcSecurity, ServerConfig, ServerInfo, SocketType,
    stream::{read_bytes_async, read_record_async, write_bytes_async, write_record_async},
};
use bindersock_service::{ProcessState, SystemEnv};
use bindersock_transport::{
    RpcCertificateVerifier, TransportCtxFactory, TrustedCertificates, make_factory,
};
use tokio::fs::File;

use crate::{
    error::{HarnessError, Result},
    local_server::{LocalServer, ServerLimits},
    options::HarnessOptions,
    proxy::SessionProxy,
    socket_type::TestParam,
};

/// One direction of the control channel, driven through tokio.
struct ControlPipe {
    reader: File,
    writer: File,
}

impl ControlPipe {
    fn new() -> Result<Self> {
        let (reader, writer) = std::io::pipe()?;
        Ok(Self { reader: into_async(reader.into()), writer: into_async(writer.into()) })
    }
}

fn into_async(fd: OwnedFd) -> File {
    File::from_std(std::fs::File::from(fd))
}

/// A started service process with its open sessions.
pub struct ProcessSession {
    param: TestParam,
    options: HarnessOptions,
    port: u64,
    registry: Arc<ServerRegistry>,
    state: Arc<ProcessState>,
    server: Arc<LocalServer<SystemEnv>>,
    sessions: Vec<Arc<SessionProxy>>,
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("param", &self.param)
            .field("port", &self.port)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl ProcessSession {
    /// Start a service over unix sockets and open `options.num_sessions`.
    pub async fn start(options: HarnessOptions, security: RpcSecurity) -> Result<Self> {
        Self::start_on(SocketType::Unix, options, security).await
    }

    /// Start a service for the given matrix cell.
    pub async fn start_on(
        socket_type: SocketType,
        options: HarnessOptions,
        security: RpcSecurity,
    ) -> Result<Self> {
        Self::start_with(socket_type, options, security, ServerLimits::default()).await
    }

    /// Start a service whose server enforces `limits`.
    pub async fn start_with(
        socket_type: SocketType,
        options: HarnessOptions,
        security: RpcSecurity,
        limits: ServerLimits,
    ) -> Result<Self> {
        options.validate()?;
        let param = TestParam { socket_type, security };

        let mut to_service = ControlPipe::new()?;
        let mut to_driver = ControlPipe::new()?;

        let server_trust = Arc::new(TrustedCertificates::new());
        let client_trust = Arc::new(TrustedCertificates::new());
        let server_verifier: Arc<dyn RpcCertificateVerifier> = server_trust.clone();
        let client_verifier: Arc<dyn RpcCertificateVerifier> = client_trust.clone();
        let server_factory = make_factory(security, Some(server_verifier), None);
        let client_factory = make_factory(security, Some(client_verifier), None);

        // Service side: read the configuration and start listening.
        let wanted = options.server_config(socket_type, security);
        write_record_async(&mut to_service.writer, &wanted).await?;
        let config: ServerConfig = read_record_async(&mut to_service.reader).await?;

        let registry = Arc::new(ServerRegistry::new());
        let state = Arc::new(ProcessState::new());
        let server = LocalServer::start(
            SystemEnv::new(),
            config,
            limits,
            server_factory.new_server_ctx()?,
            &registry,
            Arc::clone(&state),
        );

        let announced = ServerInfo { port: u64::from(server.port()) };
        write_record_async(&mut to_driver.writer, &announced).await?;
        if let Some(certificate) = server.ctx().certificate() {
            write_bytes_async(&mut to_driver.writer, certificate).await?;
        }

        // Driver side: learn the port and trust the server.
        let info: ServerInfo = read_record_async(&mut to_driver.reader).await?;
        if security == RpcSecurity::Tls {
            client_trust.add(&read_bytes_async(&mut to_driver.reader).await?);
        }

        let mut sessions = Vec::with_capacity(options.num_sessions);
        for index in 0..options.num_sessions {
            let connected = connect(
                &server,
                client_factory.as_ref(),
                &server_trust,
                &mut to_service,
                &options,
            )
            .await;

            match connected {
                Ok(proxy) => sessions.push(proxy),
                Err(e) if options.allow_connect_failure => {
                    tracing::warn!(index, error = %e, "session failed to connect, omitting");
                },
                Err(e) => {
                    return Err(HarnessError::ConnectFailed { index, source: Box::new(e) });
                },
            }
        }

        tracing::info!(
            %param,
            port = info.port,
            sessions = sessions.len(),
            threads = options.num_threads,
            incoming = options.num_incoming_connections,
            "process session started"
        );

        Ok(Self { param, options, port: info.port, registry, state, server, sessions })
    }

    /// Matrix cell this process was started for.
    pub fn param(&self) -> TestParam {
        self.param
    }

    /// Options the process was started with.
    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// Port the service reported over the control channel.
    pub fn port(&self) -> u64 {
        self.port
    }

    /// Root interface of every connected session, in connection order.
    pub fn sessions(&self) -> &[Arc<SessionProxy>] {
        &self.sessions
    }

    /// Root interface of the first session.
    pub fn root(&self) -> Option<&Arc<SessionProxy>> {
        self.sessions.first()
    }

    /// The in-process server.
    pub fn server(&self) -> &Arc<LocalServer<SystemEnv>> {
        &self.server
    }

    /// Registry the server is reachable through.
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// State shared by everything in this process.
    pub fn state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    /// Wait for the service's background work to finish.
    pub async fn drain(&self) {
        self.server.service().drain().await;
    }

    /// Shut the server down; false if it already was.
    pub fn shutdown(&self) -> bool {
        self.server.shutdown()
    }

    /// Check that every open session references only its root object.
    pub fn check_binder_counts(&self) -> Result<()> {
        for proxy in &self.sessions {
            let session = proxy.session();
            if session.is_closed() {
                continue;
            }
            let count = session.count_binders();
            if count != 1 {
                return Err(HarnessError::LeakedBinders { session: session.id(), count });
            }
        }
        Ok(())
    }
}

/// Open one session, exchanging the client identity first when it has one.
async fn connect(
    server: &LocalServer<SystemEnv>,
    factory: &dyn TransportCtxFactory,
    server_trust: &TrustedCertificates,
    to_service: &mut ControlPipe,
    options: &HarnessOptions,
) -> Result<Arc<SessionProxy>> {
    let client = factory.new_client_ctx()?;
    if let Some(certificate) = client.certificate() {
        let offered = ClientInfo { certificate: certificate.to_vec() };
        write_record_async(&mut to_service.writer, &offered).await?;
        let info: ClientInfo = read_record_async(&mut to_service.reader).await?;
        server_trust.add(&info.certificate);
    }

    let session = server.accept(client.as_ref(), options.client_fd_mode).await?;
    Ok(SessionProxy::new(server.service().clone(), session))
}

#[cfg(test)]
mod tests {
    use bindersock_core::{BinderRpcTest, LocalBinder};
    use bindersock_proto::FileDescriptorTransportMode;

    use super::*;

    #[tokio::test]
    async fn opens_the_requested_sessions() {
        let options = HarnessOptions { num_sessions: 3, ..HarnessOptions::default() };
        let process = ProcessSession::start(options, RpcSecurity::Raw).await.unwrap();

        assert_eq!(process.sessions().len(), 3);
        assert_eq!(process.server().session_count(), 3);
        process.check_binder_counts().unwrap();
    }

    #[tokio::test]
    async fn tls_sessions_complete_the_exchange() {
        let options = HarnessOptions { num_sessions: 2, ..HarnessOptions::default() };
        let process = ProcessSession::start(options, RpcSecurity::Tls).await.unwrap();

        assert_eq!(process.sessions().len(), 2);
        let root = process.root().unwrap();
        assert_eq!(root.double_string("ab").await.unwrap(), "abab");
    }

    #[tokio::test]
    async fn invalid_options_fail_before_starting() {
        let options = HarnessOptions { num_sessions: 0, ..HarnessOptions::default() };
        let err = ProcessSession::start(options, RpcSecurity::Raw).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn unsupported_fd_mode_fails_the_setup() {
        let options = HarnessOptions {
            client_fd_mode: FileDescriptorTransportMode::Unix,
            ..HarnessOptions::default()
        };
        let err = ProcessSession::start(options, RpcSecurity::Raw).await.unwrap_err();
        assert!(matches!(err, HarnessError::ConnectFailed { index: 0, .. }));
    }

    #[tokio::test]
    async fn tolerated_failures_are_omitted() {
        let options = HarnessOptions {
            num_sessions: 3,
            allow_connect_failure: true,
            ..HarnessOptions::default()
        };
        let limits = ServerLimits { max_sessions: Some(2) };
        let process =
            ProcessSession::start_with(SocketType::Unix, options, RpcSecurity::Raw, limits)
                .await
                .unwrap();

        assert_eq!(process.sessions().len(), 2);
    }

    #[tokio::test]
    async fn leaked_reference_is_reported() {
        let process =
            ProcessSession::start(HarnessOptions::default(), RpcSecurity::Raw).await.unwrap();
        let root = process.root().unwrap();

        let binder = LocalBinder::new_ref();
        root.hold_binder(Some(binder.clone())).await.unwrap();
        root.hold_binder(None).await.unwrap();
        let err = process.check_binder_counts().unwrap_err();
        assert!(matches!(err, HarnessError::LeakedBinders { count: 2, .. }));

        drop(binder);
        process.check_binder_counts().unwrap();
    }
}
