//! TLS transport contexts.
//!
//! Every TLS context presents its own identity and verifies the peer through
//! the factory's [`RpcCertificateVerifier`], on both sides: servers request
//! and check client certificates, clients check the server certificate. The
//! handshake itself runs over any blocking byte stream.
//!
//! # Security
//!
//! TLS 1.3 and 1.2 with the `ring` provider's safe defaults. ALPN is pinned
//! to [`ALPN_PROTOCOL`] so a peer speaking another protocol fails the
//! handshake instead of misparsing frames.

use std::{
    fmt,
    io::{Read, Write},
    sync::Arc,
};

use bindersock_proto::RpcSecurity;
use rustls::{
    ClientConfig, ClientConnection, ServerConfig, ServerConnection, StreamOwned,
    crypto::CryptoProvider, pki_types::ServerName,
};

use crate::{
    auth::RpcAuth,
    error::{Result, TransportError},
    factory::{Role, TransportCtx, TransportCtxFactory},
    verifier::{PeerVerifier, RpcCertificateVerifier},
};

/// ALPN protocol identifier.
pub const ALPN_PROTOCOL: &[u8] = b"bindersock";

/// Name clients expect in the server certificate.
pub const SERVER_NAME: &str = "localhost";

/// Factory for TLS contexts.
pub struct TlsFactory {
    verifier: Arc<dyn RpcCertificateVerifier>,
    auth: Arc<dyn RpcAuth>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for TlsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsFactory")
            .field("verifier", &self.verifier)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl TlsFactory {
    /// Factory verifying peers with `verifier` and presenting identities
    /// from `auth`.
    pub fn new(verifier: Arc<dyn RpcCertificateVerifier>, auth: Arc<dyn RpcAuth>) -> Self {
        Self { verifier, auth, provider: Arc::new(rustls::crypto::ring::default_provider()) }
    }

    fn peer_verifier(&self) -> Arc<PeerVerifier> {
        Arc::new(PeerVerifier::new(Arc::clone(&self.verifier), Arc::clone(&self.provider)))
    }

    /// Concrete server context.
    pub fn server_ctx(&self) -> Result<TlsCtx> {
        let identity = self.auth.identity()?;
        let certificate = identity.certificate_der().to_vec();

        let mut config = ServerConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::Config(e.to_string()))?
            .with_client_cert_verifier(self.peer_verifier())
            .with_single_cert(identity.chain, identity.key)
            .map_err(|e| TransportError::Config(e.to_string()))?;
        config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        tracing::debug!(cert_len = certificate.len(), "TLS server context created");

        Ok(TlsCtx { certificate, config: Config::Server(Arc::new(config)) })
    }

    /// Concrete client context.
    pub fn client_ctx(&self) -> Result<TlsCtx> {
        let identity = self.auth.identity()?;
        let certificate = identity.certificate_der().to_vec();

        let mut config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::Config(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(self.peer_verifier())
            .with_client_auth_cert(identity.chain, identity.key)
            .map_err(|e| TransportError::Config(e.to_string()))?;
        config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        tracing::debug!(cert_len = certificate.len(), "TLS client context created");

        Ok(TlsCtx { certificate, config: Config::Client(Arc::new(config)) })
    }
}

impl TransportCtxFactory for TlsFactory {
    fn security(&self) -> RpcSecurity {
        RpcSecurity::Tls
    }

    fn new_server_ctx(&self) -> Result<Box<dyn TransportCtx>> {
        Ok(Box::new(self.server_ctx()?))
    }

    fn new_client_ctx(&self) -> Result<Box<dyn TransportCtx>> {
        Ok(Box::new(self.client_ctx()?))
    }
}

#[derive(Debug, Clone)]
enum Config {
    Server(Arc<ServerConfig>),
    Client(Arc<ClientConfig>),
}

/// One endpoint's TLS state.
#[derive(Debug, Clone)]
pub struct TlsCtx {
    certificate: Vec<u8>,
    config: Config,
}

impl TlsCtx {
    /// `rustls` config of a server context.
    pub fn server_config(&self) -> Option<Arc<ServerConfig>> {
        match &self.config {
            Config::Server(c) => Some(Arc::clone(c)),
            Config::Client(_) => None,
        }
    }

    /// `rustls` config of a client context.
    pub fn client_config(&self) -> Option<Arc<ClientConfig>> {
        match &self.config {
            Config::Client(c) => Some(Arc::clone(c)),
            Config::Server(_) => None,
        }
    }

    /// Run the server side of a handshake over `sock`.
    pub fn accept<S: Read + Write>(&self, mut sock: S) -> Result<StreamOwned<ServerConnection, S>> {
        let config = self
            .server_config()
            .ok_or_else(|| TransportError::Config("accept on a client context".to_string()))?;
        let mut conn =
            ServerConnection::new(config).map_err(|e| TransportError::Handshake(e.to_string()))?;

        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(|e| TransportError::Handshake(e.to_string()))?;
        }

        tracing::debug!(version = ?conn.protocol_version(), "TLS server handshake complete");
        Ok(StreamOwned::new(conn, sock))
    }

    /// Run the client side of a handshake over `sock`.
    pub fn connect<S: Read + Write>(
        &self,
        mut sock: S,
    ) -> Result<StreamOwned<ClientConnection, S>> {
        let config = self
            .client_config()
            .ok_or_else(|| TransportError::Config("connect on a server context".to_string()))?;
        let name = ServerName::try_from(SERVER_NAME)
            .map_err(|e| TransportError::Config(e.to_string()))?;
        let mut conn = ClientConnection::new(config, name)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(|e| TransportError::Handshake(e.to_string()))?;
        }

        tracing::debug!(version = ?conn.protocol_version(), "TLS client handshake complete");
        Ok(StreamOwned::new(conn, sock))
    }
}

impl TransportCtx for TlsCtx {
    fn security(&self) -> RpcSecurity {
        RpcSecurity::Tls
    }

    fn role(&self) -> Role {
        match self.config {
            Config::Server(_) => Role::Server,
            Config::Client(_) => Role::Client,
        }
    }

    fn certificate(&self) -> Option<&[u8]> {
        Some(&self.certificate)
    }

    fn as_tls(&self) -> Option<&TlsCtx> {
        Some(self)
    }
}
