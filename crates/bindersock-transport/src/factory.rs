//! Transport context factories.
//!
//! A factory is chosen once per test case from the security mode and creates
//! one context per server and per client. Raw contexts are plaintext and
//! carry no identity; TLS contexts are built in [`crate::tls`].

use std::{fmt, sync::Arc};

use bindersock_proto::RpcSecurity;

use crate::{
    auth::{RpcAuth, SelfSignedAuth},
    error::Result,
    tls::{TlsCtx, TlsFactory},
    verifier::{AcceptAllVerifier, RpcCertificateVerifier},
};

/// Which side of a connection a context serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepting side.
    Server,
    /// Connecting side.
    Client,
}

/// Per-endpoint transport state.
pub trait TransportCtx: Send + Sync + fmt::Debug {
    /// Security mode of this context.
    fn security(&self) -> RpcSecurity;

    /// Side this context was created for.
    fn role(&self) -> Role;

    /// DER certificate presented to peers; `None` for plaintext contexts.
    fn certificate(&self) -> Option<&[u8]>;

    /// Downcast to a TLS context.
    fn as_tls(&self) -> Option<&TlsCtx> {
        None
    }
}

/// Creates transport contexts for one security mode.
pub trait TransportCtxFactory: Send + Sync + fmt::Debug {
    /// Security mode of every context this factory creates.
    fn security(&self) -> RpcSecurity;

    /// Context for an accepting endpoint.
    fn new_server_ctx(&self) -> Result<Box<dyn TransportCtx>>;

    /// Context for a connecting endpoint.
    fn new_client_ctx(&self) -> Result<Box<dyn TransportCtx>>;
}

/// Plaintext context.
#[derive(Debug, Clone, Copy)]
pub struct RawCtx {
    role: Role,
}

impl TransportCtx for RawCtx {
    fn security(&self) -> RpcSecurity {
        RpcSecurity::Raw
    }

    fn role(&self) -> Role {
        self.role
    }

    fn certificate(&self) -> Option<&[u8]> {
        None
    }
}

/// Factory for plaintext contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawFactory;

impl TransportCtxFactory for RawFactory {
    fn security(&self) -> RpcSecurity {
        RpcSecurity::Raw
    }

    fn new_server_ctx(&self) -> Result<Box<dyn TransportCtx>> {
        Ok(Box::new(RawCtx { role: Role::Server }))
    }

    fn new_client_ctx(&self) -> Result<Box<dyn TransportCtx>> {
        Ok(Box::new(RawCtx { role: Role::Client }))
    }
}

/// Build the factory for `mode`.
///
/// For TLS, an absent verifier becomes [`AcceptAllVerifier`] and an absent
/// authenticator becomes [`SelfSignedAuth`]. Both are ignored for raw mode.
pub fn make_factory(
    mode: RpcSecurity,
    verifier: Option<Arc<dyn RpcCertificateVerifier>>,
    auth: Option<Arc<dyn RpcAuth>>,
) -> Box<dyn TransportCtxFactory> {
    match mode {
        RpcSecurity::Raw => Box::new(RawFactory),
        RpcSecurity::Tls => {
            let verifier = verifier.unwrap_or_else(|| Arc::new(AcceptAllVerifier));
            let auth = auth.unwrap_or_else(|| Arc::new(SelfSignedAuth::default()));
            Box::new(TlsFactory::new(verifier, auth))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_contexts_have_no_identity() {
        let factory = make_factory(RpcSecurity::Raw, None, None);
        assert_eq!(factory.security(), RpcSecurity::Raw);

        let server = factory.new_server_ctx().unwrap();
        let client = factory.new_client_ctx().unwrap();

        assert_eq!(server.role(), Role::Server);
        assert_eq!(client.role(), Role::Client);
        assert!(server.certificate().is_none());
        assert!(server.as_tls().is_none());
    }

    #[test]
    fn tls_defaults_fill_in() {
        let factory = make_factory(RpcSecurity::Tls, None, None);
        assert_eq!(factory.security(), RpcSecurity::Tls);

        let server = factory.new_server_ctx().unwrap();
        assert_eq!(server.security(), RpcSecurity::Tls);
        assert!(server.certificate().is_some_and(|c| !c.is_empty()));
        assert!(server.as_tls().is_some());
    }

    #[test]
    fn every_security_mode_builds() {
        for mode in RpcSecurity::all() {
            let factory = make_factory(mode, None, None);
            assert_eq!(factory.security(), mode);
            assert!(factory.new_client_ctx().is_ok());
        }
    }
}
