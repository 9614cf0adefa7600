//! Transport contexts for the bindersock conformance harness.
//!
//! The harness runs every test case twice: once in plaintext and once over
//! TLS. [`make_factory`] picks the context factory for a security mode;
//! the contexts it creates carry what a connection needs for that mode (for
//! TLS: the local identity, the `rustls` configs and the peer verifier).
//!
//! # Security
//!
//! Defaults are for testing only: an absent verifier accepts every peer, and
//! an absent authenticator generates a fresh self-signed certificate per
//! context. Tests that care about authentication pin peers with
//! [`TrustedCertificates`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod factory;
pub mod tls;
pub mod verifier;

pub use auth::{Identity, RpcAuth, SelfSignedAuth};
pub use error::{Result, TransportError};
pub use factory::{
    RawCtx, RawFactory, Role, TransportCtx, TransportCtxFactory, make_factory,
};
pub use tls::{ALPN_PROTOCOL, SERVER_NAME, TlsCtx, TlsFactory};
pub use verifier::{AcceptAllVerifier, PeerVerifier, RpcCertificateVerifier, TrustedCertificates};
