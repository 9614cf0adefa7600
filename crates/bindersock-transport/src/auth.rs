//! Local identity for TLS contexts.

use std::fmt;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::{Result, TransportError};

/// Certificate chain plus matching private key.
pub struct Identity {
    /// End-entity certificate first.
    pub chain: Vec<CertificateDer<'static>>,
    /// Key for the end-entity certificate.
    pub key: PrivateKeyDer<'static>,
}

impl Identity {
    /// DER bytes of the end-entity certificate.
    pub fn certificate_der(&self) -> &[u8] {
        self.chain.first().map_or(&[][..], |c| &c[..])
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("chain_len", &self.chain.len()).finish_non_exhaustive()
    }
}

/// Source of the local identity a TLS context presents to peers.
pub trait RpcAuth: Send + Sync + fmt::Debug {
    /// Produce a fresh identity. Called once per context.
    fn identity(&self) -> Result<Identity>;
}

/// Generates a new self-signed certificate for every context.
///
/// # Security
///
/// Self-signed identities carry no trust on their own. Peers must pin them
/// through a verifier or accept everything, which is only acceptable in
/// tests.
#[derive(Debug, Clone)]
pub struct SelfSignedAuth {
    subject_alt_names: Vec<String>,
}

impl Default for SelfSignedAuth {
    fn default() -> Self {
        Self::new(vec![crate::tls::SERVER_NAME.to_string()])
    }
}

impl SelfSignedAuth {
    /// Identity valid for the given names.
    pub fn new(subject_alt_names: Vec<String>) -> Self {
        Self { subject_alt_names }
    }
}

impl RpcAuth for SelfSignedAuth {
    fn identity(&self) -> Result<Identity> {
        let cert =
            rcgen::generate_simple_self_signed(self.subject_alt_names.clone()).map_err(|e| {
                TransportError::Certificate(format!("failed to generate self-signed cert: {e}"))
            })?;

        let cert_der = cert.cert.der().clone();
        let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        Ok(Identity { chain: vec![cert_der], key: key.into() })
    }
}
