//! Pluggable peer-certificate verification.
//!
//! Path validation is out of scope for the harness: a verifier sees the
//! peer's end-entity certificate as DER bytes and says yes or no. The
//! [`PeerVerifier`] adapter plugs that decision into `rustls` on both the
//! client and the server side, while handshake signatures are still checked
//! with the crypto provider so a peer cannot present a certificate it does
//! not hold the key for.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::danger::{ClientCertVerified, ClientCertVerifier},
};

use crate::error::{Result, TransportError};

/// Decides whether a peer certificate is acceptable.
pub trait RpcCertificateVerifier: Send + Sync + fmt::Debug {
    /// Accept or reject the peer's end-entity certificate.
    fn verify(&self, cert_der: &[u8]) -> Result<()>;
}

/// Accepts every certificate.
///
/// # Security
///
/// Provides encryption without authentication. Only for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllVerifier;

impl RpcCertificateVerifier for AcceptAllVerifier {
    fn verify(&self, _cert_der: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Accepts only certificates previously added with [`Self::add`].
#[derive(Debug, Default)]
pub struct TrustedCertificates {
    trusted: RwLock<Vec<Vec<u8>>>,
}

impl TrustedCertificates {
    /// Empty set; rejects everything until a certificate is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `cert_der` from now on.
    #[allow(clippy::expect_used)]
    pub fn add(&self, cert_der: &[u8]) {
        let mut trusted = self.trusted.write().expect("RwLock poisoned");
        if !trusted.iter().any(|c| c == cert_der) {
            trusted.push(cert_der.to_vec());
        }
    }

    /// Number of trusted certificates.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.trusted.read().expect("RwLock poisoned").len()
    }

    /// Returns true if nothing is trusted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RpcCertificateVerifier for TrustedCertificates {
    #[allow(clippy::expect_used)]
    fn verify(&self, cert_der: &[u8]) -> Result<()> {
        let trusted = self.trusted.read().expect("RwLock poisoned");
        if trusted.iter().any(|c| c == cert_der) {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!(
                "certificate not among {} trusted",
                trusted.len()
            )))
        }
    }
}

/// Bridges an [`RpcCertificateVerifier`] into `rustls`.
pub struct PeerVerifier {
    inner: Arc<dyn RpcCertificateVerifier>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for PeerVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerVerifier").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl PeerVerifier {
    /// Adapter over `inner`, checking signatures with `provider`.
    pub fn new(inner: Arc<dyn RpcCertificateVerifier>, provider: Arc<CryptoProvider>) -> Self {
        Self { inner, provider }
    }

    fn check(&self, end_entity: &CertificateDer<'_>) -> std::result::Result<(), rustls::Error> {
        self.inner.verify(end_entity).map_err(|e| {
            tracing::warn!(error = %e, "peer certificate rejected");
            rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
        })
    }
}

impl ServerCertVerifier for PeerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        self.check(end_entity)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for PeerVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        self.check(end_entity)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn accept_all_accepts_anything() {
        assert!(AcceptAllVerifier.verify(b"").is_ok());
        assert!(AcceptAllVerifier.verify(b"not even DER").is_ok());
    }

    #[test]
    fn trusted_set_pins_exact_bytes() {
        let trusted = TrustedCertificates::new();
        assert!(trusted.is_empty());
        assert!(matches!(trusted.verify(b"cert-a"), Err(TransportError::Rejected(_))));

        trusted.add(b"cert-a");
        trusted.add(b"cert-a");
        assert_eq!(trusted.len(), 1);

        assert!(trusted.verify(b"cert-a").is_ok());
        assert!(trusted.verify(b"cert-b").is_err());
    }

    proptest! {
        #[test]
        fn pinned_set_accepts_exactly_its_members(
            pinned in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
            candidate in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let trusted = TrustedCertificates::new();
            for cert in &pinned {
                trusted.add(cert);
            }

            for cert in &pinned {
                prop_assert!(trusted.verify(cert).is_ok());
            }
            prop_assert_eq!(trusted.verify(&candidate).is_ok(), pinned.contains(&candidate));
        }
    }
}
