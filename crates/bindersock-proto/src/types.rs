//! Transport selectors and security modes.
//!
//! These values parameterize every conformance run. They travel to the
//! service process inside [`crate::ServerConfig`], so they are serializable
//! and have stable display names used to label test cases.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// How the client reaches the service.
///
/// Chosen once per test case. Determines only how the remote service is
/// reached, never how it behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    /// A connected unix-domain socket handed over before the session starts
    Preconnected,
    /// A unix-domain socket bound to a filesystem path
    Unix,
    /// A unix-domain socket whose connections are bootstrapped over a
    /// pre-shared descriptor
    UnixBootstrap,
    /// A virtual-machine socket address
    Vsock,
    /// An internet socket on the loopback interface
    Inet,
}

impl SocketType {
    /// Every selector, in test-matrix order.
    pub const fn all() -> [Self; 5] {
        [Self::Preconnected, Self::Unix, Self::UnixBootstrap, Self::Vsock, Self::Inet]
    }

    /// Stable name used in test-case labels.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Preconnected => "preconnected_uds",
            Self::Unix => "unix_domain_socket",
            Self::UnixBootstrap => "unix_domain_socket_bootstrap",
            Self::Vsock => "vm_socket",
            Self::Inet => "inet_socket",
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SocketType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ProtocolError::UnknownName { kind: "socket type", value: s.to_string() })
    }
}

/// Security posture of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcSecurity {
    /// Plaintext over the raw socket
    Raw,
    /// TLS with certificate verification in both directions
    Tls,
}

impl RpcSecurity {
    /// Every security mode, in test-matrix order.
    pub const fn all() -> [Self; 2] {
        [Self::Raw, Self::Tls]
    }

    /// Stable name used in test-case labels.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for RpcSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RpcSecurity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all().into_iter().find(|m| m.name() == s).ok_or_else(|| {
            ProtocolError::UnknownName { kind: "security mode", value: s.to_string() }
        })
    }
}

/// Mechanism used to carry file descriptors alongside a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileDescriptorTransportMode {
    /// Descriptors are not transferred
    #[default]
    None,
    /// `SCM_RIGHTS` ancillary data on a unix-domain socket
    Unix,
    /// Trusty IPC handles
    Trusty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_type_names_parse_back() {
        for socket_type in SocketType::all() {
            assert_eq!(socket_type.to_string().parse::<SocketType>().unwrap(), socket_type);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = "tcp".parse::<SocketType>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownName { kind: "socket type", .. }));

        let err = "ssl".parse::<RpcSecurity>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownName { kind: "security mode", .. }));
    }

    #[test]
    fn security_modes_round_trip_names() {
        assert_eq!("raw".parse::<RpcSecurity>().unwrap(), RpcSecurity::Raw);
        assert_eq!("tls".parse::<RpcSecurity>().unwrap(), RpcSecurity::Tls);
        assert_eq!(RpcSecurity::all().len(), 2);
    }
}
