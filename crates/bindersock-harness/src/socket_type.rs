//! Test-matrix parameters and their labels.

use std::fmt;

pub use bindersock_proto::{RpcSecurity, SocketType};
use bindersock_service::fatal;

/// One cell of the conformance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestParam {
    /// How the client reaches the service
    pub socket_type: SocketType,
    /// Security posture of the transport
    pub security: RpcSecurity,
}

impl fmt::Display for TestParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.socket_type, self.security)
    }
}

/// Every (socket type, security) pair, socket type major.
pub fn test_matrix() -> Vec<TestParam> {
    SocketType::all()
        .into_iter()
        .flat_map(|socket_type| {
            RpcSecurity::all().into_iter().map(move |security| TestParam { socket_type, security })
        })
        .collect()
}

/// Parse a security mode name; an unknown name is fatal.
pub fn security_or_die(name: &str) -> RpcSecurity {
    name.parse().unwrap_or_else(|e| fatal(&format!("{e}")))
}

/// Parse a socket type name; an unknown name is fatal.
pub fn socket_type_or_die(name: &str) -> SocketType {
    name.parse().unwrap_or_else(|e| fatal(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;

    use nix::sys::signal::Signal;

    use super::*;

    const DIE_CHILD: &str = "BINDERSOCK_PARSE_OR_DIE_CHILD";

    /// Re-runs this test binary on one test with `DIE_CHILD` set; the child
    /// parses `name` and the parent checks that it aborted.
    fn run_parse_child(test_name: &str, parse: fn(&str), name: &str) {
        if std::env::var_os(DIE_CHILD).is_some() {
            parse(name);
            unreachable!("{name} parsed");
        }

        let status = std::process::Command::new(std::env::current_exe().unwrap())
            .args(["--exact", test_name, "--nocapture", "--test-threads=1"])
            .env(DIE_CHILD, "1")
            .status()
            .unwrap();

        assert_eq!(status.signal(), Some(Signal::SIGABRT as i32), "{status}");
    }

    #[test]
    fn matrix_covers_every_pair_once() {
        let matrix = test_matrix();
        assert_eq!(matrix.len(), SocketType::all().len() * RpcSecurity::all().len());

        let mut labels: Vec<String> = matrix.iter().map(ToString::to_string).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), matrix.len());
    }

    #[test]
    fn known_names_parse() {
        assert_eq!(security_or_die("tls"), RpcSecurity::Tls);
        assert_eq!(socket_type_or_die("vm_socket"), SocketType::Vsock);
    }

    #[test]
    fn unknown_security_mode_aborts() {
        run_parse_child(
            "socket_type::tests::unknown_security_mode_aborts",
            |name| {
                let _ = security_or_die(name);
            },
            "plaintext",
        );
    }

    #[test]
    fn unknown_socket_type_aborts() {
        run_parse_child(
            "socket_type::tests::unknown_socket_type_aborts",
            |name| {
                let _ = socket_type_or_die(name);
            },
            "carrier_pigeon",
        );
    }
}
