//! Per-test-case harness options.

use bindersock_proto::{FileDescriptorTransportMode, RpcSecurity, ServerConfig, SocketType};

use crate::error::{HarnessError, Result};

/// Protocol version the in-process server advertises.
pub const SERVER_VERSION: u32 = 1;

/// Parameters of one simulated test process.
///
/// # Invariants
///
/// - `num_threads >= 1` and `num_sessions >= 1`
/// - `server_supported_fd_modes` is non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Worker threads the server would use.
    pub num_threads: usize,
    /// Sessions to open.
    pub num_sessions: usize,
    /// Incoming (server to client) connections per session.
    pub num_incoming_connections: usize,
    /// Outgoing connections per session; `None` leaves it unbounded.
    pub num_outgoing_connections: Option<usize>,
    /// Descriptor mode the client asks for.
    pub client_fd_mode: FileDescriptorTransportMode,
    /// Descriptor modes the server accepts.
    pub server_supported_fd_modes: Vec<FileDescriptorTransportMode>,
    /// Omit sessions that fail to connect instead of failing the setup.
    pub allow_connect_failure: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            num_threads: 1,
            num_sessions: 1,
            num_incoming_connections: 0,
            num_outgoing_connections: None,
            client_fd_mode: FileDescriptorTransportMode::None,
            server_supported_fd_modes: vec![FileDescriptorTransportMode::None],
            allow_connect_failure: false,
        }
    }
}

impl HarnessOptions {
    /// Options with descriptor passing negotiated over unix sockets.
    pub fn with_unix_fds() -> Self {
        Self {
            client_fd_mode: FileDescriptorTransportMode::Unix,
            server_supported_fd_modes: vec![
                FileDescriptorTransportMode::None,
                FileDescriptorTransportMode::Unix,
            ],
            ..Self::default()
        }
    }

    /// Check the invariants.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(HarnessError::InvalidOptions("num_threads must be at least 1".to_string()));
        }
        if self.num_sessions == 0 {
            return Err(HarnessError::InvalidOptions("num_sessions must be at least 1".to_string()));
        }
        if self.server_supported_fd_modes.is_empty() {
            return Err(HarnessError::InvalidOptions(
                "server must support at least one descriptor mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Control record sent to the service process at startup.
    pub fn server_config(
        &self,
        socket_type: SocketType,
        rpc_security: RpcSecurity,
    ) -> ServerConfig {
        ServerConfig {
            num_threads: self.num_threads,
            socket_type,
            rpc_security,
            server_version: SERVER_VERSION,
            vsock_port: 0,
            addr: String::new(),
            server_supported_fd_modes: self.server_supported_fd_modes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = HarnessOptions::default();
        options.validate().unwrap();

        assert_eq!(options.num_threads, 1);
        assert_eq!(options.num_sessions, 1);
        assert_eq!(options.num_incoming_connections, 0);
        assert_eq!(options.num_outgoing_connections, None);
        assert_eq!(options.client_fd_mode, FileDescriptorTransportMode::None);
        assert_eq!(options.server_supported_fd_modes, vec![FileDescriptorTransportMode::None]);
        assert!(!options.allow_connect_failure);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let zero_threads = HarnessOptions { num_threads: 0, ..HarnessOptions::default() };
        assert!(matches!(zero_threads.validate(), Err(HarnessError::InvalidOptions(_))));

        let zero_sessions = HarnessOptions { num_sessions: 0, ..HarnessOptions::default() };
        assert!(zero_sessions.validate().is_err());

        let no_modes =
            HarnessOptions { server_supported_fd_modes: Vec::new(), ..HarnessOptions::default() };
        assert!(no_modes.validate().is_err());
    }

    #[test]
    fn server_config_carries_options() {
        let options = HarnessOptions { num_threads: 4, ..HarnessOptions::with_unix_fds() };
        let config = options.server_config(SocketType::Inet, RpcSecurity::Tls);

        assert_eq!(config.num_threads, 4);
        assert_eq!(config.socket_type, SocketType::Inet);
        assert_eq!(config.rpc_security, RpcSecurity::Tls);
        assert_eq!(config.server_version, SERVER_VERSION);
        assert_eq!(config.server_supported_fd_modes.len(), 2);
    }
}
