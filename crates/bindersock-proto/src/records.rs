//! Structured control records.
//!
//! Records are serialized with CBOR and then framed like any other payload;
//! the framer treats the encoding as opaque bytes. The driver sends a
//! [`ServerConfig`] to the service process, the service answers with a
//! [`ServerInfo`], and under TLS the driver sends a [`ClientInfo`] carrying
//! the client certificate so the service can pin it.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    errors::{ProtocolError, Result},
    framer::{read_bytes, write_bytes},
    types::{FileDescriptorTransportMode, RpcSecurity, SocketType},
};

/// Configuration the driver hands to a freshly started service process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Size of the server's call-handling thread pool
    pub num_threads: usize,
    /// Transport the server listens on
    pub socket_type: SocketType,
    /// Security posture of the transport
    pub rpc_security: RpcSecurity,
    /// Wire protocol version the server should speak
    pub server_version: u32,
    /// Port for [`SocketType::Vsock`] servers
    pub vsock_port: u32,
    /// Filesystem path or address the server binds, when applicable
    pub addr: String,
    /// Descriptor transport modes the server accepts
    pub server_supported_fd_modes: Vec<FileDescriptorTransportMode>,
}

/// What the service process reports back once it is listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Port the server bound (0 if the transport has no ports)
    pub port: u64,
}

/// Client identity sent to the service process under TLS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// DER-encoded client certificate
    pub certificate: Vec<u8>,
}

/// Encode a record to CBOR bytes.
pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(record, &mut bytes)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(bytes)
}

/// Decode a record from CBOR bytes.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

/// Serialize `record` and write it as one frame.
pub fn write_record<W, T>(writer: &mut W, record: &T) -> Result<()>
where
    W: Write + ?Sized,
    T: Serialize,
{
    let bytes = encode_record(record)?;
    write_bytes(writer, &bytes)
}

/// Read one frame and decode it as a record.
pub fn read_record<R, T>(reader: &mut R) -> Result<T>
where
    R: Read + ?Sized,
    T: DeserializeOwned,
{
    let bytes = read_bytes(reader)?;
    decode_record(&bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            num_threads: 4,
            socket_type: SocketType::UnixBootstrap,
            rpc_security: RpcSecurity::Tls,
            server_version: 1,
            vsock_port: 0,
            addr: "/tmp/binder.sock".to_string(),
            server_supported_fd_modes: vec![
                FileDescriptorTransportMode::None,
                FileDescriptorTransportMode::Unix,
            ],
        }
    }

    #[test]
    fn config_survives_framing() {
        let config = sample_config();

        let mut wire = Vec::new();
        write_record(&mut wire, &config).unwrap();
        write_record(&mut wire, &ClientInfo { certificate: vec![0x30, 0x82] }).unwrap();

        let mut reader = Cursor::new(wire);
        let decoded: ServerConfig = read_record(&mut reader).unwrap();
        let client: ClientInfo = read_record(&mut reader).unwrap();

        assert_eq!(decoded, config);
        assert_eq!(client.certificate, vec![0x30, 0x82]);
    }

    #[test]
    fn wrong_record_type_is_a_decode_error() {
        let bytes = encode_record(&ServerInfo { port: 7 }).unwrap();
        let result: Result<ServerConfig> = decode_record(&bytes);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let result: Result<ServerInfo> = decode_record(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }
}
