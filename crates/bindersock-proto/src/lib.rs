//! Bindersock control-channel protocol.
//!
//! Cooperating test processes exchange a small amount of out-of-band data
//! (server configuration, the port a server bound, the client certificate)
//! over an auxiliary control channel. Everything on that channel uses one
//! framing: an 8-byte little-endian length followed by exactly that many
//! payload bytes.
//!
//! # Components
//!
//! - [`framer`]: length-prefixed framing over buffers and blocking I/O
//! - [`stream`]: the same framing over tokio async streams
//! - [`records`]: CBOR-serialized structured records carried as opaque frames
//! - [`types`]: transport selectors and security modes shared by every crate

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod framer;
pub mod records;
pub mod stream;
pub mod types;

pub use errors::{ProtocolError, Result};
pub use framer::{
    LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE, decode, decode_exact, encode, read_bytes, read_string,
    write_bytes, write_string,
};
pub use records::{
    ClientInfo, ServerConfig, ServerInfo, decode_record, encode_record, read_record, write_record,
};
pub use types::{FileDescriptorTransportMode, RpcSecurity, SocketType};
