//! Fuzz target for control records
//!
//! Arbitrary CBOR must decode to an error or a record, never panic. A record
//! that does decode must survive being written back out and read again.

#![no_main]

use bindersock_proto::{ClientInfo, ServerConfig, ServerInfo, decode_record, encode_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = decode_record::<ServerConfig>(data) {
        let bytes = encode_record(&config).expect("decoded record re-encodes");
        assert_eq!(decode_record::<ServerConfig>(&bytes).ok(), Some(config));
    }
    if let Ok(info) = decode_record::<ServerInfo>(data) {
        let bytes = encode_record(&info).expect("decoded record re-encodes");
        assert_eq!(decode_record::<ServerInfo>(&bytes).ok(), Some(info));
    }
    let _ = decode_record::<ClientInfo>(data);
});
