//! Fuzz target for control-channel frame decoding
//!
//! Feeds arbitrary bytes to both decoders. Neither may panic, and they must
//! agree: the streaming decoder yields a frame exactly when the one-shot
//! decoder succeeds, with the same payload.

#![no_main]

use bindersock_proto::{decode, decode_exact};
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let exact = decode_exact(data);

    let mut buf = BytesMut::from(data);
    match decode(&mut buf) {
        Ok(Some(frame)) => {
            assert_eq!(exact.ok(), Some(&frame[..]), "decoders disagree on a complete frame");
        },
        Ok(None) => {
            assert!(exact.is_err(), "streaming decoder wants more bytes than one-shot needed");
        },
        Err(_) => {
            assert!(exact.is_err(), "one-shot decoder accepted an invalid prefix");
        },
    }
});
