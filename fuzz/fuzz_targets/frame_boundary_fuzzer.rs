//! Fuzz target for frame length boundaries
//!
//! # Strategy
//!
//! - Length prefix: zero, exact, short by some, long by some, at the cap,
//!   just over the cap, `u64::MAX`
//! - Delivery: the frame arrives in arbitrary chunk sizes
//!
//! # Invariants
//!
//! - A prefix above `MAX_PAYLOAD_SIZE` MUST return
//!   `ProtocolError::PayloadTooLarge`, however little of the payload arrived
//! - A well-formed frame decodes to its payload regardless of chunking
//! - Nothing is consumed until a whole frame is present

#![no_main]

use arbitrary::Arbitrary;
use bindersock_proto::{LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE, ProtocolError, decode};
use bytes::{BufMut, BytesMut};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Prefix {
    Exact,
    Zero,
    Short(u8),
    Long(u8),
    AtCap,
    OverCap(u16),
    Max,
}

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    prefix: Prefix,
    payload: Vec<u8>,
    chunks: Vec<u8>,
}

impl BoundaryFrame {
    fn claimed_len(&self) -> u64 {
        let actual = self.payload.len() as u64;
        match self.prefix {
            Prefix::Exact => actual,
            Prefix::Zero => 0,
            Prefix::Short(n) => actual.saturating_sub(u64::from(n)),
            Prefix::Long(n) => actual + u64::from(n),
            Prefix::AtCap => MAX_PAYLOAD_SIZE,
            Prefix::OverCap(n) => MAX_PAYLOAD_SIZE + 1 + u64::from(n),
            Prefix::Max => u64::MAX,
        }
    }
}

fuzz_target!(|frame: BoundaryFrame| {
    let claimed = frame.claimed_len();
    let mut wire = Vec::with_capacity(LENGTH_PREFIX_SIZE + frame.payload.len());
    wire.put_u64_le(claimed);
    wire.extend_from_slice(&frame.payload);

    let mut buf = BytesMut::new();
    let mut offset = 0;
    let mut chunks = frame.chunks.iter().map(|&c| usize::from(c).max(1)).cycle();

    while offset < wire.len() {
        let step = chunks.next().unwrap_or(wire.len()).min(wire.len() - offset);
        buf.extend_from_slice(&wire[offset..offset + step]);
        offset += step;

        let before = buf.len();
        match decode(&mut buf) {
            Ok(Some(payload)) => {
                assert!(claimed <= MAX_PAYLOAD_SIZE);
                assert_eq!(payload.len() as u64, claimed);
                assert_eq!(&payload[..], &frame.payload[..payload.len()]);
                return;
            },
            Ok(None) => assert_eq!(buf.len(), before, "partial frame was consumed"),
            Err(ProtocolError::PayloadTooLarge { .. }) => {
                assert!(claimed > MAX_PAYLOAD_SIZE);
                return;
            },
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // Ran out of input: only possible when the payload is short of the claim.
    assert!(claimed > frame.payload.len() as u64);
});
