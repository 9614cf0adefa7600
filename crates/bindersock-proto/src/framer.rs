//! Length-prefixed framing.
//!
//! Layout on the wire:
//! `[length: u64, little endian] + [payload: length bytes]`
//!
//! The framer knows nothing about the payload. Strings are framed as their
//! UTF-8 bytes; records are framed as their CBOR encoding (see
//! [`crate::records`]). There is no magic, version or checksum at this layer.
//!
//! # Invariants
//!
//! - Exact Size: a decoded payload is exactly the number of bytes the prefix
//!   declares. Trailing bytes belong to the next frame.
//! - Size Limit: neither side accepts a length above [`MAX_PAYLOAD_SIZE`].
//!   Readers check the prefix before allocating the payload buffer.

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// Largest payload a frame may carry (64 MiB).
pub const MAX_PAYLOAD_SIZE: u64 = 64 * 1024 * 1024;

/// Validate a declared length and convert it to an in-memory size.
pub(crate) fn check_length(len: u64) -> Result<usize> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: len, max: MAX_PAYLOAD_SIZE });
    }

    usize::try_from(len)
        .map_err(|_| ProtocolError::PayloadTooLarge { size: len, max: MAX_PAYLOAD_SIZE })
}

/// Length prefix for an outgoing payload.
pub(crate) fn payload_length(payload: &[u8]) -> Result<u64> {
    let len = u64::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        size: u64::MAX,
        max: MAX_PAYLOAD_SIZE,
    })?;
    check_length(len)?;
    Ok(len)
}

/// Append one frame carrying `payload` to `dst`.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if `payload` exceeds
///   [`MAX_PAYLOAD_SIZE`]. Nothing is written in that case.
pub fn encode(payload: &[u8], dst: &mut impl BufMut) -> Result<()> {
    let len = payload_length(payload)?;
    dst.put_u64_le(len);
    dst.put_slice(payload);
    Ok(())
}

/// Pull one complete frame off the front of `src`.
///
/// Returns `Ok(None)` while the buffer holds only part of a frame; the
/// partial bytes are left in place so the caller can append more and retry.
/// On success the frame (prefix and payload) is consumed from `src`.
pub fn decode(src: &mut BytesMut) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let len = check_length((&src[..LENGTH_PREFIX_SIZE]).get_u64_le())?;

    // len <= MAX_PAYLOAD_SIZE, so this cannot overflow
    let total = LENGTH_PREFIX_SIZE + len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Decode a single frame that must be entirely present in `bytes`.
///
/// Returns the payload slice. Bytes after the frame are ignored.
///
/// # Errors
///
/// - `ProtocolError::FrameTruncated` if the prefix or payload is incomplete
/// - `ProtocolError::PayloadTooLarge` if the prefix exceeds the limit
pub fn decode_exact(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::FrameTruncated {
            expected: LENGTH_PREFIX_SIZE,
            actual: bytes.len(),
        });
    }

    let len = check_length((&bytes[..LENGTH_PREFIX_SIZE]).get_u64_le())?;
    let payload = &bytes[LENGTH_PREFIX_SIZE..];

    if payload.len() < len {
        return Err(ProtocolError::FrameTruncated { expected: len, actual: payload.len() });
    }

    Ok(&payload[..len])
}

/// Write one frame to a blocking writer and flush it.
pub fn write_bytes<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = payload_length(payload)?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Write a string as one frame.
pub fn write_string<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    write_bytes(writer, value.as_bytes())
}

/// Read one frame from a blocking reader.
///
/// # Errors
///
/// - `ProtocolError::FrameTruncated` if the reader hits EOF mid-frame
/// - `ProtocolError::PayloadTooLarge` if the prefix exceeds the limit
/// - `ProtocolError::Io` for any other read failure
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    read_full(reader, &mut prefix)?;

    let len = check_length(u64::from_le_bytes(prefix))?;
    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload)?;

    Ok(payload)
}

/// Read one frame and interpret it as UTF-8.
pub fn read_string<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    Ok(String::from_utf8(read_bytes(reader)?)?)
}

/// Fill `buf` completely, reporting how far we got on EOF.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ProtocolError::FrameTruncated { expected: buf.len(), actual: filled });
            },
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn buffer_round_trip(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let mut wire = BytesMut::new();
            encode(&payload, &mut wire).expect("should encode");
            prop_assert_eq!(wire.len(), LENGTH_PREFIX_SIZE + payload.len());

            let decoded = decode(&mut wire).expect("should decode").expect("complete frame");
            prop_assert_eq!(decoded.as_ref(), payload.as_slice());
            prop_assert!(wire.is_empty());
        }
    }

    #[test]
    fn prefix_is_little_endian_length() {
        let mut wire = Vec::new();
        encode(b"abc", &mut wire).unwrap();
        assert_eq!(&wire[..8], &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&wire[8..], b"abc");
    }

    #[test]
    fn empty_payload_is_prefix_only() {
        let mut wire = Vec::new();
        encode(b"", &mut wire).unwrap();
        assert_eq!(wire, vec![0u8; 8]);
        assert_eq!(decode_exact(&wire).unwrap(), b"");
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut full = BytesMut::new();
        encode(b"hello", &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..4]);
        assert!(decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), 4, "partial prefix must not be consumed");

        partial.extend_from_slice(&full[4..10]);
        assert!(decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[10..]);
        assert_eq!(decode(&mut partial).unwrap().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut wire = BytesMut::new();
        encode(b"first", &mut wire).unwrap();
        encode(b"second", &mut wire).unwrap();

        assert_eq!(decode(&mut wire).unwrap().unwrap().as_ref(), b"first");
        assert_eq!(decode(&mut wire).unwrap().unwrap().as_ref(), b"second");
        assert!(decode(&mut wire).unwrap().is_none());
    }

    #[test]
    fn reject_oversized_prefix() {
        let mut wire = BytesMut::new();
        wire.put_u64_le(MAX_PAYLOAD_SIZE + 1);

        let result = decode(&mut wire);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));

        let mut reader = Cursor::new(u64::MAX.to_le_bytes().to_vec());
        let result = read_bytes(&mut reader);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn reject_truncated_frame() {
        let mut wire = Vec::new();
        encode(b"truncate me", &mut wire).unwrap();
        wire.truncate(12);

        let result = decode_exact(&wire);
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { expected: 11, actual: 4 })));

        let result = read_bytes(&mut Cursor::new(wire));
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { expected: 11, actual: 4 })));

        let result = read_bytes(&mut Cursor::new(vec![1u8, 0, 0]));
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { expected: 8, actual: 3 })));
    }

    #[test]
    fn strings_round_trip_over_blocking_io() {
        let mut wire = Vec::new();
        write_string(&mut wire, "control").unwrap();
        write_string(&mut wire, "").unwrap();

        let mut reader = Cursor::new(wire);
        assert_eq!(read_string(&mut reader).unwrap(), "control");
        assert_eq!(read_string(&mut reader).unwrap(), "");
    }

    #[test]
    fn read_string_rejects_invalid_utf8() {
        let mut wire = Vec::new();
        write_bytes(&mut wire, &[0xff, 0xfe]).unwrap();

        let result = read_string(&mut Cursor::new(wire));
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }
}
