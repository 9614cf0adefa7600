//! Protocol error types.

use std::io;

use thiserror::Error;

/// Result alias for control-channel operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or parsing control-channel data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Declared payload length exceeds [`crate::MAX_PAYLOAD_SIZE`].
    ///
    /// Checked before any allocation so a corrupt or hostile length prefix
    /// cannot exhaust memory.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Length claimed by the prefix (or the caller's payload)
        size: u64,
        /// Configured maximum
        max: u64,
    },

    /// The stream or buffer ended before the frame was complete.
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes required to finish the current section
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// A string frame did not contain UTF-8.
    #[error("invalid UTF-8 in string frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// CBOR encoding of a record failed.
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR decoding of a record failed.
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// A textual selector name did not match any known value.
    #[error("unknown {kind}: {value:?}")]
    UnknownName {
        /// Which enumeration was being parsed
        kind: &'static str,
        /// The rejected input
        value: String,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Returns true if the peer closed the channel mid-frame.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::FrameTruncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::PayloadTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "payload too large: 10 bytes (max 5)");

        let err = ProtocolError::FrameTruncated { expected: 8, actual: 3 };
        assert_eq!(err.to_string(), "frame truncated: expected 8 bytes, got 3");
        assert!(err.is_truncation());

        let err = ProtocolError::UnknownName { kind: "socket type", value: "tcp".to_string() };
        assert_eq!(err.to_string(), "unknown socket type: \"tcp\"");
        assert!(!err.is_truncation());
    }
}
