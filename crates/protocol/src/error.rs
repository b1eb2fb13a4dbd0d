//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame length exceeds what the receiver can buffer
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Incomplete frame data
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Length header smaller than the header itself
    #[error("Invalid frame header: total length {total_len} is shorter than the header")]
    InvalidHeader { total_len: u32 },

    /// Payload failed the JPEG sanity check
    #[error("Payload is not a JPEG image: {reason}")]
    NotJpeg { reason: &'static str },

    /// I/O error during frame operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_error() {
        let err = ProtocolError::FrameTooLarge {
            size: 600_000,
            max: 524_288,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Frame too large"));
        assert!(msg.contains("600000"));
        assert!(msg.contains("524288"));
    }

    #[test]
    fn test_not_jpeg_error() {
        let err = ProtocolError::NotJpeg {
            reason: "missing SOI marker",
        };
        assert_eq!(
            err.to_string(),
            "Payload is not a JPEG image: missing SOI marker"
        );
    }
}
