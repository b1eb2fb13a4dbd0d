//! Length-prefixed framing for the bulk pipe
//!
//! Every image crosses the wire as a single frame:
//! ```text
//! [Total length: u32 (little-endian)][Payload bytes]
//! ```
//!
//! The total length includes the 4 header bytes. The receiver reads the first
//! packet, takes the length from it, and keeps reading until the whole frame
//! has arrived in one of its 512 KiB buffers.

use crate::error::{ProtocolError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::BufMut;
use std::io::{Read, Write};

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 4;

/// Per-frame buffer size on the receiving device (512 KiB)
pub const DEVICE_BUFFER_SIZE: usize = 512 * 1024;

/// Frame length prefix
///
/// Only built through `for_payload` or `from_bytes`, so the total length
/// always covers at least the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    total_len: u32,
}

impl FrameHeader {
    /// Build the header for a payload of `payload_len` bytes
    pub fn for_payload(payload_len: usize) -> Result<Self> {
        let total = payload_len
            .checked_add(HEADER_LEN)
            .ok_or(ProtocolError::FrameTooLarge {
                size: usize::MAX,
                max: u32::MAX as usize,
            })?;

        let total_len = u32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge {
            size: total,
            max: u32::MAX as usize,
        })?;

        Ok(Self { total_len })
    }

    /// Parse a header from its wire bytes
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Result<Self> {
        let total_len = u32::from_le_bytes(bytes);
        if (total_len as usize) < HEADER_LEN {
            return Err(ProtocolError::InvalidHeader { total_len });
        }
        Ok(Self { total_len })
    }

    /// Wire representation of the header
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        self.total_len.to_le_bytes()
    }

    /// Total frame length, header included
    pub fn total_len(self) -> u32 {
        self.total_len
    }

    /// Number of payload bytes following the header
    pub fn payload_len(self) -> usize {
        self.total_len as usize - HEADER_LEN
    }

    /// Total frame length as usize
    pub fn frame_len(self) -> usize {
        self.total_len as usize
    }
}

/// Check a frame size against the configured maximum
fn check_size(header: FrameHeader, max_frame_size: usize) -> Result<()> {
    if header.frame_len() > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: header.frame_len(),
            max: max_frame_size,
        });
    }
    Ok(())
}

/// Encode a payload into a frame
///
/// `max_frame_size` bounds the total frame length (header included).
///
/// # Example
/// ```
/// use protocol::{DEVICE_BUFFER_SIZE, encode_frame};
///
/// let frame = encode_frame(b"abc", DEVICE_BUFFER_SIZE).unwrap();
/// assert_eq!(frame, [7, 0, 0, 0, b'a', b'b', b'c']);
/// ```
pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Vec<u8>> {
    let header = FrameHeader::for_payload(payload.len())?;
    check_size(header, max_frame_size)?;

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.put_u32_le(header.total_len);
    frame.put_slice(payload);

    Ok(frame)
}

/// Decode a frame and return its payload
///
/// Bytes past the declared length are ignored, matching the receiver which
/// stops reading once the declared length has arrived.
pub fn decode_frame(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < HEADER_LEN {
        return Err(ProtocolError::IncompleteFrame {
            expected: HEADER_LEN,
            actual: frame.len(),
        });
    }

    let header = FrameHeader::from_bytes([frame[0], frame[1], frame[2], frame[3]])?;

    if frame.len() < header.frame_len() {
        return Err(ProtocolError::IncompleteFrame {
            expected: header.frame_len(),
            actual: frame.len(),
        });
    }

    Ok(&frame[HEADER_LEN..header.frame_len()])
}

/// Write a framed payload to a writer
///
/// Returns the number of bytes written, header included.
pub fn write_frame<W: Write>(
    writer: &mut W,
    payload: &[u8],
    max_frame_size: usize,
) -> Result<usize> {
    let frame = encode_frame(payload, max_frame_size)?;
    writer.write_all(&frame)?;
    Ok(frame.len())
}

/// Read one framed payload from a reader
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<Vec<u8>> {
    let total_len = reader.read_u32::<LittleEndian>()?;
    let header = FrameHeader::from_bytes(total_len.to_le_bytes())?;
    check_size(header, max_frame_size)?;

    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload)?;

    Ok(payload)
}
