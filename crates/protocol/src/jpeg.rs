//! JPEG sanity checks
//!
//! The receiver hands frames straight to a hardware decoder and silently drops
//! anything it cannot decode, so payloads are checked for the JPEG start and
//! end markers before they are sent. This is not a full parser: it walks the
//! marker segments only far enough to find the frame dimensions.

use crate::error::{ProtocolError, Result};

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;

/// Basic facts about a JPEG payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JpegInfo {
    pub width: Option<u16>,
    pub height: Option<u16>,
}

/// Validate that `data` looks like a complete JPEG image
///
/// # Example
/// ```
/// use protocol::jpeg;
///
/// assert!(jpeg::validate(&[0xFF, 0xD8, 0xFF, 0xD9]).is_ok());
/// assert!(jpeg::validate(b"\x89PNG\r\n\x1a\n").is_err());
/// ```
pub fn validate(data: &[u8]) -> Result<JpegInfo> {
    if data.len() < 4 {
        return Err(ProtocolError::NotJpeg {
            reason: "payload too short",
        });
    }

    if data[0] != MARKER_PREFIX || data[1] != SOI {
        return Err(ProtocolError::NotJpeg {
            reason: "missing SOI marker",
        });
    }

    // Encoders may pad the buffer after EOI and cameras append trailers, so
    // the image ends at the last EOI rather than at the last byte
    let end = data
        .windows(2)
        .rposition(|pair| pair == [MARKER_PREFIX, EOI])
        .map_or(0, |i| i + 2);
    if end < 4 {
        return Err(ProtocolError::NotJpeg {
            reason: "missing EOI marker",
        });
    }

    Ok(scan_dimensions(&data[2..end]))
}

/// Start-of-frame markers carry the image dimensions (DHT, JPG and DAC share
/// the 0xC_ range but are not frame headers)
fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn is_standalone(marker: u8) -> bool {
    marker == TEM || (0xD0..=0xD7).contains(&marker)
}

/// Walk the header segments until a SOFn or the start of scan
fn scan_dimensions(mut data: &[u8]) -> JpegInfo {
    loop {
        // Marker prefix, possibly preceded by fill bytes
        let Some(pos) = data.iter().position(|&b| b != MARKER_PREFIX) else {
            return JpegInfo::default();
        };
        if pos == 0 {
            return JpegInfo::default();
        }
        let marker = data[pos];
        data = &data[pos + 1..];

        if marker == EOI || marker == SOS {
            return JpegInfo::default();
        }
        if is_standalone(marker) {
            continue;
        }

        if data.len() < 2 {
            return JpegInfo::default();
        }
        let length = u16::from_be_bytes([data[0], data[1]]) as usize;
        if length < 2 || data.len() < length {
            return JpegInfo::default();
        }

        if is_start_of_frame(marker) && length >= 7 {
            // precision(1) height(2) width(2)
            let height = u16::from_be_bytes([data[3], data[4]]);
            let width = u16::from_be_bytes([data[5], data[6]]);
            return JpegInfo {
                width: Some(width),
                height: Some(height),
            };
        }

        data = &data[length..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, APP0 stub, SOF0 for 720x1280, SOS stub, EOI
    fn sample_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]);
        data.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x05, 0x00, 0x02, 0xD0, 0x01, 0x01, 0x11, 0x00,
        ]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_reads_dimensions() {
        let info = validate(&sample_jpeg()).unwrap();
        assert_eq!(info.width, Some(720));
        assert_eq!(info.height, Some(1280));
    }

    #[test]
    fn test_minimal_jpeg_has_no_dimensions() {
        let info = validate(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        assert_eq!(info, JpegInfo::default());
    }

    #[test]
    fn test_trailing_zero_padding_accepted() {
        let mut data = sample_jpeg();
        data.extend_from_slice(&[0; 32]);
        assert!(validate(&data).is_ok());
    }

    #[test]
    fn test_trailer_after_eoi_accepted() {
        let mut data = sample_jpeg();
        data.extend_from_slice(b"\x00\x00SEFT vendor trailer");
        let info = validate(&data).unwrap();
        assert_eq!(info.width, Some(720));
    }

    #[test]
    fn test_missing_soi() {
        let err = validate(b"GIF89a-not-a-jpeg").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::NotJpeg {
                reason: "missing SOI marker"
            }
        ));
    }

    #[test]
    fn test_truncated_image() {
        let mut data = sample_jpeg();
        data.truncate(data.len() - 2);
        let err = validate(&data).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::NotJpeg {
                reason: "missing EOI marker"
            }
        ));
    }

    #[test]
    fn test_too_short() {
        assert!(validate(&[0xFF, 0xD8]).is_err());
        assert!(validate(&[]).is_err());
    }

    #[test]
    fn test_skips_dht_segment() {
        let mut data = vec![0xFF, 0xD8];
        // DHT (0xC4) must not be mistaken for a frame header
        data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x07, 0x00, 0x11, 0x22, 0x33, 0x44]);
        data.extend_from_slice(&[
            0xFF, 0xC2, 0x00, 0x0B, 0x08, 0x00, 0x10, 0x00, 0x20, 0x01, 0x01, 0x11, 0x00,
        ]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let info = validate(&data).unwrap();
        assert_eq!(info.width, Some(32));
        assert_eq!(info.height, Some(16));
    }

    #[test]
    fn test_malformed_segment_is_not_fatal() {
        let data = [0xFF, 0xD8, 0xFF, 0xE1, 0x40, 0x00, 0xFF, 0xD9];
        assert_eq!(validate(&data).unwrap(), JpegInfo::default());
    }
}
