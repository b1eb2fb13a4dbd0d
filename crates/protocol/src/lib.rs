//! Wire format for jpeg-usb-send
//!
//! This crate defines the frame layout understood by the display firmware on the
//! receiving end of the bulk pipe, plus a light JPEG sanity check so that
//! obviously broken payloads never reach the device's hardware decoder.
//!
//! # Frame Format
//!
//! ```text
//! [Total length: u32 (little-endian)][JPEG bytes]
//! ```
//!
//! The length counts the header itself, so a 1000-byte image travels as a
//! 1004-byte frame whose first four bytes read `1004`.
//!
//! # Example
//!
//! ```
//! use protocol::{DEVICE_BUFFER_SIZE, decode_frame, encode_frame};
//!
//! let image = [0xFF, 0xD8, 0xFF, 0xD9];
//! let frame = encode_frame(&image, DEVICE_BUFFER_SIZE).unwrap();
//! assert_eq!(&frame[..4], &8u32.to_le_bytes());
//!
//! let payload = decode_frame(&frame).unwrap();
//! assert_eq!(payload, &image);
//! ```

pub mod error;
pub mod frame;
pub mod jpeg;

pub use error::{ProtocolError, Result};
pub use frame::{
    DEVICE_BUFFER_SIZE, FrameHeader, HEADER_LEN, decode_frame, encode_frame, read_frame,
    write_frame,
};
pub use jpeg::JpegInfo;
