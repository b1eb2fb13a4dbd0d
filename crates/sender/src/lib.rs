//! jpeg-usb-send
//!
//! Pushes JPEG images to a USB display board over a vendor bulk pipe. Each
//! image is prefixed with its little-endian total length and written to the
//! board's bulk OUT endpoint in one transfer.

pub mod config;
pub mod session;
pub mod source;
pub mod stats;
pub mod usb;

pub use config::SenderConfig;
pub use session::Session;
pub use source::{ImageSource, Repeat};
