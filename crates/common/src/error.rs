//! Common error types

use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("No USB device with ID {vendor_id:04x}:{product_id:04x} found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("No bulk OUT endpoint on interface {interface} (alt setting {alt_setting})")]
    EndpointNotFound { interface: u8, alt_setting: u8 },

    #[error("Incomplete transfer: wrote {written} of {expected} bytes")]
    IncompleteTransfer { written: usize, expected: usize },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
