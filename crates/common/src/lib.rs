//! Common utilities for jpeg-usb-send
//!
//! This crate provides the pieces shared between the sender binary and its
//! tests: the error type, logging setup, and USB identifier parsing.

pub mod error;
pub mod logging;
pub mod usb_types;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use usb_types::UsbId;
