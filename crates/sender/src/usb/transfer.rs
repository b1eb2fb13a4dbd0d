//! Bulk OUT transfer execution
//!
//! Frames are handed to libusb in a single bulk write. libusb splits the
//! buffer into max-packet-size packets itself; a short return value only
//! happens when the device stops accepting data mid-frame, in which case the
//! remainder is written again until the frame is complete.

use crate::usb::device::TargetDevice;
use common::{Error, Result};
use rusb::{DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can perform a bulk OUT write
pub trait BulkOut {
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize>;
}

impl<T: UsbContext> BulkOut for DeviceHandle<T> {
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::write_bulk(self, endpoint, buf, timeout)
    }
}

impl BulkOut for TargetDevice {
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle().write_bulk(endpoint, buf, timeout)
    }
}

/// Write a complete frame to a bulk OUT endpoint
///
/// Returns the number of bytes written, which always equals `frame.len()`
/// on success. USB errors are returned as-is; nothing is retried.
pub fn send_frame<B: BulkOut + ?Sized>(
    out: &B,
    endpoint: u8,
    frame: &[u8],
    timeout: Duration,
) -> Result<usize> {
    debug!(
        "Bulk transfer: endpoint={:#x}, data_len={}, timeout={}ms",
        endpoint,
        frame.len(),
        timeout.as_millis()
    );

    let mut written = 0;
    while written < frame.len() {
        let len = out
            .write_bulk(endpoint, &frame[written..], timeout)
            .map_err(|e| {
                warn!(
                    "Bulk transfer failed after {} of {} bytes: {}",
                    written,
                    frame.len(),
                    e
                );
                Error::Usb(e)
            })?;

        if len == 0 {
            return Err(Error::IncompleteTransfer {
                written,
                expected: frame.len(),
            });
        }

        written += len;
        if written < frame.len() {
            debug!("Short bulk write: {} of {} bytes", written, frame.len());
        }
    }

    debug!("Bulk transfer succeeded: {} bytes", written);
    Ok(written)
}
