//! USB subsystem
//!
//! Everything that touches libusb lives here:
//! - Device discovery and listing
//! - Kernel driver detach, configuration and interface claim
//! - Bulk OUT endpoint resolution from descriptors
//! - Bulk transfer execution
//!
//! All calls are blocking; the sender has nothing else to do while a frame
//! is in flight.

pub mod device;
pub mod endpoint;
pub mod transfer;

pub use device::{DeviceSummary, InterfaceControl, TargetDevice, find_device, list_devices};
pub use endpoint::{BulkEndpoint, EndpointInfo, resolve_bulk_out, select_bulk_out};
pub use transfer::{BulkOut, send_frame};
