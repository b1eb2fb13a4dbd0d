//! Target device discovery and interface claiming
//!
//! This module finds the display board by VID:PID, takes the JPEG stream
//! interface away from any kernel driver, and hands it back on drop.

use crate::config::DeviceSettings;
use common::{Error, Result, UsbId};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, UsbContext};
use tracing::{debug, info, warn};

/// Handle operations used to take an interface from the kernel and give it
/// back
pub trait InterfaceControl {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()>;
    fn attach_kernel_driver(&self, interface: u8) -> rusb::Result<()>;
    fn active_configuration(&self) -> rusb::Result<u8>;
    fn set_active_configuration(&self, configuration: u8) -> rusb::Result<()>;
    fn release_interface(&self, interface: u8) -> rusb::Result<()>;
}

impl<T: UsbContext> InterfaceControl for DeviceHandle<T> {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn attach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::attach_kernel_driver(self, interface)
    }

    fn active_configuration(&self) -> rusb::Result<u8> {
        DeviceHandle::active_configuration(self)
    }

    fn set_active_configuration(&self, configuration: u8) -> rusb::Result<()> {
        DeviceHandle::set_active_configuration(self, configuration)
    }

    fn release_interface(&self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }
}

/// Summary of an attached USB device, for `--list-devices`
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub id: UsbId,
    pub bus_number: u8,
    pub device_address: u8,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

/// Find the first attached device with the given IDs
pub fn find_device(context: &Context, id: UsbId) -> Result<Device<Context>> {
    let mut matches = Vec::new();
    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(
                    "Skipping device on bus {} address {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };
        if id.matches(descriptor.vendor_id(), descriptor.product_id()) {
            matches.push(device);
        }
    }

    first_match(id, matches, |device| {
        format!("bus {} address {}", device.bus_number(), device.address())
    })
}

/// Take the first of the matching devices, warning when there is a choice
fn first_match<D>(id: UsbId, matches: Vec<D>, describe: impl Fn(&D) -> String) -> Result<D> {
    if matches.len() > 1 {
        warn!(
            "{} devices match {}, using {}",
            matches.len(),
            id,
            describe(&matches[0])
        );
    }

    matches.into_iter().next().ok_or(Error::DeviceNotFound {
        vendor_id: id.vendor_id,
        product_id: id.product_id,
    })
}

/// Enumerate attached devices
///
/// String descriptors are read when the device can be opened; permission
/// errors leave them empty.
pub fn list_devices(context: &Context) -> Result<Vec<DeviceSummary>> {
    let mut summaries = Vec::new();

    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!("Failed to read device descriptor: {}", e);
                continue;
            }
        };

        let strings = device
            .open()
            .ok()
            .map(|handle| read_string_descriptors(&descriptor, &handle));
        let (manufacturer, product, serial_number) = strings.unwrap_or((None, None, None));

        summaries.push(DeviceSummary {
            id: UsbId::new(descriptor.vendor_id(), descriptor.product_id()),
            bus_number: device.bus_number(),
            device_address: device.address(),
            manufacturer,
            product,
            serial_number,
        });
    }

    Ok(summaries)
}

/// Read string descriptors from device
fn read_string_descriptors<T: UsbContext>(
    descriptor: &DeviceDescriptor,
    handle: &DeviceHandle<T>,
) -> (Option<String>, Option<String>, Option<String>) {
    let manufacturer = descriptor
        .manufacturer_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let product = descriptor
        .product_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let serial_number = descriptor
        .serial_number_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    (manufacturer, product, serial_number)
}

/// Open device with the stream interface claimed
///
/// Dropping it releases the interface and reattaches the kernel driver if
/// one was detached on open.
pub struct TargetDevice {
    handle: DeviceHandle<Context>,
    interface: u8,
    kernel_driver_detached: bool,
}

impl TargetDevice {
    /// Open the device and claim the configured interface
    pub fn open(device: &Device<Context>, settings: &DeviceSettings) -> Result<Self> {
        let handle = device.open().map_err(|e| {
            warn!("Failed to open device: {}", e);
            Error::Usb(e)
        })?;
        debug!(
            "Opened device on bus {} address {}",
            device.bus_number(),
            device.address()
        );

        let interface = settings.interface;
        let kernel_driver_detached = settings.detach_kernel_driver
            && detach_kernel_driver(&handle, interface);

        // From here on Drop undoes the detach if a later step fails
        let target = Self {
            handle,
            interface,
            kernel_driver_detached,
        };

        set_configuration(&target.handle, settings.configuration)?;

        target.handle.claim_interface(interface).map_err(|e| {
            warn!("Failed to claim interface {}: {}", interface, e);
            Error::Usb(e)
        })?;
        debug!("Claimed interface {}", interface);

        if settings.alt_setting != 0 {
            target
                .handle
                .set_alternate_setting(interface, settings.alt_setting)?;
            debug!(
                "Selected alternate setting {} on interface {}",
                settings.alt_setting, interface
            );
        }

        info!("Device ready (interface {})", interface);
        Ok(target)
    }

    /// Claimed interface number
    pub fn interface(&self) -> u8 {
        self.interface
    }

    /// Underlying handle, for transfers
    pub fn handle(&self) -> &DeviceHandle<Context> {
        &self.handle
    }
}

impl Drop for TargetDevice {
    fn drop(&mut self) {
        release(&self.handle, self.interface, self.kernel_driver_detached);
    }
}

/// Make `configuration` the active configuration
///
/// Skipped when already active, since re-setting it resets the device's
/// interface state. A busy device keeps its current configuration.
fn set_configuration<H: InterfaceControl + ?Sized>(handle: &H, configuration: u8) -> Result<()> {
    match handle.active_configuration() {
        Ok(active) if active == configuration => {
            debug!("Configuration {} already active", configuration);
            return Ok(());
        }
        Ok(active) => debug!(
            "Switching configuration {} -> {}",
            active, configuration
        ),
        Err(e) => debug!("Could not read active configuration: {}", e),
    }

    match handle.set_active_configuration(configuration) {
        Ok(()) => {
            debug!("Set active configuration {}", configuration);
            Ok(())
        }
        Err(rusb::Error::Busy) => {
            warn!(
                "Device busy, keeping current configuration instead of {}",
                configuration
            );
            Ok(())
        }
        Err(e) => Err(Error::Usb(e)),
    }
}

/// Release `interface` and hand it back to the kernel driver if we took it
fn release<H: InterfaceControl + ?Sized>(handle: &H, interface: u8, reattach_kernel_driver: bool) {
    if let Err(e) = handle.release_interface(interface) {
        debug!("Failed to release interface {}: {}", interface, e);
    }

    if reattach_kernel_driver {
        match handle.attach_kernel_driver(interface) {
            Ok(()) => debug!("Reattached kernel driver to interface {}", interface),
            Err(e) => warn!(
                "Could not reattach kernel driver to interface {}: {}",
                interface, e
            ),
        }
    }
}

/// Detach the kernel driver from `interface` if one is bound
///
/// Returns whether a driver was detached. Failures are logged and left for
/// the interface claim to report.
fn detach_kernel_driver<H: InterfaceControl + ?Sized>(handle: &H, interface: u8) -> bool {
    match handle.kernel_driver_active(interface) {
        Ok(true) => {
            debug!("Detaching kernel driver from interface {}", interface);
            match handle.detach_kernel_driver(interface) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    );
                    false
                }
            }
        }
        Ok(false) => {
            debug!("No kernel driver active on interface {}", interface);
            false
        }
        Err(e) => {
            // NotSupported on platforms without kernel driver control
            debug!(
                "Could not check kernel driver status for interface {}: {}",
                interface, e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Scripted handle that records every call made on it
    struct MockHandle {
        driver_active: rusb::Result<bool>,
        detach_result: rusb::Result<()>,
        active_configuration: rusb::Result<u8>,
        set_configuration_result: rusb::Result<()>,
        calls: RefCell<Vec<String>>,
    }

    impl Default for MockHandle {
        fn default() -> Self {
            Self {
                driver_active: Ok(false),
                detach_result: Ok(()),
                active_configuration: Ok(1),
                set_configuration_result: Ok(()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl MockHandle {
        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn called(&self, name: &str) -> bool {
            self.calls.borrow().iter().any(|c| c.starts_with(name))
        }
    }

    impl InterfaceControl for MockHandle {
        fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
            self.record(format!("kernel_driver_active({})", interface));
            self.driver_active
        }

        fn detach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("detach_kernel_driver({})", interface));
            self.detach_result
        }

        fn attach_kernel_driver(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("attach_kernel_driver({})", interface));
            Ok(())
        }

        fn active_configuration(&self) -> rusb::Result<u8> {
            self.record("active_configuration".to_string());
            self.active_configuration
        }

        fn set_active_configuration(&self, configuration: u8) -> rusb::Result<()> {
            self.record(format!("set_active_configuration({})", configuration));
            self.set_configuration_result
        }

        fn release_interface(&self, interface: u8) -> rusb::Result<()> {
            self.record(format!("release_interface({})", interface));
            Ok(())
        }
    }

    #[test]
    fn test_detaches_bound_driver() {
        let handle = MockHandle {
            driver_active: Ok(true),
            ..MockHandle::default()
        };
        assert!(detach_kernel_driver(&handle, 0));
        assert_eq!(
            handle.calls(),
            ["kernel_driver_active(0)", "detach_kernel_driver(0)"]
        );
    }

    #[test]
    fn test_no_driver_nothing_detached() {
        let handle = MockHandle::default();
        assert!(!detach_kernel_driver(&handle, 0));
        assert!(!handle.called("detach_kernel_driver"));
    }

    #[test]
    fn test_driver_query_unsupported() {
        let handle = MockHandle {
            driver_active: Err(rusb::Error::NotSupported),
            ..MockHandle::default()
        };
        assert!(!detach_kernel_driver(&handle, 0));
        assert!(!handle.called("detach_kernel_driver"));
    }

    #[test]
    fn test_failed_detach_is_not_reported_as_detached() {
        let handle = MockHandle {
            driver_active: Ok(true),
            detach_result: Err(rusb::Error::Access),
            ..MockHandle::default()
        };
        assert!(!detach_kernel_driver(&handle, 0));
    }

    #[test]
    fn test_release_reattaches_detached_driver() {
        let handle = MockHandle::default();
        release(&handle, 2, true);
        assert_eq!(
            handle.calls(),
            ["release_interface(2)", "attach_kernel_driver(2)"]
        );
    }

    #[test]
    fn test_release_leaves_driver_alone_when_not_detached() {
        let handle = MockHandle::default();
        release(&handle, 2, false);
        assert_eq!(handle.calls(), ["release_interface(2)"]);
    }

    #[test]
    fn test_active_configuration_not_set_again() {
        let handle = MockHandle::default();
        set_configuration(&handle, 1).unwrap();
        assert!(!handle.called("set_active_configuration"));
    }

    #[test]
    fn test_switches_configuration() {
        let handle = MockHandle {
            active_configuration: Ok(2),
            ..MockHandle::default()
        };
        set_configuration(&handle, 1).unwrap();
        assert!(handle.called("set_active_configuration(1)"));
    }

    #[test]
    fn test_unknown_active_configuration_is_set() {
        let handle = MockHandle {
            active_configuration: Err(rusb::Error::NotFound),
            ..MockHandle::default()
        };
        set_configuration(&handle, 1).unwrap();
        assert!(handle.called("set_active_configuration(1)"));
    }

    #[test]
    fn test_busy_device_keeps_configuration() {
        let handle = MockHandle {
            active_configuration: Ok(0),
            set_configuration_result: Err(rusb::Error::Busy),
            ..MockHandle::default()
        };
        assert!(set_configuration(&handle, 1).is_ok());
    }

    #[test]
    fn test_other_configuration_errors_propagate() {
        let handle = MockHandle {
            active_configuration: Ok(0),
            set_configuration_result: Err(rusb::Error::NoDevice),
            ..MockHandle::default()
        };
        let err = set_configuration(&handle, 1).unwrap_err();
        assert!(matches!(err, Error::Usb(rusb::Error::NoDevice)));
    }

    #[test]
    fn test_first_of_several_matches_used() {
        let id = UsbId::new(0x303a, 0x4020);
        let picked = first_match(id, vec!["bus 1", "bus 3"], |d| d.to_string()).unwrap();
        assert_eq!(picked, "bus 1");
    }

    #[test]
    fn test_no_match_is_device_not_found() {
        let id = UsbId::new(0x303a, 0x4020);
        let err = first_match(id, Vec::<&str>::new(), |d| d.to_string()).unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceNotFound {
                vendor_id: 0x303a,
                product_id: 0x4020
            }
        ));
    }
}
