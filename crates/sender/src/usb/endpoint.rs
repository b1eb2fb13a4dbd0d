//! Bulk OUT endpoint resolution
//!
//! The display firmware exposes one vendor interface with a bulk OUT/IN pair.
//! The OUT endpoint is looked up from the interface descriptor rather than
//! hard-coded, so firmware builds that renumber endpoints keep working.

use crate::config::DeviceSettings;
use common::{Error, Result};
use rusb::{ConfigDescriptor, Device, TransferType, UsbContext};
use tracing::debug;

/// Endpoint descriptor fields needed for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
}

impl EndpointInfo {
    /// Bit 7 of the address is set for IN (device to host) endpoints
    pub fn is_out(&self) -> bool {
        (self.address & 0x80) == 0
    }
}

/// The endpoint frames are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkEndpoint {
    pub address: u8,
    pub interface: u8,
    pub alt_setting: u8,
    /// Unknown when the address came from configuration
    pub max_packet_size: Option<u16>,
}

/// Pick the first bulk OUT endpoint from an interface's endpoint list
pub fn select_bulk_out(
    interface: u8,
    alt_setting: u8,
    endpoints: &[EndpointInfo],
) -> Result<BulkEndpoint> {
    endpoints
        .iter()
        .find(|ep| ep.is_out() && ep.transfer_type == TransferType::Bulk)
        .map(|ep| BulkEndpoint {
            address: ep.address,
            interface,
            alt_setting,
            max_packet_size: Some(ep.max_packet_size),
        })
        .ok_or(Error::EndpointNotFound {
            interface,
            alt_setting,
        })
}

/// Resolve the bulk OUT endpoint for the configured interface
///
/// A configured endpoint address short-circuits the descriptor lookup.
pub fn resolve_bulk_out<T: UsbContext>(
    device: &Device<T>,
    settings: &DeviceSettings,
) -> Result<BulkEndpoint> {
    if let Some(address) = settings.endpoint {
        debug!("Using configured endpoint {:#04x}", address);
        return Ok(BulkEndpoint {
            address,
            interface: settings.interface,
            alt_setting: settings.alt_setting,
            max_packet_size: None,
        });
    }

    let config = find_config_descriptor(device, settings.configuration)?;
    let endpoints = interface_endpoints(&config, settings.interface, settings.alt_setting);
    debug!(
        "Interface {} alt {} endpoints: {:?}",
        settings.interface, settings.alt_setting, endpoints
    );

    let endpoint = select_bulk_out(settings.interface, settings.alt_setting, &endpoints)?;
    debug!(
        "Resolved bulk OUT endpoint {:#04x} (max packet {:?})",
        endpoint.address, endpoint.max_packet_size
    );
    Ok(endpoint)
}

/// Find the descriptor for the given configuration value
///
/// The active configuration is checked first; otherwise every configuration
/// the device reports is searched.
fn find_config_descriptor<T: UsbContext>(
    device: &Device<T>,
    configuration: u8,
) -> Result<ConfigDescriptor> {
    if let Ok(active) = device.active_config_descriptor() {
        if active.number() == configuration {
            return Ok(active);
        }
    }

    let num_configurations = device.device_descriptor()?.num_configurations();
    for index in 0..num_configurations {
        let config = device.config_descriptor(index)?;
        if config.number() == configuration {
            return Ok(config);
        }
    }

    Err(Error::Config(format!(
        "Device has no configuration {}",
        configuration
    )))
}

/// Collect endpoint info for one interface alternate setting
fn interface_endpoints(
    config: &ConfigDescriptor,
    interface: u8,
    alt_setting: u8,
) -> Vec<EndpointInfo> {
    let mut endpoints = Vec::new();
    for iface in config.interfaces() {
        if iface.number() != interface {
            continue;
        }
        for desc in iface.descriptors() {
            if desc.setting_number() != alt_setting {
                continue;
            }
            endpoints.extend(desc.endpoint_descriptors().map(|ep| EndpointInfo {
                address: ep.address(),
                transfer_type: ep.transfer_type(),
                max_packet_size: ep.max_packet_size(),
            }));
        }
    }
    endpoints
}
