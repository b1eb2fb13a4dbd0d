//! Sender configuration management

use anyhow::{Context, Result, anyhow};
use common::UsbId;
use protocol::{DEVICE_BUFFER_SIZE, HEADER_LEN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Espressif vendor ID used by the display firmware
pub const DEFAULT_VENDOR_ID: u16 = 0x303a;

/// Product ID of the JPEG stream firmware
pub const DEFAULT_PRODUCT_ID: u16 = 0x4020;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub sender: SenderSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderSettings {
    #[serde(default = "SenderSettings::default_log_level")]
    pub log_level: String,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl SenderSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// Which device to open and how to claim it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Target device (VID:PID, e.g. "0x303a:0x4020")
    #[serde(default = "DeviceSettings::default_id")]
    pub id: UsbId,
    /// Configuration value to make active
    #[serde(default = "DeviceSettings::default_configuration")]
    pub configuration: u8,
    /// Interface carrying the JPEG stream
    #[serde(default)]
    pub interface: u8,
    /// Alternate setting of that interface
    #[serde(default)]
    pub alt_setting: u8,
    /// Bulk OUT endpoint address; looked up from descriptors when unset
    #[serde(default)]
    pub endpoint: Option<u8>,
    /// Detach a bound kernel driver before claiming the interface
    #[serde(default = "DeviceSettings::default_detach")]
    pub detach_kernel_driver: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            id: Self::default_id(),
            configuration: Self::default_configuration(),
            interface: 0,
            alt_setting: 0,
            endpoint: None,
            detach_kernel_driver: Self::default_detach(),
        }
    }
}

impl DeviceSettings {
    fn default_id() -> UsbId {
        UsbId::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID)
    }

    fn default_configuration() -> u8 {
        1
    }

    fn default_detach() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Bulk write timeout in milliseconds
    #[serde(default = "TransferSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest frame (header included) the device can buffer
    #[serde(default = "TransferSettings::default_max_frame_size")]
    pub max_frame_size: usize,
    /// Reject payloads that do not look like JPEG images
    #[serde(default = "TransferSettings::default_validate")]
    pub validate_jpeg: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            max_frame_size: Self::default_max_frame_size(),
            validate_jpeg: Self::default_validate(),
        }
    }
}

impl TransferSettings {
    fn default_timeout_ms() -> u64 {
        1000
    }

    fn default_max_frame_size() -> usize {
        DEVICE_BUFFER_SIZE
    }

    fn default_validate() -> bool {
        true
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SenderConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the standard locations are tried in order and the
    /// first existing file is used.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => Self::find_config_file(&Self::candidate_paths())
                .ok_or_else(|| anyhow!("No configuration file found"))?,
        };

        Self::load_file(&config_path)
    }

    /// Load the first existing standard config file, or defaults if none exists
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first_existing(&Self::candidate_paths())
    }

    fn load_first_existing(candidates: &[PathBuf]) -> Result<Self> {
        match Self::find_config_file(candidates) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Standard locations, most specific first
    fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/jpeg-usb-send/sender.toml"),
        ]
    }

    fn find_config_file(candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.iter().find(|p| p.exists()).cloned()
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: SenderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("jpeg-usb-send").join("sender.toml")
        } else {
            PathBuf::from(".config/jpeg-usb-send/sender.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.sender.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.sender.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.transfer.timeout_ms == 0 {
            return Err(anyhow!("Transfer timeout must be greater than 0"));
        }

        let max = self.transfer.max_frame_size;
        if max <= HEADER_LEN || max > u32::MAX as usize {
            return Err(anyhow!(
                "Invalid max_frame_size {}, must be between {} and {}",
                max,
                HEADER_LEN + 1,
                u32::MAX
            ));
        }

        if let Some(endpoint) = self.device.endpoint {
            Self::validate_out_endpoint(endpoint)?;
        }

        Ok(())
    }

    /// An OUT endpoint has bit 7 clear and is never the control endpoint
    fn validate_out_endpoint(endpoint: u8) -> Result<()> {
        if endpoint & 0x80 != 0 {
            return Err(anyhow!(
                "Endpoint {:#04x} is an IN endpoint, expected a bulk OUT endpoint",
                endpoint
            ));
        }
        if endpoint == 0 {
            return Err(anyhow!("Endpoint 0 is the control endpoint"));
        }
        Ok(())
    }
}

/// Expand `~` in user-supplied paths
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Parse an endpoint address given as decimal or `0x` hex
pub fn parse_endpoint(s: &str) -> Result<u8> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse::<u8>()
    };
    parsed.map_err(|_| anyhow!("Invalid endpoint address '{}'", s))
}
