//! USB identifier types

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Vendor/product ID pair identifying a USB device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Check a device descriptor's IDs against this pair
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }

    /// Parse one side of a `VID:PID` pair
    fn parse_hex_id(id: &str, name: &str) -> Result<u16, Error> {
        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .unwrap_or(id);

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(Error::Config(format!(
                "Invalid {} '{}', hex part must be 1-4 digits",
                name, id
            )));
        }

        u16::from_str_radix(hex_part, 16)
            .map_err(|_| Error::Config(format!("Invalid {} '{}', not a valid hex number", name, id)))
    }
}

impl FromStr for UsbId {
    type Err = Error;

    /// Accepts `0x303a:0x4020` or `303a:4020`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vid, pid) = s.trim().split_once(':').ok_or_else(|| {
            Error::Config(format!(
                "Invalid device ID '{}', expected VID:PID (e.g., '0x303a:0x4020')",
                s
            ))
        })?;

        Ok(Self {
            vendor_id: Self::parse_hex_id(vid, "VID")?,
            product_id: Self::parse_hex_id(pid, "PID")?,
        })
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl Serialize for UsbId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:04x}:0x{:04x}", self.vendor_id, self.product_id))
    }
}

impl<'de> Deserialize<'de> for UsbId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        let id: UsbId = "0x303a:0x4020".parse().unwrap();
        assert_eq!(id, UsbId::new(0x303a, 0x4020));
    }

    #[test]
    fn test_parse_without_prefix() {
        let id: UsbId = "303A:4020".parse().unwrap();
        assert_eq!(id, UsbId::new(0x303a, 0x4020));
    }

    #[test]
    fn test_parse_short_hex() {
        let id: UsbId = "0x1:0x2".parse().unwrap();
        assert_eq!(id, UsbId::new(1, 2));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("0x303a".parse::<UsbId>().is_err());
        assert!("0x303a:".parse::<UsbId>().is_err());
        assert!(":0x4020".parse::<UsbId>().is_err());
        assert!("0x12345:0x4020".parse::<UsbId>().is_err());
        assert!("0xGHIJ:0x4020".parse::<UsbId>().is_err());
        assert!("0x303a:0x4020:0x1".parse::<UsbId>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(UsbId::new(0x303a, 0x4020).to_string(), "303a:4020");
    }

    #[test]
    fn test_matches() {
        let id = UsbId::new(0x303a, 0x4020);
        assert!(id.matches(0x303a, 0x4020));
        assert!(!id.matches(0x303a, 0x4021));
    }
}
