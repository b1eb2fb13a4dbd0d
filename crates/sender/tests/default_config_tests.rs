//! Loading from the per-user config location
//!
//! Kept in its own test binary because it points `XDG_CONFIG_HOME` at a
//! temporary directory for the whole process.

#![cfg(target_os = "linux")]

use common::UsbId;
use sender::SenderConfig;
use std::fs;

#[test]
fn test_user_config_is_loaded_or_reported() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: this is the only test in the binary, so no other thread reads
    // the environment concurrently.
    unsafe { std::env::set_var("XDG_CONFIG_HOME", dir.path()) };

    let config_dir = dir.path().join("jpeg-usb-send");
    fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("sender.toml");
    assert_eq!(SenderConfig::default_path(), path);

    fs::write(&path, "[device]\nid = \"0x1234:0x5678\"\n").unwrap();
    let config = SenderConfig::load_or_default().unwrap();
    assert_eq!(config.device.id, UsbId::new(0x1234, 0x5678));

    // A broken file must not fall back to the default device
    fs::write(
        &path,
        "[device]\nid = \"0x1234:0x5678\"\n\n[transfer]\ntimeout_ms = \"2s\"\n",
    )
    .unwrap();
    let err = SenderConfig::load_or_default().unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Failed to parse config file"));
    assert!(message.contains("sender.toml"));
}
