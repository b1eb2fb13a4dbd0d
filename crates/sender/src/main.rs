//! jpeg-usb-send
//!
//! Sends JPEG images to a USB display board (ESP32-P4 "JPEG Stream" firmware)
//! as length-prefixed frames over a bulk OUT endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use common::{UsbId, setup_logging};
use sender::config::{self, SenderConfig};
use sender::usb::{self, TargetDevice};
use sender::{ImageSource, Repeat, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "jpeg-usb-send")]
#[command(
    author,
    version,
    about = "Send JPEG images to a USB display over a bulk endpoint"
)]
#[command(long_about = "
Sends one or more JPEG images to a USB display board. Each image is
prefixed with a 4-byte little-endian length (image size + 4) and written
to the board's bulk OUT endpoint.

EXAMPLES:
    # Send image.jpg from the current directory
    jpeg-usb-send

    # Send a specific image to a different device
    jpeg-usb-send --device 0x303a:0x4021 photo.jpg

    # Cycle through a slideshow every two seconds until interrupted
    jpeg-usb-send --loop --interval-ms 2000 a.jpg b.jpg c.jpg

    # List USB devices without sending anything
    jpeg-usb-send --list-devices

CONFIGURATION:
    The sender looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/jpeg-usb-send/sender.toml
    3. /etc/jpeg-usb-send/sender.toml
    4. Built-in defaults
")]
struct Args {
    /// JPEG files to send, in order (default: image.jpg)
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Target device as VID:PID
    #[arg(short, long, value_name = "VID:PID")]
    device: Option<UsbId>,

    /// Bulk transfer timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Bulk OUT endpoint address (skips descriptor lookup)
    #[arg(short, long, value_name = "ADDR", value_parser = config::parse_endpoint)]
    endpoint: Option<u8>,

    /// Send files even if they do not look like JPEG images
    #[arg(long)]
    no_validate: bool,

    /// Send the image list this many times
    #[arg(
        short,
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..),
        conflicts_with = "forever"
    )]
    repeat: u32,

    /// Send the image list until interrupted
    #[arg(long = "loop")]
    forever: bool,

    /// Pause between frames in milliseconds
    #[arg(short, long, value_name = "MS", default_value_t = 0)]
    interval_ms: u64,
}

impl Args {
    /// Command line values take precedence over the config file
    fn apply_overrides(&self, config: &mut SenderConfig) {
        if let Some(level) = &self.log_level {
            config.sender.log_level = level.clone();
        }
        if let Some(id) = self.device {
            config.device.id = id;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.transfer.timeout_ms = timeout_ms;
        }
        if let Some(endpoint) = self.endpoint {
            config.device.endpoint = Some(endpoint);
        }
        if self.no_validate {
            config.transfer.validate_jpeg = false;
        }
    }

    fn repeat(&self) -> Repeat {
        if self.forever {
            Repeat::Forever
        } else {
            Repeat::Times(self.repeat)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = SenderConfig::default();
        let path = SenderConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        SenderConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        SenderConfig::load_or_default().context("Failed to load configuration")?
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.sender.log_level).context("Failed to setup logging")?;

    info!("jpeg-usb-send v{}", env!("CARGO_PKG_VERSION"));

    let context = rusb::Context::new().context("Failed to initialize libusb")?;

    if args.list_devices {
        return list_devices_mode(&context);
    }

    let device = usb::find_device(&context, config.device.id)
        .with_context(|| format!("Device {} not found", config.device.id))?;
    info!(
        "Found device {} on bus {:03} address {:03}",
        config.device.id,
        device.bus_number(),
        device.address()
    );

    let target = TargetDevice::open(&device, &config.device).context("Failed to open device")?;
    let endpoint = usb::resolve_bulk_out(&device, &config.device)
        .context("Failed to resolve bulk OUT endpoint")?;
    info!(
        "Using bulk OUT endpoint {:#04x} on interface {}",
        endpoint.address,
        target.interface()
    );

    let stop = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_listener(stop.clone())?;

    let source = ImageSource::new(args.images.clone());
    let mut session =
        Session::new(&target, endpoint, &config.transfer).with_stop_flag(stop);
    let summary = session.run(
        &source,
        args.repeat(),
        Duration::from_millis(args.interval_ms),
    )?;

    info!(
        "Sent {} frame(s), {} bytes in {:.2?}",
        summary.frames, summary.bytes, summary.elapsed
    );
    Ok(())
}

/// Set `stop` on Ctrl+C so the send loop ends between frames and the
/// device is released on the way out
fn spawn_ctrl_c_listener(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?;

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received Ctrl+C, stopping after the current frame...");
                        stop.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        error!("Error waiting for Ctrl+C: {}", e);
                        return;
                    }
                }

                // A second Ctrl+C skips the clean shutdown
                if signal::ctrl_c().await.is_ok() {
                    warn!("Received second Ctrl+C, exiting without releasing the device");
                    std::process::exit(130);
                }
            });
        })
        .context("Failed to spawn Ctrl+C listener")?;

    Ok(())
}

/// List USB devices and exit
fn list_devices_mode(context: &rusb::Context) -> Result<()> {
    info!("Listing USB devices...");

    let devices = usb::list_devices(context).context("Failed to enumerate USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
    } else {
        println!("Found {} USB device(s):\n", devices.len());
        for device in devices {
            println!(
                "  {} - {} {}",
                device.id,
                device
                    .manufacturer
                    .as_deref()
                    .unwrap_or("Unknown Manufacturer"),
                device.product.as_deref().unwrap_or("Unknown Product")
            );
            println!(
                "      Bus {:03} Device {:03}",
                device.bus_number, device.device_address
            );
            if let Some(serial) = &device.serial_number {
                println!("      Serial: {}", serial);
            }
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from([
            "jpeg-usb-send",
            "--device",
            "0x1234:0x5678",
            "--timeout-ms",
            "250",
            "--endpoint",
            "0x02",
            "--no-validate",
            "photo.jpg",
        ]);
        let mut config = SenderConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.device.id, UsbId::new(0x1234, 0x5678));
        assert_eq!(config.transfer.timeout_ms, 250);
        assert_eq!(config.device.endpoint, Some(2));
        assert!(!config.transfer.validate_jpeg);
        assert_eq!(args.images, vec![PathBuf::from("photo.jpg")]);
    }

    #[test]
    fn test_repeat_modes() {
        let args = Args::parse_from(["jpeg-usb-send"]);
        assert_eq!(args.repeat(), Repeat::Times(1));

        let args = Args::parse_from(["jpeg-usb-send", "--repeat", "3"]);
        assert_eq!(args.repeat(), Repeat::Times(3));

        let args = Args::parse_from(["jpeg-usb-send", "--loop"]);
        assert_eq!(args.repeat(), Repeat::Forever);
    }

    #[test]
    fn test_repeat_zero_rejected() {
        assert!(Args::try_parse_from(["jpeg-usb-send", "--repeat", "0"]).is_err());
        assert!(Args::try_parse_from(["jpeg-usb-send", "--repeat", "1"]).is_ok());
    }

    #[test]
    fn test_loop_conflicts_with_repeat() {
        assert!(Args::try_parse_from(["jpeg-usb-send", "--loop", "--repeat", "2"]).is_err());
    }
}
