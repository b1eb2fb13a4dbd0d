//! Send loop
//!
//! Reads each scheduled image, frames it and writes it to the resolved bulk
//! OUT endpoint, one frame at a time.

use crate::config::TransferSettings;
use crate::source::{ImageSource, Repeat, prepare_frame};
use crate::stats::{StatsReport, TransferStats};
use crate::usb::{BulkEndpoint, BulkOut, send_frame};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often a pause between frames checks for a stop request
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Session<'a, B: BulkOut + ?Sized> {
    out: &'a B,
    endpoint: BulkEndpoint,
    settings: &'a TransferSettings,
    stats: TransferStats,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a, B: BulkOut + ?Sized> Session<'a, B> {
    pub fn new(out: &'a B, endpoint: BulkEndpoint, settings: &'a TransferSettings) -> Self {
        Self {
            out,
            endpoint,
            settings,
            stats: TransferStats::default(),
            stop: None,
        }
    }

    /// Stop `run` before the next frame once `stop` is set
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::SeqCst))
    }

    /// Sleep for `interval`, waking early on a stop request
    fn pause(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        while !self.stop_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }

    /// Frame and send one image, returning the bytes put on the wire
    pub fn send_image(&mut self, image: &[u8]) -> common::Result<usize> {
        let frame = prepare_frame(image, self.settings)?;
        let written = send_frame(
            self.out,
            self.endpoint.address,
            &frame,
            self.settings.timeout(),
        )?;

        if let Some(report) = self.stats.record(written) {
            info!(
                "USB Tx: {:.1}fps, {:.0}kB/s",
                report.fps(),
                report.kbps()
            );
        }
        Ok(written)
    }

    /// Read an image file and send it
    pub fn send_file(&mut self, path: &Path) -> common::Result<usize> {
        let image = ImageSource::read(path)?;
        let written = self.send_image(&image)?;
        debug!(
            "Sent {} ({} bytes) to endpoint {:#04x}",
            path.display(),
            written,
            self.endpoint.address
        );
        Ok(written)
    }

    /// Send every scheduled image, pausing `interval` between frames
    ///
    /// Stops at the first failure, or cleanly between frames when the stop
    /// flag is set. The summary covers the frames sent so far.
    pub fn run(
        &mut self,
        source: &ImageSource,
        repeat: Repeat,
        interval: Duration,
    ) -> anyhow::Result<StatsReport> {
        for (index, path) in source.schedule(repeat).enumerate() {
            if index > 0 && !interval.is_zero() {
                self.pause(interval);
            }
            if self.stop_requested() {
                info!("Stop requested, {} frame(s) sent", index);
                break;
            }
            self.send_file(path)
                .with_context(|| format!("Failed to send {}", path.display()))?;
        }
        Ok(self.stats.summary())
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }
}
