//! Image sources and frame preparation

use crate::config::{TransferSettings, expand_path};
use common::Result;
use protocol::{encode_frame, jpeg};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image sent when no path is given on the command line
pub const DEFAULT_IMAGE: &str = "image.jpg";

/// How many times to walk the image list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Times(u32),
    Forever,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Times(1)
    }
}

/// Ordered list of image files to send
#[derive(Debug, Clone)]
pub struct ImageSource {
    paths: Vec<PathBuf>,
}

impl ImageSource {
    /// Build a source from user-supplied paths (`~` is expanded)
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let paths = if paths.is_empty() {
            vec![PathBuf::from(DEFAULT_IMAGE)]
        } else {
            paths.iter().map(|p| expand_path(p)).collect()
        };
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Paths in send order, cycling as `repeat` requires
    pub fn schedule(&self, repeat: Repeat) -> Box<dyn Iterator<Item = &Path> + '_> {
        let once = move || self.paths.iter().map(PathBuf::as_path);
        match repeat {
            Repeat::Times(n) => Box::new((0..n).flat_map(move |_| once())),
            Repeat::Forever => Box::new(once().cycle()),
        }
    }

    /// Read one image file
    pub fn read(path: &Path) -> Result<Vec<u8>> {
        let data = fs::read(path)?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }
}

/// Turn raw image bytes into a frame ready for the bulk pipe
pub fn prepare_frame(image: &[u8], settings: &TransferSettings) -> Result<Vec<u8>> {
    if settings.validate_jpeg {
        let info = jpeg::validate(image)?;
        if let (Some(width), Some(height)) = (info.width, info.height) {
            debug!("JPEG {}x{}, {} bytes", width, height, image.len());
        }
    }

    Ok(encode_frame(image, settings.max_frame_size)?)
}
