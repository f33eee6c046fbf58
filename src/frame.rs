//! Captured frames.
//!
//! A `Frame` is an immutable RGB image shared by reference count. Publishing a
//! frame replaces the previous one wholesale; nothing mutates pixels in place
//! after a frame leaves its source.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::geometry::Region;
use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbImage>,
}

impl Frame {
    pub fn from_image(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Build a frame from a packed pixel buffer, converting to RGB.
    pub fn from_pixels(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let rgb = normalize_to_rgb(pixels, width, height, format)?;
        let image = RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| anyhow!("pixel buffer does not fit {}x{}", width, height))?;
        Ok(Self::from_image(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// A frame with no pixels marks end-of-stream when returned by a source.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn full_region(&self) -> Region {
        Region::full(self.width(), self.height())
    }
}
