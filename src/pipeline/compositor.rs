//! Display compositing: background blur, overlay merge, crop to the smoothed
//! region, aspect-ratio padding and the final resize.

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::error::PipelineError;
use crate::frame::Frame;
use crate::geometry::Region;
use crate::mask::BlurMask;
use crate::pipeline::state::Layers;

/// Sigma of the Gaussian that a 15x15 kernel derives from its size.
pub const DEFAULT_BLUR_SIGMA: f32 = 2.6;

#[derive(Clone, Debug)]
pub struct Compositor {
    output_width: u32,
    output_height: u32,
    blur_sigma: f32,
}

impl Compositor {
    pub fn new(output_width: u32, output_height: u32, blur_sigma: f32) -> Self {
        Self {
            output_width,
            output_height,
            blur_sigma,
        }
    }

    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }

    /// Compose one display frame.
    ///
    /// Without layers (no detection cycle has finished yet) the raw frame is
    /// shown uncropped. A degenerate region falls back to the full frame.
    /// Layers or a region that do not match the frame fail with
    /// `PipelineError::SizeMismatch`.
    pub fn compose(&self, frame: &Frame, layers: Option<&Layers>, region: &Region) -> Result<Frame> {
        let dims = frame.dimensions();
        let Some(layers) = layers else {
            let full = frame.full_region();
            return Ok(Frame::from_image(self.finish(frame.image(), &full)));
        };

        if layers.dimensions() != dims || layers.mask.dimensions() != dims {
            return Err(PipelineError::SizeMismatch {
                expected: dims,
                actual: layers.dimensions(),
            }
            .into());
        }
        if !region.fits_within(dims.0, dims.1) {
            let e = region.edges();
            return Err(PipelineError::SizeMismatch {
                expected: dims,
                actual: (e.right as u32, e.bottom as u32),
            }
            .into());
        }

        let region = if region.is_degenerate() {
            log::debug!(
                "{}",
                PipelineError::GeometryDegenerate {
                    width: region.width(),
                    height: region.height()
                }
            );
            frame.full_region()
        } else {
            *region
        };

        let mut composed = blur_background(frame.image(), &layers.mask, self.blur_sigma);
        merge_overlay(&mut composed, &layers.overlay);
        Ok(Frame::from_image(self.finish(&composed, &region)))
    }

    fn finish(&self, image: &RgbImage, region: &Region) -> RgbImage {
        let cropped = crop(image, region);
        let ratio = self.output_width as f64 / self.output_height.max(1) as f64;
        let padded = pad_aspect_ratio(&cropped, ratio);
        resize_exact(&padded, self.output_width, self.output_height)
    }
}

/// Blur `image` everywhere the mask says so and keep the rest sharp.
pub fn blur_background(image: &RgbImage, mask: &BlurMask, sigma: f32) -> RgbImage {
    if sigma.is_nan() || sigma <= 0.0 {
        return image.clone();
    }
    let blurred = gaussian_blur_f32(image, sigma);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.is_blur(x, y) {
            *blurred.get_pixel(x, y)
        } else {
            *image.get_pixel(x, y)
        }
    })
}

/// Bitwise-OR the overlay into `image`. Black overlay pixels leave the
/// image untouched.
pub fn merge_overlay(image: &mut RgbImage, overlay: &RgbImage) {
    for (dst, src) in image.pixels_mut().zip(overlay.pixels()) {
        let Rgb([r, g, b]) = *src;
        dst.0[0] |= r;
        dst.0[1] |= g;
        dst.0[2] |= b;
    }
}

pub fn crop(image: &RgbImage, region: &Region) -> RgbImage {
    imageops::crop_imm(image, region.x(), region.y(), region.width(), region.height()).to_image()
}

/// Add symmetric black borders so the image matches `ratio` (width/height).
/// Wider than the target pads top and bottom, otherwise left and right. The
/// border on each side never exceeds the opposite dimension.
pub fn pad_aspect_ratio(image: &RgbImage, ratio: f64) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || ratio.is_nan() || ratio <= 0.0 {
        return image.clone();
    }
    let (wf, hf) = (w as f64, h as f64);
    if wf / hf > ratio {
        let pad = ((wf / ratio - hf) / 2.0).clamp(0.0, hf) as u32;
        let mut canvas = RgbImage::new(w, h + 2 * pad);
        imageops::replace(&mut canvas, image, 0, pad as i64);
        canvas
    } else {
        let pad = ((hf * ratio - wf) / 2.0).clamp(0.0, wf) as u32;
        let mut canvas = RgbImage::new(w + 2 * pad, h);
        imageops::replace(&mut canvas, image, pad as i64, 0);
        canvas
    }
}

/// Resize to exactly `width` x `height`, ignoring the source aspect ratio.
pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    if image.width() == 0 || image.height() == 0 {
        return RgbImage::new(width, height);
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}
