//! Overlay rendering.
//!
//! The overlay is a black image the size of the frame with person boxes,
//! their captions and the inference-time banner drawn on it. The compositor
//! ORs it onto the blurred frame, so anything left black is transparent.

use std::path::Path;
use std::time::Duration;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::geometry::Region;

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 178, 50]);
pub const LABEL_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
pub const LABEL_TEXT: Rgb<u8> = Rgb([0, 0, 0]);
pub const BANNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const BOX_THICKNESS: u32 = 3;
const LABEL_SCALE: f32 = 14.0;
const BANNER_Y: i32 = 15;
/// Label box size used when no font is loaded.
const FALLBACK_LABEL: (u32, u32) = (48, 12);

#[derive(Clone, Default)]
pub struct OverlayPainter {
    font: Option<FontArc>,
}

impl OverlayPainter {
    /// Painter that draws boxes and label backgrounds but no text.
    pub fn new() -> Self {
        Self { font: None }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// Load a TrueType/OpenType font for captions.
    pub fn from_font_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("{} is not a usable font", path.display()))?;
        Ok(Self::with_font(font))
    }

    /// Blank overlay for a `width` x `height` frame.
    pub fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    /// Draw one detection: its box (clamped to the overlay) and caption.
    pub fn draw_detection(&self, overlay: &mut RgbImage, detection: &Detection) {
        let region = Region::clamped(&detection.bbox, overlay.width(), overlay.height());
        if region.is_degenerate() {
            return;
        }
        for inset in 0..BOX_THICKNESS {
            let w = region.width().saturating_sub(2 * inset);
            let h = region.height().saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            draw_hollow_rect_mut(
                overlay,
                Rect::at((region.x() + inset) as i32, (region.y() + inset) as i32).of_size(w, h),
                BOX_COLOR,
            );
        }
        self.draw_caption(overlay, region.x() as i32, region.y() as i32, &detection.caption());
    }

    fn draw_caption(&self, overlay: &mut RgbImage, left: i32, top: i32, caption: &str) {
        let scale = PxScale::from(LABEL_SCALE);
        let (label_w, label_h) = match &self.font {
            Some(font) => {
                let (w, h) = text_size(scale, font, caption);
                (w.max(1), h.max(1))
            }
            None => FALLBACK_LABEL,
        };
        // The caption sits above the box, but never above the top edge.
        let top = top.max(label_h as i32);
        draw_filled_rect_mut(
            overlay,
            Rect::at(left, top - label_h as i32).of_size(label_w, label_h),
            LABEL_BACKGROUND,
        );
        if let Some(font) = &self.font {
            draw_text_mut(overlay, LABEL_TEXT, left, top - label_h as i32, scale, font, caption);
        }
    }

    /// Draw the "Inference time for a frame" banner at the top-left.
    pub fn draw_banner(&self, overlay: &mut RgbImage, inference: Duration) {
        let text = banner_text(inference);
        match &self.font {
            Some(font) => {
                draw_text_mut(overlay, BANNER_COLOR, 0, BANNER_Y, PxScale::from(LABEL_SCALE), font, &text);
            }
            None => {
                let width = overlay.width().min(160);
                if width > 0 && overlay.height() > BANNER_Y as u32 {
                    draw_filled_rect_mut(
                        overlay,
                        Rect::at(0, BANNER_Y).of_size(width, 2),
                        BANNER_COLOR,
                    );
                }
            }
        }
    }
}

pub fn banner_text(inference: Duration) -> String {
    format!(
        "Inference time for a frame : {:.2} ms",
        inference.as_secs_f64() * 1000.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    #[test]
    fn banner_formats_milliseconds() {
        assert_eq!(
            banner_text(Duration::from_micros(12_345)),
            "Inference time for a frame : 12.35 ms"
        );
    }

    #[test]
    fn box_outline_is_drawn_inside_the_detection() {
        let painter = OverlayPainter::new();
        let mut overlay = OverlayPainter::blank(200, 200);
        let det = Detection::new("person", 0.9, BoundingBox::new(50, 60, 40, 80));
        painter.draw_detection(&mut overlay, &det);

        assert_eq!(*overlay.get_pixel(50, 100), BOX_COLOR);
        assert_eq!(*overlay.get_pixel(52, 100), BOX_COLOR);
        assert_eq!(*overlay.get_pixel(89, 100), BOX_COLOR);
        // Interior stays transparent.
        assert_eq!(overlay.get_pixel(70, 100).0, [0, 0, 0]);
        // Label background above the box.
        assert_eq!(*overlay.get_pixel(52, 55), LABEL_BACKGROUND);
    }

    #[test]
    fn label_is_pushed_down_at_top_edge() {
        let painter = OverlayPainter::new();
        let mut overlay = OverlayPainter::blank(100, 100);
        let det = Detection::new("person", 0.5, BoundingBox::new(10, 0, 30, 30));
        painter.draw_detection(&mut overlay, &det);
        assert_eq!(*overlay.get_pixel(12, 5), LABEL_BACKGROUND);
    }

    #[test]
    fn detection_outside_overlay_draws_nothing() {
        let painter = OverlayPainter::new();
        let mut overlay = OverlayPainter::blank(50, 50);
        let det = Detection::new("person", 0.9, BoundingBox::new(80, 80, 10, 10));
        painter.draw_detection(&mut overlay, &det);
        assert!(overlay.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn banner_without_font_draws_marker_strip() {
        let painter = OverlayPainter::new();
        let mut overlay = OverlayPainter::blank(320, 240);
        painter.draw_banner(&mut overlay, Duration::from_millis(5));
        assert_eq!(*overlay.get_pixel(0, BANNER_Y as u32), BANNER_COLOR);
    }
}
