use image::{GrayImage, Luma};

use crate::geometry::Region;

pub const BLUR: u8 = 1;
pub const KEEP: u8 = 0;

/// Single-channel mask the size of a frame: `BLUR` pixels receive the
/// background blur, `KEEP` pixels stay sharp.
#[derive(Clone, Debug)]
pub struct BlurMask {
    mask: GrayImage,
}

impl BlurMask {
    /// Everything blurred.
    pub fn all_blur(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::from_pixel(width, height, Luma([BLUR])),
        }
    }

    /// Mark `region` as sharp. The region must have been clamped to this
    /// mask's dimensions.
    pub fn keep_sharp(&mut self, region: &Region) {
        let right = (region.x() + region.width()).min(self.mask.width());
        let bottom = (region.y() + region.height()).min(self.mask.height());
        for y in region.y()..bottom {
            for x in region.x()..right {
                self.mask.put_pixel(x, y, Luma([KEEP]));
            }
        }
    }

    pub fn is_blur(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] == BLUR
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    /// Number of sharp pixels.
    pub fn kept_pixels(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] == KEEP).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    #[test]
    fn new_mask_blurs_everything() {
        let mask = BlurMask::all_blur(8, 6);
        assert_eq!(mask.dimensions(), (8, 6));
        assert_eq!(mask.kept_pixels(), 0);
        assert!(mask.is_blur(7, 5));
    }

    #[test]
    fn keep_sharp_clears_exact_rectangle() {
        let mut mask = BlurMask::all_blur(10, 10);
        mask.keep_sharp(&Region::clamped(&BoundingBox::new(2, 3, 4, 5), 10, 10));
        assert_eq!(mask.kept_pixels(), 20);
        assert!(!mask.is_blur(2, 3));
        assert!(!mask.is_blur(5, 7));
        assert!(mask.is_blur(6, 7));
        assert!(mask.is_blur(5, 8));
        assert!(mask.is_blur(1, 3));
    }

    #[test]
    fn overlapping_regions_stay_sharp() {
        let mut mask = BlurMask::all_blur(10, 10);
        mask.keep_sharp(&Region::clamped(&BoundingBox::new(0, 0, 5, 5), 10, 10));
        mask.keep_sharp(&Region::clamped(&BoundingBox::new(3, 3, 5, 5), 10, 10));
        assert_eq!(mask.kept_pixels(), 25 + 25 - 4);
    }
}
