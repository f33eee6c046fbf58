//! ROI smoothing.
//!
//! Each tick moves every edge of the displayed region a fraction of the way
//! toward the target. The step is rounded up in magnitude so that any
//! non-zero distance shrinks by at least one pixel per tick, and it is capped
//! at the remaining distance so an edge never overshoots.

use crate::geometry::{Edges, Region};

#[derive(Clone, Debug)]
pub struct RoiSmoother {
    factor: f64,
    width: u32,
    height: u32,
    current: Region,
}

impl RoiSmoother {
    /// `factor` is clamped to `[0, 1]`: 0 never moves, 1 snaps to the target.
    /// The smoothed region starts as the full capture.
    pub fn new(factor: f32, width: u32, height: u32) -> Self {
        let factor = if factor.is_finite() {
            (factor as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            factor,
            width,
            height,
            current: Region::full(width, height),
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn current(&self) -> Region {
        self.current
    }

    /// Capture size the smoothed region is clamped to.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Follow a new capture size. The smoothed region restarts as the full
    /// frame.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.current = Region::full(width, height);
    }

    /// Advance one tick toward `target` and return the new smoothed region.
    pub fn tick(&mut self, target: &Region) -> Region {
        let from = self.current.edges();
        let to = target.edges();
        let next = Edges {
            left: step(from.left, to.left, self.factor),
            top: step(from.top, to.top, self.factor),
            right: step(from.right, to.right, self.factor),
            bottom: step(from.bottom, to.bottom, self.factor),
        };
        self.current = Region::from_edges(next, self.width, self.height);
        self.current
    }
}

fn step(from: i64, to: i64, factor: f64) -> i64 {
    let distance = to - from;
    if distance == 0 {
        return from;
    }
    let magnitude = (factor * distance.abs() as f64).ceil() as i64;
    from + distance.signum() * magnitude.min(distance.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    const W: u32 = 640;
    const H: u32 = 480;

    fn person_region() -> Region {
        Region::clamped(&BoundingBox::new(100, 100, 50, 150), W, H)
    }

    #[test]
    fn factor_one_snaps_in_one_tick() {
        let mut smoother = RoiSmoother::new(1.0, W, H);
        assert_eq!(smoother.tick(&person_region()), person_region());
    }

    #[test]
    fn factor_zero_never_moves() {
        let mut smoother = RoiSmoother::new(0.0, W, H);
        for _ in 0..50 {
            assert_eq!(smoother.tick(&person_region()), Region::full(W, H));
        }
    }

    #[test]
    fn small_factor_still_moves_every_edge() {
        let mut smoother = RoiSmoother::new(0.01, W, H);
        let next = smoother.tick(&person_region());
        let e = next.edges();
        // ceil(0.01 * 100) = 1 on the growing edges, ceil(0.01 * 490) = 5 and
        // ceil(0.01 * 230) = 3 on the shrinking ones.
        assert_eq!((e.left, e.top, e.right, e.bottom), (1, 1, 635, 477));
    }

    #[test]
    fn converges_within_bounded_ticks() {
        for factor in [0.01_f32, 0.1, 0.5, 0.9] {
            let mut smoother = RoiSmoother::new(factor, W, H);
            let target = person_region();
            let bound = (10.0 / factor as f64).ceil() as usize + 640;
            let ticks = (1..=bound)
                .find(|_| smoother.tick(&target) == target)
                .unwrap_or_else(|| panic!("factor {factor} did not converge in {bound} ticks"));
            assert!(ticks <= bound);
            // Stays put once there.
            assert_eq!(smoother.tick(&target), target);
        }
    }

    #[test]
    fn stays_within_capture_for_any_targets() {
        let mut smoother = RoiSmoother::new(0.3, W, H);
        let boxes = [
            BoundingBox::new(-100, -100, 50, 50),
            BoundingBox::new(600, 400, 500, 500),
            BoundingBox::new(10, 20, 0, 0),
            BoundingBox::new(320, 0, 1, 480),
            BoundingBox::new(0, 0, 640, 480),
        ];
        for bbox in boxes.iter().cycle().take(60) {
            let region = smoother.tick(&Region::clamped(bbox, W, H));
            assert!(region.fits_within(W, H));
        }
    }

    #[test]
    fn out_of_range_factor_is_clamped() {
        assert_eq!(RoiSmoother::new(4.0, W, H).factor(), 1.0);
        assert_eq!(RoiSmoother::new(-1.0, W, H).factor(), 0.0);
        assert_eq!(RoiSmoother::new(f32::NAN, W, H).factor(), 0.0);
    }

    #[test]
    fn reset_restarts_from_new_full_frame() {
        let mut smoother = RoiSmoother::new(1.0, W, H);
        smoother.tick(&person_region());
        smoother.reset(320, 240);
        assert_eq!(smoother.dimensions(), (320, 240));
        assert_eq!(smoother.current(), Region::full(320, 240));
        let target = Region::clamped(&BoundingBox::new(10, 10, 20, 20), 320, 240);
        assert_eq!(smoother.tick(&target), target);
    }
}
