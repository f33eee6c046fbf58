//! Synthetic `stub://` source.
//!
//! Renders a drifting background with people-shaped blocks painted in
//! `PERSON_MARKER`, which the stub detector backend picks up. Walker
//! placement is seeded so runs are reproducible.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
use crate::detect::backends::PERSON_MARKER;
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub scene: String,
    pub width: u32,
    pub height: u32,
    pub people: usize,
    pub seed: u64,
    /// Stop after this many frames. `None` runs forever.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            scene: "walkers".to_string(),
            width: 640,
            height: 480,
            people: 3,
            seed: 7,
            frame_limit: None,
        }
    }
}

impl SyntheticConfig {
    pub fn for_scene(scene: &str) -> Result<Self> {
        let people = match scene {
            "" | "walkers" => 3,
            "crowd" => 8,
            "solo" => 1,
            "empty" => 0,
            other => {
                return Err(anyhow!(
                    "unknown synthetic scene '{}' (expected walkers, crowd, solo or empty)",
                    other
                ))
            }
        };
        Ok(Self {
            scene: if scene.is_empty() { "walkers" } else { scene }.to_string(),
            people,
            ..Self::default()
        })
    }
}

#[derive(Clone, Debug)]
struct Walker {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    width: u32,
    height: u32,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    walkers: Vec<Walker>,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let max_w = (config.width / 8).max(8);
        let max_h = (config.height / 3).max(16);
        let walkers = (0..config.people)
            .map(|_| {
                let width = rng.gen_range(max_w / 2..=max_w);
                let height = rng.gen_range(max_h / 2..=max_h);
                Walker {
                    x: rng.gen_range(0.0..(config.width.saturating_sub(width).max(1)) as f32),
                    y: rng.gen_range(0.0..(config.height.saturating_sub(height).max(1)) as f32),
                    vx: rng.gen_range(-3.0..3.0),
                    vy: rng.gen_range(-1.5..1.5),
                    width,
                    height,
                }
            })
            .collect();
        Self {
            config,
            walkers,
            frame_count: 0,
        }
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    fn step_walkers(&mut self) {
        let (fw, fh) = (self.config.width as f32, self.config.height as f32);
        for w in &mut self.walkers {
            w.x += w.vx;
            w.y += w.vy;
            let max_x = (fw - w.width as f32).max(0.0);
            let max_y = (fh - w.height as f32).max(0.0);
            if w.x < 0.0 || w.x > max_x {
                w.vx = -w.vx;
                w.x = w.x.clamp(0.0, max_x);
            }
            if w.y < 0.0 || w.y > max_y {
                w.vy = -w.vy;
                w.y = w.y.clamp(0.0, max_y);
            }
        }
    }

    fn render(&self) -> RgbImage {
        let drift = self.frame_count;
        let mut image = RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            Rgb([
                ((x as u64 + drift) % 128) as u8,
                (y % 128) as u8,
                96,
            ])
        });
        for w in &self.walkers {
            draw_filled_rect_mut(
                &mut image,
                Rect::at(w.x as i32, w.y as i32).of_size(w.width, w.height),
                Rgb(PERSON_MARKER),
            );
        }
        image
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "stub://{} ({}x{}, {} people)",
            self.config.scene, self.config.width, self.config.height, self.config.people
        )
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        if self.frame_count > 0 {
            self.step_walkers();
        }
        self.frame_count += 1;
        Ok(Some(Frame::from_image(self.render())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectParams, DetectorBackend, MarkerBackend};

    #[test]
    fn respects_frame_limit() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig {
            frame_limit: Some(2),
            ..SyntheticConfig::default()
        });
        assert!(source.pull()?.is_some());
        assert!(source.pull()?.is_some());
        assert!(source.pull()?.is_none());
        assert_eq!(source.frames_generated(), 2);
        Ok(())
    }

    #[test]
    fn same_seed_renders_same_frames() -> Result<()> {
        let mut a = SyntheticSource::new(SyntheticConfig::default());
        let mut b = SyntheticSource::new(SyntheticConfig::default());
        for _ in 0..3 {
            let fa = a.pull()?.unwrap();
            let fb = b.pull()?.unwrap();
            assert_eq!(fa.image().as_raw(), fb.image().as_raw());
        }
        Ok(())
    }

    #[test]
    fn solo_walker_is_detected_by_stub_backend() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig::for_scene("solo")?);
        let frame = source.pull()?.unwrap();
        let found = MarkerBackend::new().detect(&frame, &DetectParams::default())?;
        assert_eq!(found.len(), 1);
        assert!(found[0].bbox.has_positive_area());
        Ok(())
    }

    #[test]
    fn empty_scene_has_no_marker_pixels() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig::for_scene("empty")?);
        let frame = source.pull()?.unwrap();
        assert!(frame.image().pixels().all(|p| p.0 != PERSON_MARKER));
        Ok(())
    }
}
