//! Still-image source: a single image file, or every image in a directory
//! played back in file-name order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{is_still_image, FrameSource};
use crate::frame::Frame;

pub struct StillImageSource {
    origin: PathBuf,
    pending: VecDeque<PathBuf>,
    frames_read: u64,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let pending: VecDeque<PathBuf> = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_still_image(p))
                .collect();
            files.sort();
            files.into()
        } else {
            VecDeque::from([path.to_path_buf()])
        };
        if pending.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        Ok(Self {
            origin: path.to_path_buf(),
            pending,
            frames_read: 0,
        })
    }

    /// True when the source holds exactly one image and nothing has been read.
    pub fn is_single_image(&self) -> bool {
        self.frames_read == 0 && self.pending.len() == 1 && !self.origin.is_dir()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

/// Decode one image file into a frame.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgb8();
    Ok(Frame::from_image(image))
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> String {
        format!("{} ({} images)", self.origin.display(), self.pending.len())
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = load_frame(&path)?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.pending.clear();
    }
}
