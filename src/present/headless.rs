use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::Presenter;
use crate::frame::Frame;

/// Presenter without a window.
///
/// Keeps the last frame, optionally writes every Nth frame to a directory as
/// PNG, and cancels when its interrupt flag is raised (e.g. from a Ctrl-C
/// handler) or after a fixed number of frames.
pub struct HeadlessPresenter {
    interrupted: Arc<AtomicBool>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: u64,
    max_frames: Option<u64>,
    shown: u64,
    snapshots_written: u64,
    last: Option<Frame>,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self {
            interrupted: Arc::new(AtomicBool::new(false)),
            snapshot_dir: None,
            snapshot_every: 1,
            max_frames: None,
            shown: 0,
            snapshots_written: 0,
            last: None,
        }
    }

    /// Write every `every`th frame into `dir`, creating it if needed.
    pub fn with_snapshots(mut self, dir: &Path, every: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        self.snapshot_dir = Some(dir.to_path_buf());
        self.snapshot_every = every.max(1);
        Ok(self)
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Flag that cancels the run when set.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    pub fn snapshots_written(&self) -> u64 {
        self.snapshots_written
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    fn write_snapshot(&mut self, frame: &Frame) -> Result<()> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(());
        };
        if self.shown % self.snapshot_every != 0 {
            return Ok(());
        }
        let path = dir.join(format!("frame_{:06}.png", self.shown));
        frame
            .image()
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        self.snapshots_written += 1;
        log::debug!("snapshot written to {}", path.display());
        Ok(())
    }
}

impl Default for HeadlessPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for HeadlessPresenter {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown += 1;
        self.write_snapshot(frame)?;
        self.last = Some(frame.clone());
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
            || self.max_frames.is_some_and(|max| self.shown >= max)
    }
}
