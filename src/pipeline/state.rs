//! Shared pipeline state.
//!
//! Two guards and one flag:
//! - `FrameSlot`: the latest captured frame. Single slot, drop-to-latest.
//!   Readers block on a condvar until a newer frame arrives instead of
//!   spinning.
//! - `published`: overlay, blur mask, target region, people count and the
//!   capture size they were built for, always written together by the
//!   detection stage.
//! - `running`: the only cancellation signal.
//!
//! Lock order where both guards are held (only `snapshot`): capture slot
//! first, then published state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::frame::Frame;
use crate::geometry::Region;
use crate::mask::BlurMask;

/// Overlay and mask from one detection cycle.
#[derive(Clone, Debug)]
pub struct Layers {
    pub overlay: RgbImage,
    pub mask: BlurMask,
}

impl Layers {
    pub fn dimensions(&self) -> (u32, u32) {
        self.overlay.dimensions()
    }
}

/// Everything the detection stage publishes in one critical section.
#[derive(Clone, Debug)]
pub struct Published {
    /// Size of the frame the layers and target belong to. Follows the source
    /// when its resolution changes mid-stream.
    pub capture: (u32, u32),
    pub layers: Option<Arc<Layers>>,
    pub target: Region,
    pub people: usize,
    /// Number of completed publishes.
    pub cycles: u64,
    /// Mean of recent detector latencies.
    pub mean_inference: Duration,
}

#[derive(Debug, Default)]
struct SlotInner {
    frame: Option<Frame>,
    seq: u64,
    closed: bool,
}

/// Single-slot "latest value" channel for captured frames.
#[derive(Debug, Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SlotInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("capture slot lock poisoned"))
    }

    /// Replace the held frame and wake waiting readers. Returns the new
    /// sequence number.
    pub fn publish(&self, frame: Frame) -> Result<u64> {
        let mut inner = self.lock()?;
        inner.frame = Some(frame);
        inner.seq += 1;
        let seq = inner.seq;
        drop(inner);
        self.ready.notify_all();
        Ok(seq)
    }

    /// Wait up to `timeout` for a frame newer than `seen`. Returns `None` on
    /// timeout or once the slot has been closed.
    pub fn wait_newer(&self, seen: u64, timeout: Duration) -> Result<Option<(u64, Frame)>> {
        let inner = self.lock()?;
        let (inner, _) = self
            .ready
            .wait_timeout_while(inner, timeout, |s| s.seq <= seen && !s.closed)
            .map_err(|_| anyhow!("capture slot lock poisoned"))?;
        if inner.closed || inner.seq <= seen {
            return Ok(None);
        }
        Ok(inner.frame.clone().map(|f| (inner.seq, f)))
    }

    /// Frames published so far.
    pub fn seq(&self) -> u64 {
        self.inner.lock().map(|s| s.seq).unwrap_or(0)
    }

    /// Wake all waiters for good. Later waits return immediately.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        self.ready.notify_all();
    }
}

/// Consistent view for one display tick.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub frame: Option<Frame>,
    pub capture: (u32, u32),
    pub layers: Option<Arc<Layers>>,
    pub target: Region,
    pub people: usize,
}

pub struct PipelineState {
    running: AtomicBool,
    capture: FrameSlot,
    published: Mutex<Published>,
}

impl PipelineState {
    /// Fresh state for a capture of `width` x `height`. The target region
    /// starts as the full frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            running: AtomicBool::new(true),
            capture: FrameSlot::new(),
            published: Mutex::new(Published {
                capture: (width, height),
                layers: None,
                target: Region::full(width, height),
                people: 0,
                cycles: 0,
                mean_inference: Duration::ZERO,
            }),
        }
    }

    /// Capture size of the last published cycle.
    pub fn capture_dimensions(&self) -> Result<(u32, u32)> {
        Ok(self.lock_published()?.capture)
    }

    pub fn capture(&self) -> &FrameSlot {
        &self.capture
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag. Once this returns no further detection
    /// publish can land.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // Wait out a publish that checked the flag before it was cleared.
        drop(self.published.lock());
        self.capture.close();
    }

    fn lock_published(&self) -> Result<MutexGuard<'_, Published>> {
        self.published
            .lock()
            .map_err(|_| anyhow!("published state lock poisoned"))
    }

    /// Publish one detection cycle. The capture size is taken from `layers`.
    /// Returns `false` without writing when the pipeline has already stopped.
    pub fn publish_detection(
        &self,
        layers: Layers,
        target: Region,
        people: usize,
        mean_inference: Duration,
    ) -> Result<bool> {
        let mut published = self.lock_published()?;
        if !self.is_running() {
            return Ok(false);
        }
        published.capture = layers.dimensions();
        published.layers = Some(Arc::new(layers));
        published.target = target;
        published.people = people;
        published.mean_inference = mean_inference;
        published.cycles += 1;
        Ok(true)
    }

    pub fn published(&self) -> Result<Published> {
        Ok(self.lock_published()?.clone())
    }

    pub fn people_count(&self) -> usize {
        self.published.lock().map(|p| p.people).unwrap_or(0)
    }

    /// Frame, layers and target region as one consistent view.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let capture = self.capture.lock()?;
        let published = self.lock_published()?;
        Ok(Snapshot {
            frame: capture.frame.clone(),
            capture: published.capture,
            layers: published.layers.clone(),
            target: published.target,
            people: published.people,
        })
    }
}
