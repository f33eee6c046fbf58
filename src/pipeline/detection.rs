//! Detection stage.
//!
//! Waits for a newer captured frame, runs the detector on it and publishes
//! the overlay, blur mask, target region and people count of that cycle in
//! one critical section. Frames that arrive while the detector is busy are
//! dropped; the stage always works on the latest one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::detect::{DetectParams, Detection, DetectorBackend};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::geometry::{BoundingBox, Region};
use crate::mask::BlurMask;
use crate::overlay::OverlayPainter;
use crate::pipeline::state::{Layers, PipelineState};
use crate::ring::RingBuffer;

/// Detector latencies kept for the running mean.
pub const INFERENCE_WINDOW: usize = 32;

/// How long the stage waits for a new frame before re-checking the running
/// flag.
const FRAME_WAIT: Duration = Duration::from_millis(50);

/// Result of one detection cycle, before it is published.
#[derive(Clone, Debug)]
pub struct DetectionCycle {
    pub layers: Layers,
    /// Union of the person boxes, clamped to the frame. `None` when nothing
    /// was detected.
    pub union: Option<Region>,
    /// Region to zoom to: the union, or the full frame as a fallback.
    pub target: Region,
    pub people: usize,
}

/// Build overlay, mask and regions from one frame's detections.
///
/// Only detections labelled `person_label` count. Each one is drawn on the
/// overlay, cleared from the blur mask and folded into the union box. When
/// there is no person, or the clamped union has no area, the target falls
/// back to the whole frame.
pub fn build_cycle(
    frame: &Frame,
    detections: &[Detection],
    person_label: &str,
    painter: &OverlayPainter,
    inference: Duration,
) -> DetectionCycle {
    let (width, height) = frame.dimensions();
    let mut overlay = OverlayPainter::blank(width, height);
    let mut mask = BlurMask::all_blur(width, height);
    let mut union: Option<BoundingBox> = None;
    let mut people = 0;

    for detection in detections.iter().filter(|d| d.is_label(person_label)) {
        people += 1;
        painter.draw_detection(&mut overlay, detection);
        mask.keep_sharp(&Region::clamped(&detection.bbox, width, height));
        union = Some(match union {
            Some(acc) => acc.union(&detection.bbox),
            None => detection.bbox,
        });
    }
    painter.draw_banner(&mut overlay, inference);

    let union = union.map(|bbox| Region::clamped(&bbox, width, height));
    let target = match union {
        Some(region) if !region.is_degenerate() => region,
        Some(region) => {
            log::debug!(
                "{}; showing the full frame",
                PipelineError::GeometryDegenerate {
                    width: region.width(),
                    height: region.height()
                }
            );
            frame.full_region()
        }
        None => frame.full_region(),
    };

    DetectionCycle {
        layers: Layers { overlay, mask },
        union,
        target,
        people,
    }
}

/// Run the detector on `frame` and build the cycle. Detector errors come
/// back as `PipelineError::DetectorFailure`.
pub fn detect_cycle<B: DetectorBackend + ?Sized>(
    backend: &mut B,
    frame: &Frame,
    params: &DetectParams,
    person_label: &str,
    painter: &OverlayPainter,
) -> Result<(DetectionCycle, Duration)> {
    let started = Instant::now();
    let detections = backend
        .detect(frame, params)
        .map_err(|e| PipelineError::DetectorFailure(format!("{:#}", e)))?;
    let inference = started.elapsed();
    Ok((
        build_cycle(frame, &detections, person_label, painter, inference),
        inference,
    ))
}

pub struct DetectionStage<B> {
    state: Arc<PipelineState>,
    backend: B,
    params: DetectParams,
    person_label: String,
    painter: OverlayPainter,
    timings: RingBuffer<Duration>,
}

impl<B: DetectorBackend> DetectionStage<B> {
    pub fn new(
        state: Arc<PipelineState>,
        backend: B,
        params: DetectParams,
        person_label: impl Into<String>,
        painter: OverlayPainter,
    ) -> Self {
        Self {
            state,
            backend,
            params,
            person_label: person_label.into(),
            painter,
            timings: RingBuffer::new(INFERENCE_WINDOW),
        }
    }

    /// Loop until the running flag clears. Recoverable cycle failures are
    /// logged and skipped; anything else stops the pipeline.
    pub fn run(mut self) {
        log::info!("detection stage started (backend={})", self.backend.name());
        let mut seen = 0;
        while self.state.is_running() {
            let next = match self.state.capture().wait_newer(seen, FRAME_WAIT) {
                Ok(next) => next,
                Err(e) => {
                    log::error!("detection stage stopping: {:#}", e);
                    self.state.stop();
                    break;
                }
            };
            let Some((seq, frame)) = next else {
                continue;
            };
            seen = seq;
            if frame.is_empty() {
                continue;
            }

            if let Err(e) = self.step(&frame) {
                match e.downcast_ref::<PipelineError>() {
                    Some(kind) if kind.is_recoverable() => {
                        log::warn!("detection cycle skipped: {}", kind);
                    }
                    _ => {
                        log::error!("detection stage stopping: {:#}", e);
                        self.state.stop();
                        break;
                    }
                }
            }
        }
        log::info!("detection stage stopped");
    }

    /// One detection cycle on `frame`. Returns whether it was published.
    ///
    /// Layers are always built at the frame's own size, so a source that
    /// changes resolution mid-stream republishes the new capture size with
    /// its first cycle.
    pub fn step(&mut self, frame: &Frame) -> Result<bool> {
        let (pw, ph) = self.state.capture_dimensions()?;
        let (fw, fh) = frame.dimensions();
        if (pw, ph) != (fw, fh) {
            log::info!("capture size changed {}x{} -> {}x{}", pw, ph, fw, fh);
        }

        let (cycle, inference) = detect_cycle(
            &mut self.backend,
            frame,
            &self.params,
            &self.person_label,
            &self.painter,
        )?;
        self.timings.push(inference);
        log::debug!(
            "people={} inference={:.2}ms",
            cycle.people,
            inference.as_secs_f64() * 1000.0
        );

        self.state.publish_detection(
            cycle.layers,
            cycle.target,
            cycle.people,
            mean_duration(&self.timings),
        )
    }

    pub fn mean_inference(&self) -> Duration {
        mean_duration(&self.timings)
    }
}

fn mean_duration(timings: &RingBuffer<Duration>) -> Duration {
    if timings.is_empty() {
        return Duration::ZERO;
    }
    timings.iter().sum::<Duration>() / timings.len() as u32
}
