//! People counter
//!
//! Counts the people visible in a video stream, highlights them, blurs the
//! rest of the frame and smoothly zooms the view onto the area where people
//! are.
//!
//! # Architecture
//!
//! Three threads share one `PipelineState`:
//!
//! 1. **Ingestion** pulls frames from a `FrameSource` into a single-slot,
//!    drop-to-latest capture slot.
//! 2. **Detection** runs a `DetectorBackend` on the newest frame and publishes
//!    overlay, blur mask, target region and people count together.
//! 3. **Display tick** (the caller's thread) moves the `RoiSmoother` toward the
//!    target, composites blur, overlay, crop, padding and resize, and hands the
//!    result to a `Presenter`.
//!
//! # Module Structure
//!
//! - `geometry`: bounding boxes and capture-clamped regions
//! - `frame`, `mask`, `overlay`: the images a cycle produces
//! - `detect`: detector boundary, labels, YOLO decoding, backends
//! - `ingest`: frame sources (synthetic, still images, ffmpeg files)
//! - `pipeline`: shared state, stages, smoother, compositor, orchestrator
//! - `present`: presenter boundary and the headless presenter
//! - `config`: file + environment configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod mask;
pub mod overlay;
pub mod pipeline;
pub mod present;
pub mod ring;

pub use config::PipelineConfig;
pub use detect::{BackendRegistry, ClassLabels, DetectParams, Detection, DetectorBackend};
pub use error::PipelineError;
pub use frame::Frame;
pub use geometry::{BoundingBox, Region};
pub use ingest::{open_source, FrameSource};
pub use mask::BlurMask;
pub use overlay::OverlayPainter;
pub use pipeline::{Pipeline, PipelineSettings, PipelineState, RoiSmoother, RunSummary, StopReason};
pub use present::{HeadlessPresenter, Presenter};
pub use ring::RingBuffer;
