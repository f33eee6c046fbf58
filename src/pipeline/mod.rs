//! The people-counting pipeline.
//!
//! Threads:
//! - ingestion: `FrameSource` -> capture slot
//! - detection: capture slot -> detector -> published overlay/mask/region/count
//! - caller: display tick (ROI smoother, compositor, presenter)
//!
//! The running flag in `PipelineState` is checked at the top of every loop.

pub mod compositor;
pub mod detection;
pub mod ingestion;
mod orchestrator;
pub mod smoother;
pub mod state;

pub use compositor::Compositor;
pub use detection::{build_cycle, DetectionCycle, DetectionStage};
pub use ingestion::IngestionStage;
pub use orchestrator::{Pipeline, PipelineSettings, RunSummary, StillSummary, StopReason};
pub use smoother::RoiSmoother;
pub use state::{FrameSlot, Layers, PipelineState, Published, Snapshot};
