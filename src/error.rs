use thiserror::Error;

/// Failure kinds the pipeline reacts to differently.
///
/// Stages carry these inside `anyhow::Error`; callers that need the policy
/// (skip the cycle vs. shut down) use `downcast_ref::<PipelineError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// The frame source has no more frames. Not a fault: triggers shutdown.
    #[error("frame source reached end of stream")]
    StreamEnded,

    /// The detector could not produce detections for this cycle.
    #[error("detector failed: {0}")]
    DetectorFailure(String),

    /// A computed region has no area.
    #[error("degenerate region {width}x{height}")]
    GeometryDegenerate { width: u32, height: u32 },

    /// Mask, overlay or region do not match the frame they are applied to.
    #[error("size mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl PipelineError {
    /// Errors that drop the current cycle but leave the pipeline running.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PipelineError::StreamEnded)
    }
}
