//! Ingestion stage: pull frames from the source into the capture slot.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::ingest::FrameSource;
use crate::pipeline::state::PipelineState;

pub struct IngestionStage<S> {
    state: Arc<PipelineState>,
    source: S,
}

impl<S: FrameSource> IngestionStage<S> {
    pub fn new(state: Arc<PipelineState>, source: S) -> Self {
        Self { state, source }
    }

    /// Pull and publish until the running flag clears or the source ends.
    ///
    /// An absent or empty frame ends the stream, and so does a read error:
    /// there are no retries. Either way the running flag is cleared and the
    /// source released before returning.
    pub fn run(mut self) {
        let origin = self.source.describe();
        log::info!("ingestion stage started ({})", origin);
        while self.state.is_running() {
            match self.source.pull() {
                Ok(Some(frame)) if !frame.is_empty() => {
                    if let Err(e) = self.state.capture().publish(frame) {
                        log::error!("ingestion stage stopping: {:#}", e);
                        break;
                    }
                }
                Ok(_) => {
                    log::info!("{}: {}", origin, PipelineError::StreamEnded);
                    break;
                }
                Err(e) => {
                    log::warn!("{}: read failed, treating as end of stream: {:#}", origin, e);
                    break;
                }
            }
        }
        self.state.stop();
        self.source.release();
        log::info!(
            "ingestion stage stopped after {} frames",
            self.state.capture().seq()
        );
    }
}
