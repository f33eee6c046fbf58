use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// One scripted detector reply.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Detections(Vec<Detection>),
    Fail(String),
}

/// Backend that replays a fixed script, one step per call, then keeps
/// repeating the last step. Ignores frame content.
pub struct ScriptedBackend {
    steps: VecDeque<ScriptStep>,
    last: ScriptStep,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(cycles: Vec<Vec<Detection>>) -> Self {
        Self::from_steps(cycles.into_iter().map(ScriptStep::Detections).collect())
    }

    pub fn from_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            last: ScriptStep::Detections(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `detect` calls, readable after the backend has been
    /// moved into a pipeline.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.steps.pop_front() {
            self.last = step;
        }
        match &self.last {
            ScriptStep::Detections(detections) => Ok(detections.clone()),
            ScriptStep::Fail(reason) => Err(anyhow!("{}", reason)),
        }
    }
}
