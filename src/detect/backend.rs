use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Parameters handed to the detector on every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// Network input size. Frames are resized to this before inference.
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            input_width: 320,
            input_height: 320,
        }
    }
}

/// Detector backend trait.
///
/// Backends own the model: the forward pass, confidence filtering and
/// non-maximum suppression all happen behind `detect`. The pipeline only
/// filters the returned list by class label.
///
/// Boxes are reported in pixel coordinates of the frame that was passed in.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        (**self).detect(frame, params)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
