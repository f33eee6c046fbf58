use crate::geometry::BoundingBox;

/// One detected object, after the backend's own thresholding and NMS.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// Pixel coordinates in the frame passed to the detector. Not clamped.
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    pub fn is_label(&self, label: &str) -> bool {
        self.label == label
    }

    /// Overlay caption, e.g. `person:0.87`.
    pub fn caption(&self) -> String {
        format!("{}:{:.2}", self.label, self.confidence)
    }
}
