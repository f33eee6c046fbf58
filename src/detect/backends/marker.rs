use std::collections::BTreeMap;

use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::Edges;

/// Colour the synthetic scene paints people with.
pub const PERSON_MARKER: [u8; 3] = [230, 32, 32];

const MARKER_CONFIDENCE: f32 = 0.9;
/// Blobs smaller than this are treated as noise.
const MIN_BLOB_PIXELS: usize = 16;

/// Stub backend that reports every connected blob of the marker colour as a
/// person. Pairs with the `stub://` synthetic source, so the whole pipeline
/// runs without a model.
pub struct MarkerBackend {
    marker: [u8; 3],
    label: String,
}

impl MarkerBackend {
    pub fn new() -> Self {
        Self {
            marker: PERSON_MARKER,
            label: "person".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for MarkerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for MarkerBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        if MARKER_CONFIDENCE <= params.confidence_threshold {
            return Ok(Vec::new());
        }

        let image = frame.image();
        let hits = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y).0 == self.marker {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let labelled = connected_components(&hits, Connectivity::Eight, Luma([0u8]));

        let mut blobs: BTreeMap<u32, (Edges, usize)> = BTreeMap::new();
        for (x, y, px) in labelled.enumerate_pixels() {
            let id = px.0[0];
            if id == 0 {
                continue;
            }
            let (x, y) = (x as i64, y as i64);
            let entry = blobs.entry(id).or_insert((
                Edges {
                    left: x,
                    top: y,
                    right: x + 1,
                    bottom: y + 1,
                },
                0,
            ));
            entry.0.left = entry.0.left.min(x);
            entry.0.top = entry.0.top.min(y);
            entry.0.right = entry.0.right.max(x + 1);
            entry.0.bottom = entry.0.bottom.max(y + 1);
            entry.1 += 1;
        }

        Ok(blobs
            .into_values()
            .filter(|(_, pixels)| *pixels >= MIN_BLOB_PIXELS)
            .map(|(edges, _)| Detection::new(self.label.clone(), MARKER_CONFIDENCE, edges.to_box()))
            .collect())
    }
}
