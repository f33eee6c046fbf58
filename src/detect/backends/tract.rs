#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::labels::ClassLabels;
use crate::detect::result::Detection;
use crate::detect::yolo::{decode_rows, non_max_suppression};
use crate::frame::Frame;

/// Tract-based backend for YOLO-style ONNX models.
///
/// Frames are resized to the network input, scaled to `0..1` and run through
/// the model. Every output tensor is read as rows of
/// `[cx, cy, w, h, objectness, class scores...]`, decoded against the frame
/// size and reduced with NMS.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    labels: ClassLabels,
    width: u32,
    height: u32,
    /// Row length of each model output, read from the first inference.
    output_rows: OnceLock<Vec<usize>>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels: ClassLabels,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            labels,
            width,
            height,
            output_rows: OnceLock::new(),
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(frame.image(), self.width, self.height, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn row_lengths(&self, outputs: &TVec<TValue>) -> &[usize] {
        self.output_rows.get_or_init(|| {
            outputs
                .iter()
                .map(|t| t.shape().last().copied().unwrap_or(0))
                .collect()
        })
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        if params.input_width != self.width || params.input_height != self.height {
            return Err(anyhow!(
                "model was prepared for {}x{} input, asked for {}x{}",
                self.width,
                self.height,
                params.input_width,
                params.input_height
            ));
        }

        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let row_lengths = self.row_lengths(&outputs).to_vec();

        let mut candidates = Vec::new();
        for (output, row_len) in outputs.iter().zip(row_lengths) {
            let view = output
                .to_array_view::<f32>()
                .context("model output tensor was not f32")?;
            let data: Vec<f32> = view.iter().copied().collect();
            candidates.extend(decode_rows(
                &data,
                row_len,
                frame.width(),
                frame.height(),
                params.confidence_threshold,
            )?);
        }

        let kept = non_max_suppression(candidates, params.confidence_threshold, params.nms_threshold);
        Ok(kept
            .into_iter()
            .map(|c| {
                let label = self.labels.name(c.class_id).unwrap_or("unknown");
                Detection::new(label, c.confidence, c.bbox)
            })
            .collect())
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::from_image(image::RgbImage::new(self.width, self.height));
        let params = DetectParams {
            input_width: self.width,
            input_height: self.height,
            ..DetectParams::default()
        };
        self.detect(&blank, &params).map(|_| ())
    }
}
