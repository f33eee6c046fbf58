//! YOLO-style output decoding and non-maximum suppression.
//!
//! Each output row is `[cx, cy, w, h, objectness, score_0, score_1, ...]`
//! with box values normalised to the input image. Backends that run a YOLO
//! network feed their raw output rows through `decode_rows` and then
//! `non_max_suppression`.

use anyhow::{anyhow, Result};

use crate::geometry::BoundingBox;

/// Offset of the first class score in a row.
pub const CLASS_SCORES_OFFSET: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Decode a flat `rows x row_len` output into candidates whose best class
/// score exceeds `confidence_threshold`. Boxes are scaled to a
/// `frame_width x frame_height` frame.
pub fn decode_rows(
    data: &[f32],
    row_len: usize,
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
) -> Result<Vec<Candidate>> {
    if row_len <= CLASS_SCORES_OFFSET {
        return Err(anyhow!(
            "output rows of length {} carry no class scores",
            row_len
        ));
    }
    if data.len() % row_len != 0 {
        return Err(anyhow!(
            "output length {} is not a multiple of row length {}",
            data.len(),
            row_len
        ));
    }

    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let mut candidates = Vec::new();
    for row in data.chunks_exact(row_len) {
        let Some((class_id, confidence)) = best_class(&row[CLASS_SCORES_OFFSET..]) else {
            continue;
        };
        if confidence <= confidence_threshold {
            continue;
        }
        let center_x = (row[0] * fw) as i32;
        let center_y = (row[1] * fh) as i32;
        let width = (row[2] * fw) as i32;
        let height = (row[3] * fh) as i32;
        candidates.push(Candidate {
            class_id,
            confidence,
            bbox: BoundingBox::new(center_x - width / 2, center_y - height / 2, width, height),
        });
    }
    Ok(candidates)
}

/// Arg-max over class scores. First index wins ties.
fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// Intersection over union of two boxes. Boxes without area have IoU 0.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    if !a.has_positive_area() || !b.has_positive_area() {
        return 0.0;
    }
    let ea = a.edges();
    let eb = b.edges();
    let iw = (ea.right.min(eb.right) - ea.left.max(eb.left)).max(0);
    let ih = (ea.bottom.min(eb.bottom) - ea.top.max(eb.top)).max(0);
    let inter = (iw * ih) as f64;
    let union = (a.width as i64 * a.height as i64 + b.width as i64 * b.height as i64) as f64 - inter;
    if union <= 0.0 {
        0.0
    } else {
        (inter / union) as f32
    }
}

/// Greedy NMS: highest score first, drop any candidate overlapping a kept
/// one by more than `nms_threshold`. Candidates at or below
/// `score_threshold` are discarded up front. Suppression is class-agnostic.
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    score_threshold: f32,
    nms_threshold: f32,
) -> Vec<Candidate> {
    candidates.retain(|c| c.confidence > score_threshold);
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) <= nms_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
