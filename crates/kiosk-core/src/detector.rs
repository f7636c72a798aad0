//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the SCRFD anchor-free detector over a letterboxed grayscale frame and
//! returns pixel-space face boxes after NMS. Landmark outputs are ignored:
//! presence only needs the box.

use crate::presence::FaceLocator;
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_DEFAULT_CONFIDENCE: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
/// Score, bbox and keypoint heads for each of the three strides.
const SCRFD_MIN_OUTPUTS: usize = 9;

/// File name of the detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Letterbox placement of the source frame inside the square model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    new_w: usize,
    new_h: usize,
}

impl Letterbox {
    fn fit(width: usize, height: usize, target: usize) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as usize).clamp(1, target);
        let new_h = ((height as f32 * scale).round() as usize).clamp(1, target);
        Self {
            scale,
            pad_x: (target - new_w) as f32 / 2.0,
            pad_y: (target - new_h) as f32 / 2.0,
            new_w,
            new_h,
        }
    }

    /// Map a point from model-input space back to source-frame pixels.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// (score, bbox) output tensor indices for one stride.
type StrideHeads = (usize, usize);

/// SCRFD-based face detector.
pub struct ScrfdDetector {
    session: Session,
    confidence_threshold: f32,
    heads: [StrideHeads; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        if output_names.len() < SCRFD_MIN_OUTPUTS {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires {SCRFD_MIN_OUTPUTS} outputs, got {}",
                output_names.len()
            )));
        }

        let heads = discover_heads(&output_names);
        tracing::info!(path = model_path, ?heads, "loaded SCRFD model");

        Ok(Self {
            session,
            confidence_threshold: SCRFD_DEFAULT_CONFIDENCE,
            heads,
        })
    }

    /// Override the minimum detection score (default 0.5).
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Detect faces in a grayscale frame, sorted by descending confidence.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 || frame.len() < width * height {
            return Err(DetectorError::InferenceFailed(format!(
                "frame buffer of {} bytes does not hold {width}x{height} pixels",
                frame.len()
            )));
        }

        let letterbox = Letterbox::fit(width, height, SCRFD_INPUT_SIZE);
        let input = to_input_tensor(frame, width, height, &letterbox);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.heads[pos];
            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;
            candidates.extend(decode_stride(
                scores,
                bboxes,
                stride,
                &letterbox,
                self.confidence_threshold,
            ));
        }

        let faces = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::trace!(faces = faces.len(), "SCRFD detections");
        Ok(faces)
    }
}

impl FaceLocator for ScrfdDetector {
    fn locate(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        self.detect(frame, width, height)
    }
}

/// Find the score and bbox heads per stride by tensor name (`score_8`,
/// `bbox_16`, ...). Exports with numeric names use the standard positional
/// layout: scores at 0-2, bboxes at 3-5.
fn discover_heads(names: &[String]) -> [StrideHeads; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let mut named = [(0, 0); 3];
    for (pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride)) {
            (Some(score), Some(bbox)) => named[pos] = (score, bbox),
            _ => {
                tracing::debug!(?names, "SCRFD output names not recognized, using positional mapping");
                return [(0, 3), (1, 4), (2, 5)];
            }
        }
    }
    named
}

/// Bilinear-resize the grayscale frame into the letterbox and normalize it
/// into a 1x3xHxW tensor. Padding uses the mean so it normalizes to zero.
fn to_input_tensor(frame: &[u8], width: usize, height: usize, lb: &Letterbox) -> Array4<f32> {
    let resized = resize_bilinear(frame, width, height, lb.new_w, lb.new_h);
    let x0 = lb.pad_x.floor() as usize;
    let y0 = lb.pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::from_elem((1, 3, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE), 0.0);
    for y in 0..lb.new_h {
        for x in 0..lb.new_w {
            let value = (resized[y * lb.new_w + x] as f32 - SCRFD_MEAN) / SCRFD_STD;
            for c in 0..3 {
                tensor[[0, c, y0 + y, x0 + x]] = value;
            }
        }
    }
    tensor
}

fn resize_bilinear(src: &[u8], width: usize, height: usize, new_w: usize, new_h: usize) -> Vec<u8> {
    let sx = width as f32 / new_w as f32;
    let sy = height as f32 / new_h as f32;
    let mut out = vec![0u8; new_w * new_h];

    for y in 0..new_h {
        let fy_src = ((y as f32 + 0.5) * sy - 0.5).max(0.0);
        let y0 = (fy_src.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = fy_src - y0 as f32;

        for x in 0..new_w {
            let fx_src = ((x as f32 + 0.5) * sx - 0.5).max(0.0);
            let x0 = (fx_src.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = fx_src - x0 as f32;

            let top = src[y0 * width + x0] as f32 * (1.0 - fx) + src[y0 * width + x1] as f32 * fx;
            let bottom = src[y1 * width + x0] as f32 * (1.0 - fx) + src[y1 * width + x1] as f32 * fx;
            out[y * new_w + x] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Decode the anchor grid of a single stride into pixel-space boxes.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<BoundingBox> {
    let grid_w = SCRFD_INPUT_SIZE / stride;
    let grid_h = SCRFD_INPUT_SIZE / stride;
    let anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut faces = Vec::new();
    for idx in 0..anchors.min(scores.len()) {
        let score = scores[idx];
        if score < threshold {
            continue;
        }
        let Some(offsets) = bboxes.get(idx * 4..idx * 4 + 4) else {
            break;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let cx = (cell % grid_w) as f32 * step;
        let cy = (cell / grid_w) as f32 * step;

        let (x1, y1) = letterbox.unmap(cx - offsets[0] * step, cy - offsets[1] * step);
        let (x2, y2) = letterbox.unmap(cx + offsets[2] * step, cy + offsets[3] * step);

        faces.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
        });
    }
    faces
}

/// Greedy non-maximum suppression. Output is sorted by descending confidence.
fn nms(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
