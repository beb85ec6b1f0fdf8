/// BlazeFace face detector running on ONNX Runtime via `ort`.
///
/// Alternative to the cascade backend for `.onnx` models. The session needs
/// exclusive access while running, so calls on one handle are serialized.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_detector::{DetectorError, FaceDetector, FaceRegion};
use crate::shared::pixel_buffer::{PixelBuffer, RGB_CHANNELS};

/// Model input resolution.
const INPUT_SIZE: u32 = 128;

/// Overlap above which the lower-scoring candidate is dropped.
const NMS_IOU_THRESH: f64 = 0.3;

/// Anchors of the short-range model: 16x16x2 + 8x8x6.
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (4 box + 12 keypoint).
const REGRESSOR_STRIDE: usize = 16;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub struct OnnxBlazefaceDetector {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn load(model_path: &Path, confidence: f64) -> Result<Self, DetectorError> {
        let load_error = |reason: String| DetectorError::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        };
        let session = build_session(model_path).map_err(|e| load_error(e.to_string()))?;
        log::info!("Loaded BlazeFace model from {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
            confidence,
            anchors: generate_anchors(),
        })
    }
}

// One intra-op thread per session: job parallelism comes from the workers.
fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_intra_threads(1)?
        .with_execution_providers(platform_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Hardware providers for the current platform; ort falls back to CPU when
/// a provider is unavailable.
fn platform_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&self, buffer: &PixelBuffer) -> Result<Vec<FaceRegion>, DetectorError> {
        let input = ort::value::Tensor::from_array(preprocess(buffer, INPUT_SIZE))
            .map_err(inference_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectorError::Inference("ONNX session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![input]).map_err(inference_error)?;

        // outputs[0]: regressors [1, 896, 16], outputs[1]: scores [1, 896, 1]
        if outputs.len() < 2 {
            return Err(DetectorError::Inference(format!(
                "BlazeFace model expected 2 outputs, got {}",
                outputs.len()
            )));
        }
        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let reg = regressors
            .as_slice()
            .ok_or_else(|| DetectorError::Inference("regressor output not contiguous".into()))?;
        let logits = scores
            .as_slice()
            .ok_or_else(|| DetectorError::Inference("score output not contiguous".into()))?;

        let mut candidates = decode_candidates(
            reg,
            logits,
            &self.anchors,
            self.confidence as f32,
            buffer.width(),
            buffer.height(),
        );
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept
            .iter()
            .map(|c| to_region(c, buffer.width(), buffer.height()))
            .collect())
    }
}

fn inference_error(e: impl std::fmt::Display) -> DetectorError {
    DetectorError::Inference(e.to_string())
}

/// Nearest-neighbour resize to `size x size`, scaled to [0,1], NCHW float32.
fn preprocess(buffer: &PixelBuffer, size: u32) -> ndarray::Array4<f32> {
    let src = buffer.as_ndarray();
    let src_h = buffer.height() as usize;
    let src_w = buffer.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, RGB_CHANNELS, s, s));
    for y in 0..s {
        let sy = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let sx = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..RGB_CHANNELS {
                tensor[[0, c, y, x]] = f32::from(src[[sy, sx, c]]) / 255.0;
            }
        }
    }
    tensor
}

/// Anchor centres of the short-range model, in normalized coordinates.
///
/// Two feature maps: stride 8 (16x16 cells, 2 anchors each) and stride 16
/// (8x8 cells, 6 anchors each).
fn generate_anchors() -> Vec<[f32; 2]> {
    let layers = [(8usize, 2usize), (16, 6)];
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in layers {
        let cells = INPUT_SIZE as usize / stride;
        for cy in 0..cells {
            for cx in 0..cells {
                let centre = [
                    (cx as f32 + 0.5) / cells as f32,
                    (cy as f32 + 0.5) / cells as f32,
                ];
                anchors.extend(std::iter::repeat(centre).take(per_cell));
            }
        }
    }
    anchors
}

#[derive(Clone, Debug)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

/// Applies anchor offsets to every anchor whose score clears `confidence`,
/// returning boxes clamped to the buffer.
fn decode_candidates(
    reg: &[f32],
    logits: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    width: u32,
    height: u32,
) -> Vec<Candidate> {
    let (fw, fh) = (width as f32, height as f32);
    let input = INPUT_SIZE as f32;
    let mut out = Vec::new();

    for (i, (&logit, anchor)) in logits.iter().zip(anchors).enumerate() {
        let score = sigmoid(logit);
        if score < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg.len() {
            break;
        }
        let cx = anchor[0] + reg[offset] / input;
        let cy = anchor[1] + reg[offset + 1] / input;
        let w = reg[offset + 2] / input;
        let h = reg[offset + 3] / input;

        out.push(Candidate {
            x1: ((cx - w / 2.0) * fw).max(0.0) as f64,
            y1: ((cy - h / 2.0) * fh).max(0.0) as f64,
            x2: ((cx + w / 2.0) * fw).min(fw) as f64,
            y2: ((cy + h / 2.0) * fh).min(fh) as f64,
            score: score as f64,
        });
    }
    out
}

fn to_region(c: &Candidate, width: u32, height: u32) -> FaceRegion {
    let x = c.x1 as i32;
    let y = c.y1 as i32;
    FaceRegion {
        x,
        y,
        width: ((c.x2 - c.x1) as i32).min(width as i32 - x),
        height: ((c.y2 - c.y1) as i32).min(height as i32 - y),
        score: c.score,
    }
}

/// Greedy non-maximum suppression, highest score first.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if kept.iter().all(|k| iou(k, c) <= iou_thresh) {
            kept.push(c.clone());
        }
    }
    kept
}

fn iou(a: &Candidate, b: &Candidate) -> f64 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Candidate {
        Candidate {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    #[test]
    fn test_preprocess_shape() {
        let buffer = PixelBuffer::new(vec![128u8; 200 * 100 * 3], 200, 100);
        let tensor = preprocess(&buffer, INPUT_SIZE);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalizes_to_unit_range() {
        let buffer = PixelBuffer::new(vec![255u8; 50 * 50 * 3], 50, 50);
        let tensor = preprocess(&buffer, INPUT_SIZE);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_relative_eq!(tensor[[0, 2, 127, 127]], 1.0);
    }

    #[test]
    fn test_preprocess_keeps_channel_planes_apart() {
        let mut pixels = Vec::new();
        for _ in 0..4 {
            pixels.extend_from_slice(&[255, 0, 51]);
        }
        let buffer = PixelBuffer::new(pixels, 2, 2);
        let tensor = preprocess(&buffer, 4);
        assert_relative_eq!(tensor[[0, 0, 1, 1]], 1.0);
        assert_relative_eq!(tensor[[0, 1, 1, 1]], 0.0);
        assert_relative_eq!(tensor[[0, 2, 1, 1]], 0.2);
    }

    #[test]
    fn test_anchor_count() {
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        reg[2] = 64.0; // w = 0.5
        reg[3] = 64.0; // h = 0.5
        let logits = vec![5.0, -5.0];

        let out = decode_candidates(&reg, &logits, &anchors, 0.5, 100, 100);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].x1, 25.0);
        assert_relative_eq!(out[0].x2, 75.0);
    }

    #[test]
    fn test_decode_clamps_to_buffer() {
        let anchors = vec![[0.0, 0.0]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        reg[2] = 128.0;
        reg[3] = 128.0;
        let out = decode_candidates(&reg, &[5.0], &anchors, 0.5, 40, 30);
        assert_relative_eq!(out[0].x1, 0.0);
        assert_relative_eq!(out[0].y1, 0.0);
        assert_relative_eq!(out[0].x2, 20.0);
        assert_relative_eq!(out[0].y2, 15.0);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut cands = vec![
            candidate(5.0, 5.0, 105.0, 105.0, 0.7),
            candidate(0.0, 0.0, 100.0, 100.0, 0.9),
        ];
        let kept = nms(&mut cands, NMS_IOU_THRESH);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut cands = vec![
            candidate(0.0, 0.0, 50.0, 50.0, 0.9),
            candidate(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut cands, NMS_IOU_THRESH).len(), 2);
    }

    #[test]
    fn test_to_region_stays_inside_buffer() {
        let region = to_region(&candidate(90.0, 10.0, 100.0, 60.0, 0.8), 95, 50);
        assert_eq!(region.x, 90);
        assert_eq!(region.width, 5);
        assert_eq!(region.height, 40);
    }
}
