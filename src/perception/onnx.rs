// src/perception/onnx.rs
//
// YOLO-style instance segmentation through ONNX Runtime.
//
// Expected exports:
//   output0: [1, 4 + num_classes + num_coeffs, num_candidates]
//            rows = cx, cy, w, h, class scores..., mask coefficients...
//   output1: [1, num_coeffs, proto_h, proto_w]   (mask prototypes)

use super::segmentation::{ProbabilityMap, SegmentationModel};
use crate::preprocessing::{letterbox_chw, Letterbox};
use crate::types::{Frame, SegmentationConfig};
use anyhow::{bail, Context, Result};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, info};

struct Candidate {
    /// [x1, y1, x2, y2] in model input coordinates
    bbox: [f32; 4],
    score: f32,
    coeffs: Vec<f32>,
}

pub struct OnnxSegmenter {
    session: Session,
    config: SegmentationConfig,
}

impl OnnxSegmenter {
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        info!("Loading segmentation model: {}", config.model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("Failed to load model {}", config.model_path))?;

        info!("✓ Segmentation model ready");
        Ok(Self {
            session,
            config: config.clone(),
        })
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<ProbabilityMap>> {
        let size = self.config.input_size;
        let (input, lb) = letterbox_chw(frame, size);

        let input_value = Tensor::from_array(([1usize, 3, size, size], input))?;
        let outputs = self
            .session
            .run(ort::inputs![self.config.input_name.as_str() => input_value])
            .context("Segmentation inference failed")?;

        if outputs.len() < 2 {
            bail!("Model returned {} outputs, expected detections + prototypes", outputs.len());
        }

        let (pred_shape, pred) = outputs[0].try_extract_tensor::<f32>()?;
        let (proto_shape, protos) = outputs[1].try_extract_tensor::<f32>()?;
        let pred_dims: Vec<usize> = pred_shape.iter().map(|&d| d as usize).collect();
        let proto_dims: Vec<usize> = proto_shape.iter().map(|&d| d as usize).collect();

        if pred_dims.len() != 3 || proto_dims.len() != 4 {
            bail!(
                "Unexpected output shapes {:?} / {:?}",
                pred_dims,
                proto_dims
            );
        }

        let candidates = decode_candidates(
            pred,
            pred_dims[1],
            pred_dims[2],
            proto_dims[1],
            self.config.detection_confidence,
        )?;
        let kept = nms(candidates, self.config.iou_threshold);
        debug!("Segmentation: {} instances after NMS", kept.len());

        let proto = Prototypes {
            data: protos,
            count: proto_dims[1],
            height: proto_dims[2],
            width: proto_dims[3],
        };

        Ok(kept
            .iter()
            .map(|c| project_instance(c, &proto, &lb, frame.width, frame.height))
            .collect())
    }
}

fn decode_candidates(
    pred: &[f32],
    rows: usize,
    count: usize,
    num_coeffs: usize,
    conf_thresh: f32,
) -> Result<Vec<Candidate>> {
    if rows < 4 + num_coeffs + 1 {
        bail!(
            "Detection output has {} rows, too few for {} mask coefficients",
            rows,
            num_coeffs
        );
    }
    let num_classes = rows - 4 - num_coeffs;
    let at = |row: usize, i: usize| pred[row * count + i];

    let mut out = Vec::new();
    for i in 0..count {
        let score = (0..num_classes)
            .map(|c| at(4 + c, i))
            .fold(f32::NEG_INFINITY, f32::max);
        if score < conf_thresh {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        out.push(Candidate {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            score,
            coeffs: (0..num_coeffs).map(|k| at(4 + num_classes + k, i)).collect(),
        });
    }
    Ok(out)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn nms(mut candidates: Vec<Candidate>, iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        if kept.iter().all(|k| iou(&k.bbox, &c.bbox) <= iou_thresh) {
            kept.push(c);
        }
    }
    kept
}

struct Prototypes<'a> {
    data: &'a [f32],
    count: usize,
    height: usize,
    width: usize,
}

fn project_instance(
    c: &Candidate,
    proto: &Prototypes<'_>,
    lb: &Letterbox,
    frame_w: usize,
    frame_h: usize,
) -> ProbabilityMap {
    let plane = proto.height * proto.width;
    let mut low_res = vec![0.0f32; plane];
    for (j, cell) in low_res.iter_mut().enumerate() {
        let logit: f32 = (0..proto.count)
            .map(|k| c.coeffs[k] * proto.data[k * plane + j])
            .sum();
        *cell = 1.0 / (1.0 + (-logit).exp());
    }

    let sx = proto.width as f32 / lb.size as f32;
    let sy = proto.height as f32 / lb.size as f32;
    let mut map = ProbabilityMap::zeros(frame_w, frame_h);

    for y in 0..frame_h {
        for x in 0..frame_w {
            let (mx, my) = lb.to_model(x as f32 + 0.5, y as f32 + 0.5);
            if mx < c.bbox[0] || mx > c.bbox[2] || my < c.bbox[1] || my > c.bbox[3] {
                continue;
            }
            let px = ((mx * sx) as usize).min(proto.width - 1);
            let py = ((my * sy) as usize).min(proto.height - 1);
            map.set(x, y, low_res[py * proto.width + px]);
        }
    }

    map
}
