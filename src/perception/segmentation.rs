// src/perception/segmentation.rs

use crate::types::Frame;
use anyhow::Result;

/// Per-pixel foreground probability for one detected region, frame-sized.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
impl ProbabilityMap {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    pub fn set(&mut self, x: usize, y: usize, p: f32) {
        self.data[y * self.width + x] = p;
    }
}

/// External segmentation capability. The expensive model call lives
/// behind this trait so the rest of the pipeline can run without it.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub trait SegmentationModel: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<ProbabilityMap>>;
}
