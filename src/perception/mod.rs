// src/perception/mod.rs

pub mod edges;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod roi;
pub mod segmentation;

pub use mask::{HsvThreshold, MaskProducer};
pub use roi::{BandLayout, RoiBandExtractor};

use crate::types::{MaskConfig, MaskStrategy};
use anyhow::Result;
use tracing::info;

/// Build the configured mask strategy. Model loading failures are fatal.
pub fn build_mask_producer(config: &MaskConfig) -> Result<Box<dyn MaskProducer>> {
    match config.strategy {
        MaskStrategy::Hsv => {
            info!(
                "Mask: HSV range lower={:?} upper={:?}",
                config.hsv.lower, config.hsv.upper
            );
            Ok(Box::new(HsvThreshold::new(&config.hsv)))
        }
        MaskStrategy::Segmentation => build_segmentation(config),
    }
}

#[cfg(feature = "onnx")]
fn build_segmentation(config: &MaskConfig) -> Result<Box<dyn MaskProducer>> {
    use mask::SegmentationMask;

    let model = onnx::OnnxSegmenter::new(&config.segmentation)?;
    info!(
        "Mask: segmentation, threshold {:.2}",
        config.segmentation.mask_threshold
    );
    Ok(Box::new(SegmentationMask::new(
        Box::new(model),
        config.segmentation.mask_threshold,
    )))
}

#[cfg(not(feature = "onnx"))]
fn build_segmentation(_config: &MaskConfig) -> Result<Box<dyn MaskProducer>> {
    anyhow::bail!("Segmentation mask requires building with the `onnx` feature")
}
