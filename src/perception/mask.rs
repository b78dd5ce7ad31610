// src/perception/mask.rs
//
// Frame -> binary track mask. Two strategies share the MaskProducer trait:
// a stateless HSV range filter and a wrapper around any SegmentationModel.

use super::segmentation::SegmentationModel;
use crate::types::{BinaryMask, Frame, HsvConfig};
use anyhow::{bail, Result};
use tracing::debug;

pub trait MaskProducer: Send {
    fn name(&self) -> &'static str;

    /// Produce a mask with the same dimensions as `frame`.
    fn produce(&mut self, frame: &Frame) -> Result<BinaryMask>;
}

// ============================================================================
// HSV THRESHOLD
// ============================================================================

/// Convert RGB to HSV on the 8-bit scale.
/// Returns (H: 0-180, S: 0-255, V: 0-255).
#[inline]
pub fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r_n = r as f32 / 255.0;
    let g_n = g as f32 / 255.0;
    let b_n = b as f32 / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if max == r_n {
        60.0 * ((g_n - b_n) / delta)
    } else if max == g_n {
        60.0 * ((b_n - r_n) / delta + 2.0)
    } else {
        60.0 * ((r_n - g_n) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max < 1e-6 { 0.0 } else { delta / max };

    (
        (h / 2.0).round().min(180.0) as u8,
        (s * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    )
}

pub struct HsvThreshold {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvThreshold {
    pub fn new(config: &HsvConfig) -> Self {
        Self {
            lower: config.lower,
            upper: config.upper,
        }
    }

    #[inline]
    fn in_range(&self, hsv: (u8, u8, u8)) -> bool {
        let (h, s, v) = hsv;
        (self.lower[0]..=self.upper[0]).contains(&h)
            && (self.lower[1]..=self.upper[1]).contains(&s)
            && (self.lower[2]..=self.upper[2]).contains(&v)
    }
}

impl MaskProducer for HsvThreshold {
    fn name(&self) -> &'static str {
        "hsv"
    }

    fn produce(&mut self, frame: &Frame) -> Result<BinaryMask> {
        let expected = frame.width * frame.height * 3;
        if frame.data.len() != expected {
            bail!(
                "Frame buffer has {} bytes, expected {} for {}x{} RGB",
                frame.data.len(),
                expected,
                frame.width,
                frame.height
            );
        }

        let data = frame
            .data
            .chunks_exact(3)
            .map(|px| {
                if self.in_range(rgb_to_hsv8(px[0], px[1], px[2])) {
                    BinaryMask::FOREGROUND
                } else {
                    BinaryMask::BACKGROUND
                }
            })
            .collect();

        Ok(BinaryMask {
            data,
            width: frame.width,
            height: frame.height,
        })
    }
}

// ============================================================================
// LEARNED SEGMENTATION
// ============================================================================

/// Thresholds every region returned by the model and ORs them together.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub struct SegmentationMask {
    model: Box<dyn SegmentationModel>,
    threshold: f32,
}

#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
impl SegmentationMask {
    pub fn new(model: Box<dyn SegmentationModel>, threshold: f32) -> Self {
        Self { model, threshold }
    }
}

impl MaskProducer for SegmentationMask {
    fn name(&self) -> &'static str {
        "segmentation"
    }

    fn produce(&mut self, frame: &Frame) -> Result<BinaryMask> {
        let regions = self.model.infer(frame)?;
        let mut mask = BinaryMask::empty(frame.width, frame.height);

        for (i, region) in regions.iter().enumerate() {
            if region.width != frame.width || region.height != frame.height {
                bail!(
                    "Region {} is {}x{}, frame is {}x{}",
                    i,
                    region.width,
                    region.height,
                    frame.width,
                    frame.height
                );
            }
            for (cell, &p) in mask.data.iter_mut().zip(&region.data) {
                if p > self.threshold {
                    *cell = BinaryMask::FOREGROUND;
                }
            }
        }

        debug!(
            "Segmentation: {} regions, {} foreground px",
            regions.len(),
            mask.foreground_count()
        );
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::segmentation::ProbabilityMap;

    fn frame_from_fn(w: usize, h: usize, f: impl Fn(usize, usize) -> [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&f(x, y));
            }
        }
        Frame {
            data,
            width: w,
            height: h,
            timestamp: 0.0,
        }
    }

    struct FixedRegions(Vec<ProbabilityMap>);

    impl SegmentationModel for FixedRegions {
        fn infer(&mut self, _frame: &Frame) -> Result<Vec<ProbabilityMap>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(rgb_to_hsv8(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv8(255, 255, 255), (0, 0, 255));
        assert_eq!(rgb_to_hsv8(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv8(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv8(0, 0, 255), (120, 255, 255));
    }

    #[test]
    fn test_hsv_marks_dark_line_only() {
        // Black tape at x in [10, 12] on a light gray floor
        let frame = frame_from_fn(32, 4, |x, _| {
            if (10..=12).contains(&x) {
                [20, 20, 25]
            } else {
                [200, 200, 190]
            }
        });
        let mut producer = HsvThreshold::new(&HsvConfig::default());
        let mask = producer.produce(&frame).unwrap();

        assert_eq!((mask.width, mask.height), (32, 4));
        for y in 0..4 {
            for x in 0..32 {
                assert_eq!(mask.is_foreground(x, y), (10..=12).contains(&x));
            }
        }
    }

    #[test]
    fn test_hsv_rejects_short_buffer() {
        let frame = Frame {
            data: vec![0; 10],
            width: 4,
            height: 4,
            timestamp: 0.0,
        };
        let mut producer = HsvThreshold::new(&HsvConfig::default());
        assert!(producer.produce(&frame).is_err());
    }

    #[test]
    fn test_segmentation_union_at_threshold() {
        let (w, h) = (8, 2);
        let mut a = ProbabilityMap::zeros(w, h);
        let mut b = ProbabilityMap::zeros(w, h);
        a.set(1, 0, 0.9);
        a.set(2, 0, 0.5); // exactly at threshold: background
        b.set(6, 1, 0.51);
        b.set(1, 0, 0.2);

        let frame = frame_from_fn(w, h, |_, _| [0, 0, 0]);
        let mut producer = SegmentationMask::new(Box::new(FixedRegions(vec![a, b])), 0.5);
        let mask = producer.produce(&frame).unwrap();

        assert!(mask.is_foreground(1, 0));
        assert!(!mask.is_foreground(2, 0));
        assert!(mask.is_foreground(6, 1));
        assert_eq!(mask.foreground_count(), 2);
    }

    #[test]
    fn test_segmentation_no_regions_is_empty_mask() {
        let frame = frame_from_fn(5, 5, |_, _| [255, 255, 255]);
        let mut producer = SegmentationMask::new(Box::new(FixedRegions(Vec::new())), 0.5);
        let mask = producer.produce(&frame).unwrap();
        assert_eq!(mask, BinaryMask::empty(5, 5));
    }

    #[test]
    fn test_segmentation_size_mismatch_is_error() {
        let frame = frame_from_fn(5, 5, |_, _| [0, 0, 0]);
        let regions = vec![ProbabilityMap::zeros(4, 5)];
        let mut producer = SegmentationMask::new(Box::new(FixedRegions(regions)), 0.5);
        assert!(producer.produce(&frame).is_err());
    }
}
