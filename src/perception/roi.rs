// src/perception/roi.rs
//
// Splits a mask into horizontal bands and finds the track midpoint in each
// active band.
//
// Band numbering is top-down: band 0 starts at row 0 and higher indices sit
// closer to the robot. band_height = height / total_bands; the remainder
// rows at the bottom belong to no band.

use super::edges::detect_edges;
use crate::types::{Band, BandMidpoints, BinaryMask, Midpoint, RoiConfig, ScanPolicy};
use tracing::debug;

/// Band geometry for one frame height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    pub total_bands: usize,
    pub band_height: usize,
}

impl BandLayout {
    pub fn new(frame_height: usize, total_bands: usize) -> Self {
        Self {
            total_bands,
            band_height: frame_height / total_bands.max(1),
        }
    }

    pub fn band(&self, index: usize) -> Band {
        let y_start = index * self.band_height;
        Band {
            index,
            y_start,
            y_end: y_start + self.band_height,
        }
    }

    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        (0..self.total_bands).map(|i| self.band(i))
    }
}

pub struct RoiBandExtractor {
    total_bands: usize,
    active_bands: Vec<usize>,
    scan: ScanPolicy,
    edge_low: f32,
    edge_high: f32,
}

impl RoiBandExtractor {
    pub fn new(config: &RoiConfig) -> Self {
        let mut active_bands = config.active_bands.clone();
        active_bands.sort_unstable();
        active_bands.dedup();

        Self {
            total_bands: config.total_bands,
            active_bands,
            scan: config.scan,
            edge_low: config.edge_low,
            edge_high: config.edge_high,
        }
    }

    pub fn active_bands(&self) -> &[usize] {
        &self.active_bands
    }

    pub fn layout(&self, frame_height: usize) -> BandLayout {
        BandLayout::new(frame_height, self.total_bands)
    }

    pub fn extract(&self, mask: &BinaryMask) -> BandMidpoints {
        let layout = self.layout(mask.height);

        self.active_bands
            .iter()
            .map(|&index| {
                let band = layout.band(index);
                (index, self.band_midpoint(mask, band))
            })
            .collect()
    }

    fn band_midpoint(&self, mask: &BinaryMask, band: Band) -> Option<Midpoint> {
        if band.height() == 0 || band.y_end > mask.height {
            return None;
        }

        let slice = mask.rows(band.y_start, band.y_end);
        let edges = detect_edges(
            slice,
            mask.width,
            band.height(),
            self.edge_low,
            self.edge_high,
        );

        let x = match self.scan {
            ScanPolicy::FirstRow => {
                (0..edges.height).find_map(|y| edges.row_extent(y).map(|(l, r)| (l + r) / 2))
            }
            ScanPolicy::BandAverage => {
                let mids: Vec<usize> = (0..edges.height)
                    .filter_map(|y| edges.row_extent(y).map(|(l, r)| (l + r) / 2))
                    .collect();
                if mids.is_empty() {
                    None
                } else {
                    Some(mids.iter().sum::<usize>() / mids.len())
                }
            }
        };

        let midpoint = x.map(|x| Midpoint {
            x,
            y: band.center_y(),
        });
        debug!("Band {}: {:?}", band.index, midpoint);
        midpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total: usize, active: Vec<usize>) -> RoiConfig {
        RoiConfig {
            total_bands: total,
            active_bands: active,
            ..Default::default()
        }
    }

    fn mask_from_fn(w: usize, h: usize, f: impl Fn(usize, usize) -> bool) -> BinaryMask {
        let mut mask = BinaryMask::empty(w, h);
        for y in 0..h {
            for x in 0..w {
                if f(x, y) {
                    mask.set_foreground(x, y);
                }
            }
        }
        mask
    }

    #[test]
    fn test_band_layout_integer_division() {
        let layout = BandLayout::new(485, 10);
        assert_eq!(layout.band_height, 48);
        assert_eq!(
            layout.band(0),
            Band {
                index: 0,
                y_start: 0,
                y_end: 48
            }
        );
        let last = layout.band(9);
        assert_eq!((last.y_start, last.y_end), (432, 480));
        assert_eq!(last.center_y(), 456);
        assert_eq!(layout.bands().count(), 10);
    }

    #[test]
    fn test_empty_mask_gives_none_for_every_band() {
        let extractor = RoiBandExtractor::new(&config(10, vec![2, 5, 7]));
        let result = extractor.extract(&BinaryMask::empty(640, 480));
        assert_eq!(result.len(), 3);
        assert!(result.values().all(|m| m.is_none()));
    }

    #[test]
    fn test_single_edge_per_row_gives_none() {
        // Foreground from the left border: one edge per row only
        let mask = mask_from_fn(100, 50, |x, _| x < 30);
        let extractor = RoiBandExtractor::new(&config(5, vec![0, 4]));
        let result = extractor.extract(&mask);
        assert_eq!(result[&0], None);
        assert_eq!(result[&4], None);
    }

    #[test]
    fn test_symmetric_strip_midpoint() {
        let x0 = 300;
        let mask = mask_from_fn(640, 480, |x, _| x + 15 >= x0 && x <= x0 + 15);
        let extractor = RoiBandExtractor::new(&config(10, vec![7]));
        let mid = extractor.extract(&mask)[&7].unwrap();

        assert!((mid.x as i64 - x0 as i64).abs() <= 1, "midpoint x = {}", mid.x);
        assert_eq!(mid.y, 7 * 48 + 24);
    }

    #[test]
    fn test_only_active_bands_are_reported() {
        let mask = mask_from_fn(200, 100, |x, _| x == 100);
        let extractor = RoiBandExtractor::new(&config(10, vec![8, 1, 8]));
        let result = extractor.extract(&mask);

        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![1, 8]);
        assert_eq!(result[&1], Some(Midpoint { x: 100, y: 15 }));
        assert_eq!(result[&8], Some(Midpoint { x: 100, y: 85 }));
    }

    #[test]
    fn test_band_without_track_is_none_while_others_found() {
        // Line only in the lower half of the frame
        let mask = mask_from_fn(120, 100, |x, y| y >= 50 && x == 40);
        let extractor = RoiBandExtractor::new(&config(10, vec![2, 7]));
        let result = extractor.extract(&mask);
        assert_eq!(result[&2], None);
        assert_eq!(result[&7].map(|m| m.x), Some(40));
    }

    #[test]
    fn test_first_row_vs_band_average() {
        // Band 0 spans rows 0..10; the line shifts right halfway down the band
        let mask = mask_from_fn(100, 20, |x, y| if y < 5 { x == 20 } else { x == 60 });

        let first = RoiBandExtractor::new(&config(2, vec![0]));
        assert_eq!(first.extract(&mask)[&0].map(|m| m.x), Some(20));

        let avg = RoiBandExtractor::new(&RoiConfig {
            scan: ScanPolicy::BandAverage,
            ..config(2, vec![0])
        });
        let x = avg.extract(&mask)[&0].unwrap().x;
        assert!(x > 20 && x < 60, "band average x = {}", x);
    }

    #[test]
    fn test_frame_shorter_than_band_count() {
        let mask = mask_from_fn(50, 5, |x, _| x == 25);
        let extractor = RoiBandExtractor::new(&config(10, vec![0, 3]));
        let result = extractor.extract(&mask);
        assert!(result.values().all(|m| m.is_none()));
    }
}
