// src/perception/edges.rs
//
// Two-threshold gradient edge detector for 8-bit single-channel images:
// 3x3 Sobel (replicated border), L1 magnitude, non-maximum suppression
// along the quantized gradient direction, then hysteresis that keeps weak
// edges only when 8-connected to a strong one.

/// tan(22.5°)
const TAN_22_5: f32 = 0.414_213_57;
/// tan(67.5°)
const TAN_67_5: f32 = 2.414_213_6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMap {
    pub data: Vec<bool>,
    pub width: usize,
    pub height: usize,
}

impl EdgeMap {
    pub fn row(&self, y: usize) -> &[bool] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// (leftmost, rightmost) edge column in row `y`, if it holds two or more
    pub fn row_extent(&self, y: usize) -> Option<(usize, usize)> {
        let row = self.row(y);
        let left = row.iter().position(|&e| e)?;
        let right = row.iter().rposition(|&e| e)?;
        (right > left).then_some((left, right))
    }
}

pub fn detect_edges(src: &[u8], width: usize, height: usize, low: f32, high: f32) -> EdgeMap {
    let mut edges = EdgeMap {
        data: vec![false; width * height],
        width,
        height,
    };
    if width == 0 || height == 0 {
        return edges;
    }

    let (gx, gy, mag) = sobel(src, width, height);

    // 0 = suppressed / below low, 1 = weak, 2 = strong
    let mut class = vec![0u8; width * height];
    let m_at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0.0
        } else {
            mag[y as usize * width + x as usize]
        }
    };

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let m = mag[i];
            if m <= low {
                continue;
            }

            let (xi, yi) = (x as isize, y as isize);
            let ax = gx[i].abs();
            let ay = gy[i].abs();

            let is_max = if ay < ax * TAN_22_5 {
                m > m_at(xi - 1, yi) && m >= m_at(xi + 1, yi)
            } else if ay > ax * TAN_67_5 {
                m > m_at(xi, yi - 1) && m >= m_at(xi, yi + 1)
            } else {
                let s: isize = if (gx[i] < 0.0) != (gy[i] < 0.0) { -1 } else { 1 };
                m > m_at(xi - s, yi - 1) && m > m_at(xi + s, yi + 1)
            };

            if is_max {
                class[i] = if m > high { 2 } else { 1 };
            }
        }
    }

    // Hysteresis: flood from strong pixels through weak ones
    let mut stack: Vec<usize> = (0..class.len()).filter(|&i| class[i] == 2).collect();
    for &i in &stack {
        edges.data[i] = true;
    }
    while let Some(i) = stack.pop() {
        let (x, y) = ((i % width) as isize, (i / width) as isize);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let j = ny as usize * width + nx as usize;
                if class[j] == 1 && !edges.data[j] {
                    edges.data[j] = true;
                    stack.push(j);
                }
            }
        }
    }

    edges
}

fn sobel(src: &[u8], width: usize, height: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let px = |x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, width as isize - 1) as usize;
        let cy = y.clamp(0, height as isize - 1) as usize;
        src[cy * width + cx] as f32
    };

    let n = width * height;
    let mut gx = vec![0.0f32; n];
    let mut gy = vec![0.0f32; n];
    let mut mag = vec![0.0f32; n];

    for y in 0..height as isize {
        for x in 0..width as isize {
            let dx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            let i = y as usize * width + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    (gx, gy, mag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(width: usize, height: usize, x0: usize, x1: usize) -> Vec<u8> {
        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in x0..=x1 {
                img[y * width + x] = 255;
            }
        }
        img
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let img = vec![255u8; 20 * 6];
        let edges = detect_edges(&img, 20, 6, 50.0, 150.0);
        assert!(edges.data.iter().all(|&e| !e));
    }

    #[test]
    fn test_single_pixel_line_edges_flank_it() {
        let img = strip(40, 5, 20, 20);
        let edges = detect_edges(&img, 40, 5, 50.0, 150.0);
        for y in 0..5 {
            let cols: Vec<usize> = (0..40).filter(|&x| edges.row(y)[x]).collect();
            assert_eq!(cols, vec![19, 21]);
        }
        assert_eq!(edges.row_extent(0), Some((19, 21)));
    }

    #[test]
    fn test_wide_strip_gives_one_edge_per_side() {
        let img = strip(60, 4, 20, 30);
        let edges = detect_edges(&img, 60, 4, 50.0, 150.0);
        let cols: Vec<usize> = (0..60).filter(|&x| edges.row(2)[x]).collect();
        assert_eq!(cols.len(), 2);
        assert!((19..=20).contains(&cols[0]));
        assert!((30..=31).contains(&cols[1]));
    }

    #[test]
    fn test_strip_touching_border_has_single_edge() {
        let img = strip(30, 3, 0, 9);
        let edges = detect_edges(&img, 30, 3, 50.0, 150.0);
        assert_eq!(edges.row_extent(1), None);
        assert_eq!(edges.row(1).iter().filter(|&&e| e).count(), 1);
    }

    #[test]
    fn test_high_threshold_above_magnitude_drops_everything() {
        let img = strip(40, 5, 10, 20);
        let edges = detect_edges(&img, 40, 5, 50.0, 5000.0);
        assert!(edges.data.iter().all(|&e| !e));
    }
}
