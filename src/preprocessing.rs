// src/preprocessing.rs

use crate::types::Frame;

/// Resize a frame to `dst_width` x `dst_height`. No-op copy when sizes match.
pub fn resize_frame(frame: &Frame, dst_width: usize, dst_height: usize) -> Frame {
    if frame.width == dst_width && frame.height == dst_height {
        return frame.clone();
    }

    Frame {
        data: resize_bilinear(
            &frame.data,
            frame.width,
            frame.height,
            dst_width,
            dst_height,
        ),
        width: dst_width,
        height: dst_height,
        timestamp: frame.timestamp,
    }
}

/// Bilinear RGB8 resize
pub fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    if src_w == 0 || src_h == 0 {
        return dst;
    }

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;

            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

/// Geometry of a letterboxed model input, used to map model coordinates
/// back onto the source frame.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: usize,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
impl Letterbox {
    pub fn new(src_w: usize, src_h: usize, size: usize) -> Self {
        let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
        let scaled_w = (src_w as f32 * scale) as usize;
        let scaled_h = (src_h as f32 * scale) as usize;
        Self {
            size,
            scale,
            pad_x: (size - scaled_w.min(size)) as f32 / 2.0,
            pad_y: (size - scaled_h.min(size)) as f32 / 2.0,
        }
    }

    /// Source pixel -> model input pixel
    pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
    }
}

/// Letterbox onto a gray square canvas, scale to [0, 1] and convert HWC -> CHW.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub fn letterbox_chw(frame: &Frame, size: usize) -> (Vec<f32>, Letterbox) {
    let lb = Letterbox::new(frame.width, frame.height, size);
    let scaled_w = ((frame.width as f32 * lb.scale) as usize).min(size);
    let scaled_h = ((frame.height as f32 * lb.scale) as usize).min(size);

    let resized = resize_bilinear(&frame.data, frame.width, frame.height, scaled_w, scaled_h);

    let mut canvas = vec![114u8; size * size * 3];
    let off_x = lb.pad_x as usize;
    let off_y = lb.pad_y as usize;
    for y in 0..scaled_h {
        let src_row = &resized[y * scaled_w * 3..(y + 1) * scaled_w * 3];
        let dst_start = ((y + off_y) * size + off_x) * 3;
        canvas[dst_start..dst_start + scaled_w * 3].copy_from_slice(src_row);
    }

    let plane = size * size;
    let mut input = vec![0.0f32; 3 * plane];
    for (i, px) in canvas.chunks_exact(3).enumerate() {
        for c in 0..3 {
            input[c * plane + i] = px[c] as f32 / 255.0;
        }
    }

    (input, lb)
}
