// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub mask: MaskConfig,
    pub roi: RoiConfig,
    pub lane: LaneConfig,
    pub pid: PidConfig,
    pub drive: DriveConfig,
    pub dispatch: DispatchConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A still image, returned again on every read
    Image,
    /// Local capture device, `uri` is the device index
    Camera,
    /// Network stream (RTSP / MJPEG over HTTP)
    Stream,
    /// Video file, ends when the file does
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub uri: String,
    /// Resize every frame to [width, height] before processing
    pub resize: Option<[usize; 2]>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Stream,
            uri: "http://192.168.100.27:4747/video".to_string(),
            resize: Some([640, 480]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStrategy {
    Hsv,
    Segmentation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub strategy: MaskStrategy,
    pub hsv: HsvConfig,
    pub segmentation: SegmentationConfig,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            strategy: MaskStrategy::Hsv,
            hsv: HsvConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

/// Inclusive HSV bounds on the 8-bit scale (H: 0-180, S: 0-255, V: 0-255)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HsvConfig {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl Default for HsvConfig {
    fn default() -> Self {
        // Black tape on a light floor
        Self {
            lower: [0, 0, 0],
            upper: [180, 255, 50],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub model_path: String,
    pub input_size: usize,
    pub input_name: String,
    /// Minimum class score for an instance to produce a region
    pub detection_confidence: f32,
    pub iou_threshold: f32,
    /// Per-pixel probability above which a region pixel is foreground
    pub mask_threshold: f32,
    pub num_threads: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: "models/track-seg.onnx".to_string(),
            input_size: 640,
            input_name: "images".to_string(),
            detection_confidence: 0.25,
            iou_threshold: 0.45,
            mask_threshold: 0.5,
            num_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// First row with two edge pixels wins
    FirstRow,
    /// Mean of the midpoints of every row with two edge pixels
    BandAverage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    pub total_bands: usize,
    /// Band indices, counted top-down from 0
    pub active_bands: Vec<usize>,
    pub scan: ScanPolicy,
    pub edge_low: f32,
    pub edge_high: f32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            total_bands: 10,
            active_bands: vec![2, 5, 7],
            scan: ScanPolicy::FirstRow,
            edge_low: 50.0,
            edge_high: 150.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Max spread of band midpoints (px) still classified as straight
    pub straight_threshold_px: f64,
    /// X used when the reference band has no midpoint (None = frame center)
    pub default_x: Option<f64>,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            straight_threshold_px: 50.0,
            default_x: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Saturates the integral accumulator to +/- this value when set
    pub integral_limit: Option<f64>,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.1,
            ki: 0.0,
            kd: 0.0,
            integral_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub base_speed: i32,
    pub min_speed: i32,
    pub max_speed: i32,
    /// Base speed used instead of `base_speed` while the lane is curved
    pub curve_speed: Option<i32>,
    /// Swap steering sign for robots with mirrored motor wiring
    pub invert_steering: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_speed: 30,
            min_speed: 20,
            max_speed: 100,
            curve_speed: None,
            invert_steering: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub send_interval_secs: f64,
    pub timeout_ms: u64,
    pub transport: TransportConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_interval_secs: 0.1,
            timeout_ms: 2000,
            transport: TransportConfig::Mqtt(MqttConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Mqtt(MqttConfig),
    Http(HttpConfig),
    /// Log commands only, no robot attached
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub right_topic: String,
    pub left_topic: String,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after the broker link drops
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "192.168.100.27".to_string(),
            port: 1883,
            client_id: "lane-pilot".to_string(),
            right_topic: "MotorKanan".to_string(),
            left_topic: "MotorKiri".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.115.24/setSpeed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_frames: Option<u64>,
    /// Consecutive read misses treated as end of stream (0 = never)
    pub max_consecutive_misses: u32,
    pub miss_backoff_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            max_consecutive_misses: 0,
            miss_backoff_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "lane_pilot=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Directory for annotated PNG snapshots (None = disabled)
    pub save_dir: Option<String>,
    pub every_n_frames: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            every_n_frames: 30,
        }
    }
}

// ============================================================================
// FRAME DATA
// ============================================================================

/// Packed RGB8 frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
}

impl Frame {
    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 3;
            self.data[idx..idx + 3].copy_from_slice(&rgb);
        }
    }
}

/// Foreground = 255, background = 0. Same size as the frame it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl BinaryMask {
    pub const FOREGROUND: u8 = 255;
    pub const BACKGROUND: u8 = 0;

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            data: vec![Self::BACKGROUND; width * height],
            width,
            height,
        }
    }

    #[cfg(test)]
    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != Self::BACKGROUND
    }

    #[cfg(test)]
    pub fn set_foreground(&mut self, x: usize, y: usize) {
        self.data[y * self.width + x] = Self::FOREGROUND;
    }

    /// Rows [y_start, y_end) as one contiguous slice
    pub fn rows(&self, y_start: usize, y_end: usize) -> &[u8] {
        let end = y_end.min(self.height);
        let start = y_start.min(end);
        &self.data[start * self.width..end * self.width]
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != Self::BACKGROUND).count()
    }
}

/// Horizontal slice of the frame. Index 0 is the top band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub index: usize,
    pub y_start: usize,
    pub y_end: usize,
}

impl Band {
    pub fn height(&self) -> usize {
        self.y_end - self.y_start
    }

    pub fn center_y(&self) -> usize {
        self.y_start + self.height() / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Midpoint {
    pub x: usize,
    pub y: usize,
}

/// Active band index -> midpoint, ordered top-down
pub type BandMidpoints = BTreeMap<usize, Option<Midpoint>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotorCommand {
    pub left_speed: i32,
    pub right_speed: i32,
}
