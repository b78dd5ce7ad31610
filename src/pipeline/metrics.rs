// src/pipeline/metrics.rs
//
// Counters for one control loop. Cheap to clone; every clone shares the
// same atomics so a reporter task can read them while the loop runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub read_misses: Arc<AtomicU64>,
    pub mask_failures: Arc<AtomicU64>,
    pub frames_with_reference: Arc<AtomicU64>,
    pub curve_frames: Arc<AtomicU64>,
    pub commands_sent: Arc<AtomicU64>,
    pub commands_throttled: Arc<AtomicU64>,
    pub send_failures: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            read_misses: Arc::new(AtomicU64::new(0)),
            mask_failures: Arc::new(AtomicU64::new(0)),
            frames_with_reference: Arc::new(AtomicU64::new(0)),
            curve_frames: Arc::new(AtomicU64::new(0)),
            commands_sent: Arc::new(AtomicU64::new(0)),
            commands_throttled: Arc::new(AtomicU64::new(0)),
            send_failures: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            read_misses: self.read_misses.load(Ordering::Relaxed),
            mask_failures: self.mask_failures.load(Ordering::Relaxed),
            frames_with_reference: self.frames_with_reference.load(Ordering::Relaxed),
            curve_frames: self.curve_frames.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_throttled: self.commands_throttled.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub read_misses: u64,
    pub mask_failures: u64,
    pub frames_with_reference: u64,
    pub curve_frames: u64,
    pub commands_sent: u64,
    pub commands_throttled: u64,
    pub send_failures: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let reporter = metrics.clone();

        metrics.inc(&metrics.total_frames);
        metrics.inc(&metrics.total_frames);
        metrics.inc(&metrics.send_failures);

        let summary = reporter.summary();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.send_failures, 1);
        assert_eq!(summary.commands_sent, 0);
    }

    #[test]
    fn test_summary_serializes() {
        let metrics = PipelineMetrics::new();
        metrics.set_timing(&metrics.frame_time_us, 1500);
        let json = serde_json::to_value(metrics.summary()).unwrap();
        assert_eq!(json["last_frame_us"], 1500);
        assert!(json.get("commands_throttled").is_some());
    }
}
