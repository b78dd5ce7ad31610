// src/pipeline/orchestrator.rs
//
// One control loop: frame -> mask -> band midpoints -> lane error -> PID ->
// motor speeds -> dispatch. Every stage is owned here, so two loops in one
// process share no controller or throttle state.

use super::metrics::{MetricsSummary, PipelineMetrics};
use crate::control::{DriveMapper, LaneEstimate, LaneEstimator, PidController, PidOutput};
use crate::debug::DebugRecorder;
use crate::dispatch::{CommandDispatcher, DispatchOutcome, MotorTransport};
use crate::perception::{MaskProducer, RoiBandExtractor};
use crate::types::{BandMidpoints, Config, Frame, MotorCommand, RunConfig};
use crate::video_processor::{FrameRead, FrameSource};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything computed for one frame
#[derive(Debug)]
pub struct FrameReport {
    pub frame_index: u64,
    pub midpoints: BandMidpoints,
    pub estimate: LaneEstimate,
    pub pid: PidOutput,
    pub command: MotorCommand,
    pub outcome: DispatchOutcome,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let found = self.midpoints.values().filter(|m| m.is_some()).count();
        write!(
            f,
            "Frame {}: {}/{} bands, x={:.0} error={:+.1} (dt={:.3} d={:+.2}) correction={:+.2} -> left={} right={} ",
            self.frame_index,
            found,
            self.midpoints.len(),
            self.estimate.reference_x,
            self.estimate.error,
            self.pid.dt,
            self.pid.derivative,
            self.pid.correction,
            self.command.left_speed,
            self.command.right_speed,
        )?;
        match &self.outcome {
            DispatchOutcome::Sent => write!(f, "sent"),
            DispatchOutcome::Throttled => write!(f, "throttled"),
            DispatchOutcome::Failed(e) => write!(f, "failed ({})", e),
        }
    }
}

pub struct ControlLoop {
    mask: Box<dyn MaskProducer>,
    extractor: RoiBandExtractor,
    estimator: LaneEstimator,
    pid: PidController,
    drive: DriveMapper,
    dispatcher: CommandDispatcher,
    recorder: Option<DebugRecorder>,
    metrics: PipelineMetrics,
    frame_index: u64,
}

impl ControlLoop {
    pub fn new(
        config: &Config,
        mask: Box<dyn MaskProducer>,
        transport: Box<dyn MotorTransport>,
    ) -> Result<Self> {
        let dispatcher = CommandDispatcher::new(
            transport,
            config.dispatch.send_interval_secs,
            Duration::from_millis(config.dispatch.timeout_ms),
        );
        let recorder = DebugRecorder::from_config(&config.debug)?;

        info!(
            "✓ Control loop ready (mask: {}, transport: {}, bands {:?}/{})",
            mask.name(),
            dispatcher.transport_name(),
            config.roi.active_bands,
            config.roi.total_bands
        );

        Ok(Self {
            mask,
            extractor: RoiBandExtractor::new(&config.roi),
            estimator: LaneEstimator::new(&config.lane),
            pid: PidController::new(&config.pid),
            drive: DriveMapper::new(&config.drive),
            dispatcher,
            recorder,
            metrics: PipelineMetrics::new(),
            frame_index: 0,
        })
    }

    #[cfg(test)]
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    #[cfg(test)]
    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Run every stage on one frame. `frame.timestamp` is the controller's
    /// clock. Only mask production can fail.
    pub async fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        let start = Instant::now();
        let frame_index = self.frame_index;
        self.frame_index += 1;
        self.metrics.inc(&self.metrics.total_frames);

        let mask = self
            .mask
            .produce(frame)
            .with_context(|| format!("Mask production failed on frame {}", frame_index))?;

        let midpoints = self.extractor.extract(&mask);
        let estimate = self.estimator.estimate(&midpoints, frame.width);
        if estimate.reference_found {
            self.metrics.inc(&self.metrics.frames_with_reference);
        }
        if !estimate.is_straight {
            self.metrics.inc(&self.metrics.curve_frames);
        }

        let pid = self.pid.step(estimate.error, frame.timestamp);
        let command = self.drive.command(pid.correction, estimate.is_straight);

        let outcome = self.dispatcher.dispatch(command, frame.timestamp).await;
        match &outcome {
            DispatchOutcome::Sent => self.metrics.inc(&self.metrics.commands_sent),
            DispatchOutcome::Throttled => self.metrics.inc(&self.metrics.commands_throttled),
            DispatchOutcome::Failed(_) => self.metrics.inc(&self.metrics.send_failures),
        }

        if let Some(recorder) = &self.recorder {
            let layout = self.extractor.layout(frame.height);
            if let Err(e) = recorder.record(
                frame_index,
                frame,
                &layout,
                self.extractor.active_bands(),
                &midpoints,
            ) {
                warn!("Debug snapshot failed: {:#}", e);
            }
        }

        self.metrics
            .set_timing(&self.metrics.frame_time_us, start.elapsed().as_micros() as u64);

        let report = FrameReport {
            frame_index,
            midpoints,
            estimate,
            pid,
            command,
            outcome,
        };
        debug!("{}", report);
        Ok(report)
    }

    /// Pull frames until the stop flag is set, the source ends, or a limit
    /// from `run` is hit.
    pub async fn run(
        &mut self,
        source: &mut dyn FrameSource,
        stop: &AtomicBool,
        run: &RunConfig,
    ) -> Result<MetricsSummary> {
        let backoff = Duration::from_millis(run.miss_backoff_ms);
        let mut frames_read: u64 = 0;
        let mut consecutive_misses: u32 = 0;

        // A new run must not integrate across the gap since the last one
        self.pid.reset();
        info!("🚦 Control loop running");

        loop {
            if stop.load(Ordering::Relaxed) {
                info!("🛑 Stop requested");
                break;
            }
            if run.max_frames.is_some_and(|max| frames_read >= max) {
                info!("Reached frame limit ({})", frames_read);
                break;
            }

            let frame = match source.read() {
                FrameRead::Frame(frame) => frame,
                FrameRead::Miss => {
                    self.metrics.inc(&self.metrics.read_misses);
                    consecutive_misses += 1;
                    if run.max_consecutive_misses > 0
                        && consecutive_misses >= run.max_consecutive_misses
                    {
                        warn!(
                            "⚠️  {} consecutive read misses, treating source as ended",
                            consecutive_misses
                        );
                        break;
                    }
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
                FrameRead::EndOfStream => {
                    info!("Source reached end of stream");
                    break;
                }
            };

            consecutive_misses = 0;
            frames_read += 1;

            if let Err(e) = self.process_frame(&frame).await {
                self.metrics.inc(&self.metrics.mask_failures);
                warn!("⚠️  Skipping frame: {:#}", e);
            }
        }

        Ok(self.metrics.summary())
    }
}
