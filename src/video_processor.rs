// src/video_processor.rs

use crate::preprocessing::resize_frame;
use crate::types::{Frame, SourceConfig, SourceKind};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Result of one read from a frame source
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// Nothing this time; the source may still produce frames later
    Miss,
    /// The source will never produce another frame
    EndOfStream,
}

pub trait FrameSource: Send {
    fn read(&mut self) -> FrameRead;
}

/// Open the configured source. Failing to open is a startup error.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match config.kind {
        SourceKind::Image => Box::new(StillImageSource::open(&config.uri)?),
        SourceKind::Camera | SourceKind::Stream | SourceKind::File => open_capture(config)?,
    };

    Ok(match config.resize {
        Some([w, h]) => Box::new(Resized {
            inner: source,
            width: w,
            height: h,
        }),
        None => source,
    })
}

#[cfg(feature = "camera")]
fn open_capture(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(capture::CaptureSource::open(config)?))
}

#[cfg(not(feature = "camera"))]
fn open_capture(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "Source kind {:?} requires building with the `camera` feature",
        config.kind
    )
}

struct Resized {
    inner: Box<dyn FrameSource>,
    width: usize,
    height: usize,
}

impl FrameSource for Resized {
    fn read(&mut self) -> FrameRead {
        match self.inner.read() {
            FrameRead::Frame(frame) => {
                FrameRead::Frame(resize_frame(&frame, self.width, self.height))
            }
            other => other,
        }
    }
}

// ============================================================================
// STILL IMAGE
// ============================================================================

/// Returns the same image on every read, stamped with the time since open.
pub struct StillImageSource {
    frame: Frame,
    started: Instant,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening image: {}", path.display());

        let img = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();

        info!("Image properties: {}x{}", width, height);
        Ok(Self::from_frame(Frame {
            data: img.into_raw(),
            width: width as usize,
            height: height as usize,
            timestamp: 0.0,
        }))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            frame,
            started: Instant::now(),
        }
    }
}

impl FrameSource for StillImageSource {
    fn read(&mut self) -> FrameRead {
        let mut frame = self.frame.clone();
        frame.timestamp = self.started.elapsed().as_secs_f64();
        FrameRead::Frame(frame)
    }
}

// ============================================================================
// OPENCV CAPTURE
// ============================================================================

#[cfg(feature = "camera")]
mod capture {
    use super::{FrameRead, FrameSource};
    use crate::types::{Frame, SourceConfig, SourceKind};
    use anyhow::{Context, Result};
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
    };
    use std::time::Instant;
    use tracing::{debug, info};

    pub struct CaptureSource {
        cap: VideoCapture,
        /// Files end; cameras and streams only miss
        finite: bool,
        started: Instant,
        current_frame: u64,
    }

    impl CaptureSource {
        pub fn open(config: &SourceConfig) -> Result<Self> {
            info!("Opening {:?} source: {}", config.kind, config.uri);

            let cap = match config.kind {
                SourceKind::Camera => {
                    let index: i32 = config
                        .uri
                        .parse()
                        .with_context(|| format!("Camera uri must be a device index, got {}", config.uri))?;
                    VideoCapture::new(index, videoio::CAP_ANY)?
                }
                _ => VideoCapture::from_file(&config.uri, videoio::CAP_ANY)?,
            };

            if !cap.is_opened()? {
                anyhow::bail!("Unable to open video source: {}", config.uri);
            }

            let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)?;
            let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)?;
            let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
            info!("Video properties: {}x{} @ {:.1} FPS", width, height, fps);

            Ok(Self {
                cap,
                finite: config.kind == SourceKind::File,
                started: Instant::now(),
                current_frame: 0,
            })
        }

        fn grab(&mut self) -> Result<Option<Frame>> {
            let mut mat = Mat::default();
            if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color_def(&mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

            self.current_frame += 1;
            Ok(Some(Frame {
                data: rgb.data_bytes()?.to_vec(),
                width: rgb.cols() as usize,
                height: rgb.rows() as usize,
                timestamp: self.started.elapsed().as_secs_f64(),
            }))
        }
    }

    impl FrameSource for CaptureSource {
        fn read(&mut self) -> FrameRead {
            match self.grab() {
                Ok(Some(frame)) => FrameRead::Frame(frame),
                Ok(None) if self.finite => {
                    info!("End of video after {} frames", self.current_frame);
                    FrameRead::EndOfStream
                }
                Ok(None) => {
                    debug!("Failed to grab frame");
                    FrameRead::Miss
                }
                Err(e) => {
                    debug!("Frame read error: {}", e);
                    FrameRead::Miss
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a fixed list of reads, then reports end of stream.
    pub(crate) struct ScriptedSource {
        pub reads: VecDeque<FrameRead>,
    }

    impl ScriptedSource {
        pub fn new(reads: Vec<FrameRead>) -> Self {
            Self {
                reads: reads.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> FrameRead {
            self.reads.pop_front().unwrap_or(FrameRead::EndOfStream)
        }
    }

    fn gray(w: usize, h: usize) -> Frame {
        Frame {
            data: vec![128; w * h * 3],
            width: w,
            height: h,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_still_image_repeats() {
        let mut src = StillImageSource::from_frame(gray(4, 4));
        let mut last = -1.0;
        for _ in 0..3 {
            match src.read() {
                FrameRead::Frame(f) => {
                    assert!(f.timestamp >= last);
                    assert_eq!(f.data.len(), 48);
                    last = f.timestamp;
                }
                other => panic!("expected frame, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_still_image_from_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.png");
        image::RgbImage::from_pixel(16, 8, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut src = StillImageSource::open(&path).unwrap();
        match src.read() {
            FrameRead::Frame(f) => {
                assert_eq!((f.width, f.height), (16, 8));
                assert_eq!(f.pixel(3, 3), [10, 20, 30]);
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_image_is_startup_error() {
        let config = SourceConfig {
            kind: SourceKind::Image,
            uri: "/nonexistent/track.png".to_string(),
            resize: None,
        };
        assert!(open_source(&config).is_err());
    }

    #[test]
    fn test_resize_wrapper_passes_through_misses() {
        let mut src = Resized {
            inner: Box::new(ScriptedSource::new(vec![
                FrameRead::Frame(gray(8, 8)),
                FrameRead::Miss,
            ])),
            width: 4,
            height: 2,
        };
        match src.read() {
            FrameRead::Frame(f) => assert_eq!((f.width, f.height), (4, 2)),
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(matches!(src.read(), FrameRead::Miss));
        assert!(matches!(src.read(), FrameRead::EndOfStream));
    }
}
