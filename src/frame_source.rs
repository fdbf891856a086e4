// src/frame_source.rs
//
// Where frames come from. A session acquires its source exactly once;
// after that a missing frame is just "not ready yet".

use crate::error::AcquireError;
use crate::types::Frame;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub trait FrameSource {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    fn open(&mut self) -> Result<(), AcquireError>;

    fn is_frame_ready(&self) -> bool;

    /// Next frame, or None when nothing is available this tick.
    fn latest_frame(&mut self) -> Result<Option<Frame>>;

    /// True once a finite source has delivered its last frame.
    fn is_exhausted(&self) -> bool;

    fn release(&mut self);
}

// ============================================================================
// IMAGE SEQUENCE
// ============================================================================

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Replays a directory of still frames in file-name order. Timestamps are
/// derived from the configured frame rate.
pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: f64,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: impl AsRef<Path>, fps: f64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            fps: if fps > 0.0 { fps } else { 30.0 },
            files: Vec::new(),
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }

    fn open(&mut self) -> Result<(), AcquireError> {
        let dir_name = self.dir.display().to_string();
        match std::fs::read_dir(&self.dir) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(AcquireError::PermissionDenied(dir_name));
            }
            Err(e) => return Err(AcquireError::SourceUnavailable(format!("{}: {}", dir_name, e))),
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && Self::is_image(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(AcquireError::NoFrames(dir_name));
        }
        info!("Found {} frames in {}", files.len(), dir_name);
        self.files = files;
        self.next = 0;
        Ok(())
    }

    fn is_frame_ready(&self) -> bool {
        self.next < self.files.len()
    }

    fn latest_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let timestamp_ms = self.next as f64 * 1000.0 / self.fps;
        self.next += 1;

        let image = image::open(path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?
            .to_rgb8();
        debug!("Frame {} ← {}", self.next, path.display());
        Ok(Some(Frame::from_rgb_image(image, timestamp_ms)))
    }

    fn is_exhausted(&self) -> bool {
        !self.files.is_empty() && self.next >= self.files.len()
    }

    fn release(&mut self) {
        self.files.clear();
        self.next = 0;
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Pre-built frames, handed out in order. Used by tests and replays that
/// synthesize their input.
#[derive(Default)]
pub struct SyntheticSource {
    frames: VecDeque<Frame>,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            opened: false,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic ({} frames)", self.frames.len())
    }

    fn open(&mut self) -> Result<(), AcquireError> {
        if self.frames.is_empty() {
            return Err(AcquireError::NoFrames("synthetic source is empty".to_string()));
        }
        self.opened = true;
        Ok(())
    }

    fn is_frame_ready(&self) -> bool {
        self.opened && !self.frames.is_empty()
    }

    fn latest_frame(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            return Ok(None);
        }
        Ok(self.frames.pop_front())
    }

    fn is_exhausted(&self) -> bool {
        self.opened && self.frames.is_empty()
    }

    fn release(&mut self) {
        self.frames.clear();
        self.opened = false;
    }
}

// ============================================================================
// CAMERA / VIDEO (OpenCV)
// ============================================================================

#[cfg(feature = "opencv")]
pub use camera::CameraSource;

#[cfg(feature = "opencv")]
mod camera {
    use super::FrameSource;
    use crate::error::AcquireError;
    use crate::types::Frame;
    use anyhow::Result;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
    };
    use std::time::Instant;
    use tracing::info;

    enum Target {
        Device(i32),
        File(String),
    }

    /// Live device or video file through OpenCV's videoio.
    pub struct CameraSource {
        target: Target,
        cap: Option<VideoCapture>,
        fps: f64,
        frames_read: u64,
        opened_at: Instant,
        exhausted: bool,
    }

    impl CameraSource {
        pub fn device(index: i32) -> Self {
            Self::with_target(Target::Device(index))
        }

        pub fn file(path: &str) -> Self {
            Self::with_target(Target::File(path.to_string()))
        }

        fn with_target(target: Target) -> Self {
            Self {
                target,
                cap: None,
                fps: 30.0,
                frames_read: 0,
                opened_at: Instant::now(),
                exhausted: false,
            }
        }

        fn is_file(&self) -> bool {
            matches!(self.target, Target::File(_))
        }
    }

    impl FrameSource for CameraSource {
        fn describe(&self) -> String {
            match &self.target {
                Target::Device(i) => format!("camera #{}", i),
                Target::File(p) => format!("video {}", p),
            }
        }

        fn open(&mut self) -> Result<(), AcquireError> {
            let unavailable = |e: opencv::Error| AcquireError::SourceUnavailable(e.to_string());
            let cap = match &self.target {
                Target::Device(i) => VideoCapture::new(*i, videoio::CAP_ANY).map_err(unavailable)?,
                Target::File(p) => VideoCapture::from_file(p, videoio::CAP_ANY).map_err(unavailable)?,
            };
            if !cap.is_opened().map_err(unavailable)? {
                return Err(AcquireError::SourceUnavailable(self.describe()));
            }

            let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS).unwrap_or(0.0);
            if fps > 0.0 {
                self.fps = fps;
            }
            let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
            let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
            info!(
                "Opened {}: {}x{} @ {:.1} FPS",
                self.describe(),
                width as i32,
                height as i32,
                self.fps
            );

            self.cap = Some(cap);
            self.frames_read = 0;
            self.opened_at = Instant::now();
            self.exhausted = false;
            Ok(())
        }

        fn is_frame_ready(&self) -> bool {
            self.cap.is_some() && !self.exhausted
        }

        fn latest_frame(&mut self) -> Result<Option<Frame>> {
            let is_file = self.is_file();
            let Some(cap) = self.cap.as_mut() else {
                return Ok(None);
            };

            let mut mat = Mat::default();
            if !VideoCaptureTrait::read(cap, &mut mat)? || mat.empty() {
                if is_file {
                    self.exhausted = true;
                }
                return Ok(None);
            }
            self.frames_read += 1;

            let timestamp_ms = if is_file {
                self.frames_read as f64 / self.fps * 1000.0
            } else {
                self.opened_at.elapsed().as_secs_f64() * 1000.0
            };

            let mut rgb = Mat::default();
            imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
            let data = rgb.data_bytes()?.to_vec();

            Ok(Some(Frame {
                data,
                width: rgb.cols() as usize,
                height: rgb.rows() as usize,
                timestamp_ms,
            }))
        }

        fn is_exhausted(&self) -> bool {
            self.exhausted
        }

        fn release(&mut self) {
            if let Some(mut cap) = self.cap.take() {
                let _ = cap.release();
            }
        }
    }
}
