// src/types.rs

use crate::vision::ball_detector::BallDetectorConfig;
use crate::vision::color::{default_ball_profiles, BallProfile};
use crate::vision::motion_gate::MotionGateConfig;
use crate::vision::pockets::PocketConfig;
use crate::vision::referee::RefereeConfig;
use crate::vision::table_calibrator::TableCalibratorConfig;
use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub motion: MotionGateConfig,
    pub table: TableCalibratorConfig,
    pub detection: DetectionConfig,
    pub pockets: PocketConfig,
    pub tracking: TrackingConfig,
    pub referee: RefereeConfig,
    pub balls: Vec<BallProfile>,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motion: MotionGateConfig::default(),
            table: TableCalibratorConfig::default(),
            detection: DetectionConfig::default(),
            pockets: PocketConfig::default(),
            tracking: TrackingConfig::default(),
            referee: RefereeConfig::default(),
            balls: default_ball_profiles(),
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Full detection runs on every Nth tick; the motion gate runs on all of them.
    pub interval: u32,
    /// Resolution every frame is resampled to before calibration and detection.
    /// Manual calibration clicks are expressed in this coordinate space.
    pub process_width: u32,
    pub process_height: u32,
    /// Canonical (de-warped) table rectangle.
    pub warp_width: u32,
    pub warp_height: u32,
    pub balls: BallDetectorConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval: 3,
            process_width: 640,
            process_height: 360,
            warp_width: 960,
            warp_height: 480,
            balls: BallDetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub smoothing_alpha: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Directory of still frames replayed in file-name order
    Images,
    /// Live capture device (requires the `opencv` feature)
    Camera,
    /// Video file (requires the `opencv` feature)
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: String,
    pub device_index: i32,
    /// Replay rate used to timestamp still-image sequences
    pub fps: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Images,
            path: "frames".to_string(),
            device_index: 0,
            fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub events_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            events_path: "output/events.jsonl".to_string(),
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
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// FRAMES & GEOMETRY
// ============================================================================

/// Packed RGB frame, 3 bytes per pixel, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp_ms: f64) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage, timestamp_ms: f64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width: width as usize,
            height: height as usize,
            timestamp_ms,
        }
    }

    /// Borrowing image view over the packed buffer.
    /// None if the buffer length does not match the dimensions.
    pub fn view(&self) -> Option<ImageBuffer<Rgb<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width as u32, self.height as u32, self.data.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() < self.width * self.height * 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ============================================================================
// BALL IDENTITY
// ============================================================================

/// Tracked ball identity: the cue ball or a numbered object ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BallId {
    White,
    Number(u8),
}

impl BallId {
    pub fn is_cue(&self) -> bool {
        matches!(self, BallId::White)
    }
}

impl fmt::Display for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BallId::White => write!(f, "white"),
            BallId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for BallId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("white") || s.eq_ignore_ascii_case("cue") {
            return Ok(BallId::White);
        }
        match s.parse::<u8>() {
            Ok(n) if n > 0 => Ok(BallId::Number(n)),
            _ => Err(format!("invalid ball id '{}' (expected 'white' or a ball number)", s)),
        }
    }
}

impl TryFrom<String> for BallId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BallId> for String {
    fn from(id: BallId) -> Self {
        id.to_string()
    }
}
