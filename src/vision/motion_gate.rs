// src/vision/motion_gate.rs
//
// Frame-to-frame activity gate.
//
// Every tick the source frame is downsampled to a small fixed grid,
// converted to integer luma and compared against the previous tick.
// The share of pixels whose luma moved by more than the noise threshold
// is the motion percentage. A hysteresis on top of it classifies the
// table as Idle or Moving:
//
//   Idle   → Moving  as soon as motion % ≥ threshold
//   Moving → Idle    only after motion stayed below threshold for dwell_ms
//
// Everything downstream that assumes a static scene (referee decisions)
// is gated on this state. Only the previous grayscale frame is retained.

use crate::types::Frame;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionGateConfig {
    /// Motion percentage at or above which the table counts as moving
    pub threshold_percent: f64,
    /// Per-pixel luma delta that counts as a change (strictly greater)
    pub noise_threshold: u8,
    /// Time motion must stay below threshold before returning to Idle
    pub dwell_ms: f64,
    /// Minimum spacing between two MotionPulse notifications
    pub pulse_interval_ms: f64,
    /// Comparison grid
    pub width: u32,
    pub height: u32,
}

impl Default for MotionGateConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 6.0,
            noise_threshold: 22,
            dwell_ms: 700.0,
            pulse_interval_ms: 1500.0,
            width: 280,
            height: 160,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Idle,
    Moving,
}

impl MotionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionState::Idle => "IDLE",
            MotionState::Moving => "MOVING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotionEvent {
    Started { percent: f64, at_ms: f64 },
    Stopped { at_ms: f64 },
    Pulse { percent: f64, at_ms: f64 },
}

/// Result of one gate update.
#[derive(Debug, Clone)]
pub struct MotionReading {
    /// None on the first frame or after a resolution change
    pub percent: Option<f64>,
    pub state: MotionState,
    pub events: Vec<MotionEvent>,
}

// ============================================================================
// GRAYSCALE FRAME
// ============================================================================

/// Row-major luma: pixel at (x, y) = data[y * width + x]
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Integer luma `(77·R + 150·G + 29·B) >> 8` from packed RGB.
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        let gray = rgb
            .chunks_exact(3)
            .map(|p| ((p[0] as u32 * 77 + p[1] as u32 * 150 + p[2] as u32 * 29) >> 8) as u8)
            .collect();
        Self::new(gray, width, height)
    }

    /// Downsample a source frame to the comparison grid, then convert.
    /// None if the frame buffer is inconsistent.
    pub fn from_frame(frame: &Frame, width: u32, height: u32) -> Option<Self> {
        let view = frame.view()?;
        if view.dimensions() == (width, height) {
            return Some(Self::from_rgb(&frame.data, frame.width, frame.height));
        }
        let small = imageops::resize(&view, width, height, FilterType::Triangle);
        Some(Self::from_rgb(small.as_raw(), width as usize, height as usize))
    }
}

/// Percentage of pixels whose luma differs by more than `noise_threshold`.
pub fn motion_percent(current: &GrayFrame, previous: &GrayFrame, noise_threshold: u8) -> f64 {
    let total = current.data.len();
    if total == 0 {
        return 0.0;
    }
    let changed = current
        .data
        .iter()
        .zip(previous.data.iter())
        .filter(|(a, b)| a.abs_diff(**b) > noise_threshold)
        .count();
    changed as f64 / total as f64 * 100.0
}

// ============================================================================
// MOTION GATE
// ============================================================================

pub struct MotionGate {
    config: MotionGateConfig,
    prev: Option<GrayFrame>,
    state: MotionState,
    last_movement_ms: Option<f64>,
    last_pulse_ms: Option<f64>,
    latest_percent: f64,
}

impl MotionGate {
    pub fn new(config: MotionGateConfig) -> Self {
        Self {
            config,
            prev: None,
            state: MotionState::Idle,
            last_movement_ms: None,
            last_pulse_ms: None,
            latest_percent: 0.0,
        }
    }

    pub fn config(&self) -> &MotionGateConfig {
        &self.config
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn latest_percent(&self) -> f64 {
        self.latest_percent
    }

    /// Timestamp of the last tick that was at or above threshold.
    pub fn last_movement_ms(&self) -> Option<f64> {
        self.last_movement_ms
    }

    /// Feed one source frame. Downsamples to the configured grid.
    pub fn process(&mut self, frame: &Frame) -> MotionReading {
        match GrayFrame::from_frame(frame, self.config.width, self.config.height) {
            Some(gray) => self.update(gray, frame.timestamp_ms),
            None => MotionReading {
                percent: None,
                state: self.state,
                events: Vec::new(),
            },
        }
    }

    /// Compare against the retained previous frame and classify.
    /// The first frame, or one whose size differs from the previous, only
    /// replaces the reference.
    pub fn update(&mut self, gray: GrayFrame, now_ms: f64) -> MotionReading {
        let percent = match &self.prev {
            Some(prev) if prev.width == gray.width && prev.height == gray.height => {
                Some(motion_percent(&gray, prev, self.config.noise_threshold))
            }
            _ => None,
        };
        self.prev = Some(gray);

        let events = match percent {
            Some(p) => {
                self.latest_percent = p;
                self.classify(p, now_ms)
            }
            None => Vec::new(),
        };

        MotionReading {
            percent,
            state: self.state,
            events,
        }
    }

    /// Hysteresis step for one measured percentage.
    pub fn classify(&mut self, percent: f64, now_ms: f64) -> Vec<MotionEvent> {
        let mut events = Vec::new();

        if percent >= self.config.threshold_percent {
            if self.state == MotionState::Idle {
                self.state = MotionState::Moving;
                info!("▶ Motion started ({:.1}%)", percent);
                events.push(MotionEvent::Started {
                    percent,
                    at_ms: now_ms,
                });
            }
            self.last_movement_ms = Some(now_ms);

            let pulse_due = self
                .last_pulse_ms
                .map_or(true, |last| now_ms - last > self.config.pulse_interval_ms);
            if pulse_due {
                self.last_pulse_ms = Some(now_ms);
                debug!("Motion pulse {:.1}%", percent);
                events.push(MotionEvent::Pulse {
                    percent,
                    at_ms: now_ms,
                });
            }
        } else if self.state == MotionState::Moving {
            let since = self
                .last_movement_ms
                .map_or(f64::INFINITY, |last| now_ms - last);
            if since > self.config.dwell_ms {
                self.state = MotionState::Idle;
                info!("■ Table settled after {:.0}ms below threshold", since);
                events.push(MotionEvent::Stopped { at_ms: now_ms });
            }
        }

        events
    }

    /// Drop the reference frame and return to Idle.
    pub fn reset(&mut self) {
        self.prev = None;
        self.state = MotionState::Idle;
        self.last_movement_ms = None;
        self.last_pulse_ms = None;
        self.latest_percent = 0.0;
    }
}
