// src/vision/mod.rs
//
// Per-frame vision stages, leaves first:
//
//   Frame ─► MotionGate (every tick)
//         └► TableCalibrator ─► PerspectiveNormalizer ─► BallDetector
//                                        │                    │
//                                        ▼                    ▼
//                                  PocketLocator       TrackingSmoother ─► Referee

pub mod ball_detector;
pub mod color;
pub mod geometry;
pub mod motion_gate;
pub mod perspective;
pub mod pockets;
pub mod referee;
pub mod table_calibrator;
pub mod tracking;

pub use ball_detector::{BallDetector, BallDetectorConfig, BallObservation};
pub use color::{BallProfile, ColorProfile, HsvRange};
pub use motion_gate::{GrayFrame, MotionEvent, MotionGate, MotionGateConfig, MotionState};
pub use perspective::{Homography, PerspectiveNormalizer};
pub use pockets::{Pocket, PocketConfig, PocketLocator};
pub use referee::{DecisionKind, Referee, RefereeConfig, RefereeDecision, RefereeState};
pub use table_calibrator::{CalibrationSource, TableCalibration, TableCalibrator, TableCalibratorConfig};
pub use tracking::{BallCircle, TrackedBall, TrackingSmoother};
