// src/pipeline/snapshot.rs
//
// Read-only view published after every tick. External readers never
// touch tracker state directly.

use crate::types::BallId;
use crate::vision::motion_gate::MotionState;
use crate::vision::pockets::Pocket;
use crate::vision::referee::RefereeState;
use crate::vision::table_calibrator::{CalibrationSource, TableCalibration};
use crate::vision::tracking::BallCircle;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub tick: u64,
    pub timestamp_ms: f64,
    pub motion_percent: f64,
    pub motion_state: MotionState,
    pub table_detected: bool,
    pub table: Option<TableCalibration>,
    pub calibration_source: Option<CalibrationSource>,
    pub pockets: Vec<Pocket>,
    pub pocket_count: usize,
    pub balls_near_pockets: usize,
    pub balls: BTreeMap<BallId, BallCircle>,
    pub cue_visible: bool,
    /// Visible object balls, e.g. "1, 3, 7" or "none"
    pub visibility: String,
    pub referee_state: RefereeState,
    pub active_ball: BallId,
    /// Corner clicks collected while a table capture is running
    pub table_capture: Option<usize>,
    pub pocket_capture: Option<usize>,
}

impl TrackerSnapshot {
    pub fn empty(active_ball: BallId) -> Self {
        Self {
            tick: 0,
            timestamp_ms: 0.0,
            motion_percent: 0.0,
            motion_state: MotionState::Idle,
            table_detected: false,
            table: None,
            calibration_source: None,
            pockets: Vec::new(),
            pocket_count: 0,
            balls_near_pockets: 0,
            balls: BTreeMap::new(),
            cue_visible: false,
            visibility: "none".to_string(),
            referee_state: RefereeState::Armed,
            active_ball,
            table_capture: None,
            pocket_capture: None,
        }
    }

    pub fn is_visible(&self, ball: BallId) -> bool {
        self.balls.contains_key(&ball)
    }
}
