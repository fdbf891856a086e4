// src/pipeline/frame_context.rs
//
// Everything one detection cycle found, in processing-space coordinates.
// Built once per cycle and read by the smoother, pocket counter and
// referee so they all see the same frame. The source frame itself is
// not kept.

use crate::types::BallId;
use crate::vision::pockets::Pocket;
use crate::vision::table_calibrator::TableCalibration;
use crate::vision::tracking::BallCircle;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    pub tick: u64,
    pub timestamp_ms: f64,
    pub table: Option<TableCalibration>,
    pub pockets: Vec<Pocket>,
    /// Best observation per ball, projected back out of canonical space
    pub observations: BTreeMap<BallId, BallCircle>,
}

impl FrameContext {
    pub fn new(tick: u64, timestamp_ms: f64) -> Self {
        Self {
            tick,
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn observed_ids(&self) -> BTreeSet<BallId> {
        self.observations.keys().copied().collect()
    }
}
