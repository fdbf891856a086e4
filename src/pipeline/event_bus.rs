// src/pipeline/event_bus.rs
//
// Decoupled event system. Stages publish events instead of calling
// into consumers; the session drains the bus after every tick.

use crate::types::Point2;
use crate::vision::motion_gate::MotionEvent;
use crate::vision::pockets::Pocket;
use crate::vision::referee::RefereeDecision;
use crate::vision::table_calibrator::TableCalibration;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Motion {
        tick: u64,
        #[serde(flatten)]
        motion: MotionEvent,
    },

    /// Automatic detection found the table after a cycle without it
    TableFound {
        tick: u64,
        calibration: TableCalibration,
    },

    TableLost {
        tick: u64,
    },

    TableCalibrationStarted,

    TableCalibrated {
        calibration: TableCalibration,
    },

    TableCalibrationCleared,

    PocketCalibrationStarted,

    PocketsCalibrated {
        pockets: Vec<Pocket>,
    },

    PocketsCleared,

    CapturePoint {
        point: Point2,
        collected: usize,
        needed: usize,
    },

    CaptureRejected {
        point: Point2,
    },

    Decision {
        tick: u64,
        decision: RefereeDecision,
    },
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        bus.publish(PipelineEvent::TableLost { tick: 1 });
        bus.publish(PipelineEvent::TableLost { tick: 2 });
        bus.publish(PipelineEvent::TableLost { tick: 3 });
        assert_eq!(bus.pending_count(), 2);

        let drained = bus.drain();
        assert!(matches!(drained[0], PipelineEvent::TableLost { tick: 2 }));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_events_serialize_tagged() {
        let json = serde_json::to_value(PipelineEvent::Motion {
            tick: 4,
            motion: MotionEvent::Pulse {
                percent: 7.5,
                at_ms: 120.0,
            },
        })
        .unwrap();
        assert_eq!(json["event"], "motion");
        assert_eq!(json["type"], "pulse");
        assert_eq!(json["percent"], 7.5);
        assert_eq!(json["tick"], 4);
        // the motion payload is inlined, not nested
        assert!(json.get("motion").is_none());
    }
}
