// src/pipeline/session.rs
//
// Explicit lifecycle: acquire → tick* → stop. A session that failed to
// acquire its source never exists, so every tick can assume an open
// source. Stopping releases the source and discards all tracking state.

use super::event_bus::PipelineEvent;
use super::snapshot::TrackerSnapshot;
use super::tracker::{CalibrationCommand, TableTracker};
use crate::error::AcquireError;
use crate::frame_source::FrameSource;
use crate::sink::DecisionSink;
use crate::types::Config;
use crate::vision::referee::{DecisionKind, RefereeDecision};
use anyhow::Result;
use tracing::{info, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No frame was ready
    Idle,
    Processed { decision: Option<RefereeDecision> },
    /// Finite source delivered its last frame
    Exhausted,
}

pub struct Session<S: FrameSource> {
    source: S,
    tracker: TableTracker,
    running: bool,
}

impl<S: FrameSource> Session<S> {
    pub fn acquire(config: Config, mut source: S) -> Result<Self, AcquireError> {
        source.open()?;
        info!("✓ Acquired {}", source.describe());
        Ok(Self {
            source,
            tracker: TableTracker::new(config),
            running: true,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pull at most one frame and run it through the tracker. Decisions are
    /// forwarded to `sink` before returning.
    pub fn tick(&mut self, sink: &mut dyn DecisionSink) -> Result<TickOutcome> {
        if !self.running {
            return Ok(TickOutcome::Exhausted);
        }
        if self.source.is_exhausted() {
            return Ok(TickOutcome::Exhausted);
        }
        if !self.source.is_frame_ready() {
            return Ok(TickOutcome::Idle);
        }

        let frame = match self.source.latest_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(TickOutcome::Idle),
            Err(e) => {
                // a corrupt frame is skipped, the stream goes on
                warn!("Frame read failed: {:#}", e);
                return Ok(TickOutcome::Idle);
            }
        };

        let decision = self.tracker.step(&frame);
        if let Some(d) = &decision {
            match d.kind {
                DecisionKind::Pot => sink.pot(d.subject),
                DecisionKind::Foul => sink.foul(),
            }
        }
        Ok(TickOutcome::Processed { decision })
    }

    pub fn apply(&mut self, command: CalibrationCommand) {
        self.tracker.apply(command);
    }

    pub fn snapshot(&self) -> &TrackerSnapshot {
        self.tracker.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.tracker.drain_events()
    }

    pub fn tracker(&self) -> &TableTracker {
        &self.tracker
    }

    /// Release the source and drop all session state.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.source.release();
        self.tracker.reset();
        info!("Session stopped, {} released", self.source.describe());
    }
}

impl<S: FrameSource> Drop for Session<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::SyntheticSource;
    use crate::sink::RecordingSink;
    use crate::types::Frame;

    fn make_frame(value: u8, timestamp_ms: f64) -> Frame {
        Frame::new(vec![value; 64 * 36 * 3], 64, 36, timestamp_ms)
    }

    #[test]
    fn test_acquire_fails_without_frames() {
        let result = Session::acquire(Config::default(), SyntheticSource::default());
        assert!(matches!(result, Err(AcquireError::NoFrames(_))));
    }

    #[test]
    fn test_runs_until_exhausted_then_stops() {
        let frames = (0..5).map(|i| make_frame(50, i as f64 * 33.0));
        let mut session = Session::acquire(Config::default(), SyntheticSource::new(frames)).unwrap();
        let mut sink = RecordingSink::default();

        let mut processed = 0;
        loop {
            match session.tick(&mut sink).unwrap() {
                TickOutcome::Processed { .. } => processed += 1,
                TickOutcome::Exhausted => break,
                TickOutcome::Idle => {}
            }
        }
        assert_eq!(processed, 5);
        assert_eq!(session.snapshot().tick, 5);
        assert!(sink.decisions.is_empty());

        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.snapshot().tick, 0);
        assert_eq!(session.tick(&mut sink).unwrap(), TickOutcome::Exhausted);
    }
}
