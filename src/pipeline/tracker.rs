// src/pipeline/tracker.rs
//
// The single owned aggregate behind a session. One `step` per frame:
//
//   1. motion gate on every tick
//   2. every Nth tick: resample to processing size, calibrate, warp,
//      detect balls, locate pockets, smooth, referee
//   3. publish events and refresh the snapshot
//
// All coordinates leaving this module are in processing space
// (detection.process_width × process_height), which is also the space
// manual calibration clicks are given in.

use super::event_bus::{EventBus, PipelineEvent};
use super::frame_context::FrameContext;
use super::metrics::PipelineMetrics;
use super::scheduler::DetectionScheduler;
use super::snapshot::TrackerSnapshot;
use crate::types::{BallId, Config, Frame, Point2};
use crate::vision::ball_detector::BallDetector;
use crate::vision::color::{to_hsv, BallProfile};
use crate::vision::motion_gate::{MotionEvent, MotionGate};
use crate::vision::perspective::PerspectiveNormalizer;
use crate::vision::pockets::{count_near_pockets, PocketCaptureOutcome, PocketLocator, POCKET_COUNT};
use crate::vision::referee::{DecisionKind, Referee, RefereeDecision};
use crate::vision::table_calibrator::{CaptureOutcome, TableCalibrator, TABLE_CORNERS};
use crate::vision::tracking::{visibility_summary, BallCircle, TrackingSmoother};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

const EVENT_BUS_CAPACITY: usize = 256;

/// Operator input for manual calibration and referee control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationCommand {
    BeginTableCapture,
    BeginPocketCapture,
    /// A click in processing-space coordinates
    Click(Point2),
    ClearTable,
    ClearPockets,
    SetActiveBall(BallId),
    SetRefereeEnabled(bool),
}

pub struct TableTracker {
    config: Config,
    profiles: Vec<BallProfile>,
    motion: MotionGate,
    scheduler: DetectionScheduler,
    calibrator: TableCalibrator,
    detector: BallDetector,
    pockets: PocketLocator,
    smoother: TrackingSmoother,
    referee: Referee,
    bus: EventBus,
    metrics: PipelineMetrics,
    snapshot: TrackerSnapshot,
    last_context: FrameContext,
}

impl TableTracker {
    pub fn new(config: Config) -> Self {
        let (pw, ph) = (config.detection.process_width, config.detection.process_height);
        let profiles = config.balls.clone();
        let ids: Vec<BallId> = profiles.iter().map(|p| p.ball).collect();

        Self {
            motion: MotionGate::new(config.motion.clone()),
            scheduler: DetectionScheduler::new(config.detection.interval),
            calibrator: TableCalibrator::new(config.table.clone(), pw, ph),
            detector: BallDetector::new(config.detection.balls.clone()),
            pockets: PocketLocator::new(config.pockets.clone(), pw, ph),
            smoother: TrackingSmoother::new(config.tracking.smoothing_alpha, ids),
            referee: Referee::new(config.referee.clone()),
            bus: EventBus::new(EVENT_BUS_CAPACITY),
            metrics: PipelineMetrics::new(),
            snapshot: TrackerSnapshot::empty(config.referee.active_ball),
            last_context: FrameContext::default(),
            profiles,
            config,
        }
    }

    pub fn snapshot(&self) -> &TrackerSnapshot {
        &self.snapshot
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn smoother(&self) -> &TrackingSmoother {
        &self.smoother
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.bus.drain()
    }

    // ========================================================================
    // PER-FRAME STEP
    // ========================================================================

    /// Process one frame. Returns the referee decision, if one fired.
    pub fn step(&mut self, frame: &Frame) -> Option<RefereeDecision> {
        self.metrics.inc(&self.metrics.total_ticks);

        let reading = self.motion.process(frame);
        let detect = self.scheduler.should_detect();
        let tick = self.scheduler.ticks();

        for motion in reading.events {
            if matches!(motion, MotionEvent::Started { .. }) {
                self.metrics.inc(&self.metrics.motion_starts);
            }
            self.bus.publish(PipelineEvent::Motion { tick, motion });
        }

        let mut decision = None;
        if detect {
            let started = Instant::now();
            let ctx = self.detect(frame, tick);
            decision = self.apply_context(&ctx);
            self.metrics
                .set_timing(&self.metrics.detection_time_us, started.elapsed().as_micros() as u64);
            self.last_context = ctx;
        }

        self.refresh_snapshot(tick, frame.timestamp_ms);
        decision
    }

    /// Calibration, warp, ball detection and pocket layout for one frame.
    fn detect(&mut self, frame: &Frame, tick: u64) -> FrameContext {
        let mut ctx = FrameContext::new(tick, frame.timestamp_ms);
        let Some(image) = self.resample(frame) else {
            debug!("Tick {}: frame buffer inconsistent, skipping detection", tick);
            return ctx;
        };

        ctx.table = self.calibrator.calibrate(&image);
        let (ww, wh) = (self.config.detection.warp_width, self.config.detection.warp_height);
        let normalizer = ctx
            .table
            .as_ref()
            .and_then(|t| PerspectiveNormalizer::new(t, ww, wh));

        if let Some(norm) = &normalizer {
            let hsv = to_hsv(&norm.warp(&image));
            for (ball, found) in self.detector.detect_all(&hsv, &self.profiles) {
                if let Some(best) = found.first() {
                    let (center, radius) = norm.circle_to_camera(best.center, best.radius);
                    ctx.observations.insert(ball, BallCircle { center, radius });
                }
            }
        }
        ctx.pockets = self.pockets.locate(normalizer.as_ref());

        debug!(
            "Tick {}: table={} balls={} pockets={}",
            tick,
            ctx.has_table(),
            ctx.observations.len(),
            ctx.pockets.len()
        );
        ctx
    }

    fn resample(&self, frame: &Frame) -> Option<RgbImage> {
        let view = frame.view()?;
        let (pw, ph) = (self.config.detection.process_width, self.config.detection.process_height);
        if view.dimensions() == (pw, ph) {
            return RgbImage::from_raw(pw, ph, frame.data.clone());
        }
        Some(imageops::resize(&view, pw, ph, FilterType::Triangle))
    }

    fn apply_context(&mut self, ctx: &FrameContext) -> Option<RefereeDecision> {
        self.metrics.inc(&self.metrics.detection_cycles);

        match (self.last_context.table.is_some(), ctx.table) {
            (false, Some(calibration)) => {
                info!("✓ Table detected ({:?})", calibration.source);
                self.bus.publish(PipelineEvent::TableFound {
                    tick: ctx.tick,
                    calibration,
                });
            }
            (true, None) => {
                info!("Table lost");
                self.bus.publish(PipelineEvent::TableLost { tick: ctx.tick });
            }
            _ => {}
        }
        if ctx.has_table() {
            self.metrics.inc(&self.metrics.cycles_with_table);
        }

        self.smoother.update(&ctx.observations);

        let decision = self.referee.evaluate(
            ctx.timestamp_ms,
            self.motion.state(),
            self.motion.last_movement_ms(),
            &ctx.observed_ids(),
            &mut self.smoother,
        );

        if let Some(d) = decision {
            match d.kind {
                DecisionKind::Pot => self.metrics.inc(&self.metrics.pots),
                DecisionKind::Foul => self.metrics.inc(&self.metrics.fouls),
            }
            self.bus.publish(PipelineEvent::Decision {
                tick: ctx.tick,
                decision: d,
            });
        }
        decision
    }

    fn refresh_snapshot(&mut self, tick: u64, timestamp_ms: f64) {
        let balls: BTreeMap<BallId, BallCircle> = self
            .smoother
            .balls()
            .iter()
            .filter_map(|(id, b)| b.position.map(|p| (*id, p)))
            .collect();
        let visible: Vec<BallId> = balls.keys().copied().collect();
        let pockets = self.last_context.pockets.clone();
        let near = count_near_pockets(
            self.smoother.positions(),
            &pockets,
            self.pockets.config().near_factor,
        );

        self.snapshot = TrackerSnapshot {
            tick,
            timestamp_ms,
            motion_percent: self.motion.latest_percent(),
            motion_state: self.motion.state(),
            table_detected: self.last_context.has_table(),
            table: self.last_context.table,
            calibration_source: self.last_context.table.map(|t| t.source),
            pocket_count: pockets.len(),
            pockets,
            balls_near_pockets: near,
            cue_visible: balls.contains_key(&BallId::White),
            visibility: visibility_summary(&visible),
            balls,
            referee_state: self.referee.state(),
            active_ball: self.referee.active_ball(),
            table_capture: self.calibrator.is_capturing().then(|| self.calibrator.captured()),
            pocket_capture: self.pockets.is_capturing().then(|| self.pockets.captured()),
        };
    }

    // ========================================================================
    // OPERATOR COMMANDS
    // ========================================================================

    pub fn apply(&mut self, command: CalibrationCommand) {
        let had_manual_table = self.calibrator.manual().is_some();
        let had_manual_pockets = self.pockets.manual().is_some();

        match command {
            CalibrationCommand::BeginTableCapture => {
                self.pockets.cancel_capture();
                self.calibrator.begin_capture();
                self.bus.publish(PipelineEvent::TableCalibrationStarted);
            }
            CalibrationCommand::BeginPocketCapture => {
                self.calibrator.cancel_capture();
                self.pockets.begin_capture();
                self.bus.publish(PipelineEvent::PocketCalibrationStarted);
            }
            CalibrationCommand::Click(point) => self.click(point),
            CalibrationCommand::ClearTable => {
                self.calibrator.clear_manual();
                self.bus.publish(PipelineEvent::TableCalibrationCleared);
            }
            CalibrationCommand::ClearPockets => {
                self.pockets.clear_manual();
                self.bus.publish(PipelineEvent::PocketsCleared);
            }
            CalibrationCommand::SetActiveBall(ball) => self.referee.set_active_ball(ball),
            CalibrationCommand::SetRefereeEnabled(enabled) => {
                info!("Automatic referee {}", if enabled { "enabled" } else { "disabled" });
                self.referee.set_enabled(enabled);
            }
        }

        // manual overrides show up immediately, not on the next detection cycle
        match self.calibrator.manual() {
            Some(manual) => self.last_context.table = Some(*manual),
            None if had_manual_table => self.last_context.table = None,
            None => {}
        }
        match self.pockets.manual() {
            Some(manual) => self.last_context.pockets = manual.to_vec(),
            None if had_manual_pockets => self.last_context.pockets.clear(),
            None => {}
        }
        self.refresh_snapshot(self.snapshot.tick, self.snapshot.timestamp_ms);
    }

    fn click(&mut self, point: Point2) {
        if self.calibrator.is_capturing() {
            match self.calibrator.capture_point(point) {
                CaptureOutcome::Collected { collected, needed } => {
                    self.bus.publish(PipelineEvent::CapturePoint {
                        point,
                        collected,
                        needed,
                    });
                }
                CaptureOutcome::Completed(calibration) => {
                    self.bus.publish(PipelineEvent::CapturePoint {
                        point,
                        collected: TABLE_CORNERS,
                        needed: TABLE_CORNERS,
                    });
                    self.bus.publish(PipelineEvent::TableCalibrated { calibration });
                }
                CaptureOutcome::Rejected { .. } => {
                    self.bus.publish(PipelineEvent::CaptureRejected { point });
                }
                CaptureOutcome::Idle => {}
            }
        } else if self.pockets.is_capturing() {
            match self.pockets.capture_point(point) {
                PocketCaptureOutcome::Collected { collected, needed } => {
                    self.bus.publish(PipelineEvent::CapturePoint {
                        point,
                        collected,
                        needed,
                    });
                }
                PocketCaptureOutcome::Completed(pockets) => {
                    self.bus.publish(PipelineEvent::CapturePoint {
                        point,
                        collected: POCKET_COUNT,
                        needed: POCKET_COUNT,
                    });
                    self.bus.publish(PipelineEvent::PocketsCalibrated { pockets });
                }
                PocketCaptureOutcome::Rejected { .. } => {
                    self.bus.publish(PipelineEvent::CaptureRejected { point });
                }
                PocketCaptureOutcome::Idle => {}
            }
        } else {
            debug!("Click at ({:.1}, {:.1}) ignored, no capture running", point.x, point.y);
        }
    }

    /// Discard all session state: motion reference, calibrations,
    /// tracked balls and streaks, pending events.
    pub fn reset(&mut self) {
        self.motion.reset();
        self.scheduler.reset();
        self.calibrator.reset();
        self.pockets.reset();
        self.smoother.reset();
        self.referee.reset();
        self.bus.clear();
        self.last_context = FrameContext::default();
        self.snapshot = TrackerSnapshot::empty(self.referee.active_ball());
    }
}
