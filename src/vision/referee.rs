// src/vision/referee.rs
//
// Automatic pot/foul decisions from sustained ball absence.
//
//   Armed    table moving, or inside the settle grace window
//   Deciding settled; absent balls accumulate missing streaks
//   Fired    a decision is being emitted; drops straight back to Armed
//            once the decision is handed out
//
// Pot is evaluated before Foul. When both thresholds are crossed in
// the same cycle only the Pot fires; the cue ball's streak is left
// untouched and is evaluated again next cycle.

use super::motion_gate::MotionState;
use super::tracking::TrackingSmoother;
use crate::types::BallId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeConfig {
    /// Emit decisions at all; streaks are tracked either way
    pub enabled: bool,
    /// Quiet time after the last movement before decisions are considered
    pub settle_grace_ms: f64,
    /// Missing cycles before the active ball counts as potted
    pub pot_threshold: u32,
    /// Missing cycles before the cue ball counts as a foul
    pub foul_threshold: u32,
    /// Object ball currently on
    pub active_ball: BallId,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_grace_ms: 2500.0,
            pot_threshold: 10,
            foul_threshold: 12,
            active_ball: BallId::Number(1),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefereeState {
    Armed,
    Deciding,
    Fired,
}

impl RefereeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefereeState::Armed => "ARMED",
            RefereeState::Deciding => "DECIDING",
            RefereeState::Fired => "FIRED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Pot,
    Foul,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionEvidence {
    /// Streak value that crossed the threshold
    pub missing_streak: u32,
    pub threshold: u32,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefereeDecision {
    pub kind: DecisionKind,
    pub subject: BallId,
    pub evidence: DecisionEvidence,
}

// ============================================================================
// REFEREE
// ============================================================================

pub struct Referee {
    config: RefereeConfig,
    state: RefereeState,
    decisions_emitted: u64,
}

impl Referee {
    pub fn new(config: RefereeConfig) -> Self {
        Self {
            config,
            state: RefereeState::Armed,
            decisions_emitted: 0,
        }
    }

    pub fn state(&self) -> RefereeState {
        self.state
    }

    pub fn active_ball(&self) -> BallId {
        self.config.active_ball
    }

    pub fn set_active_ball(&mut self, ball: BallId) {
        if ball != self.config.active_ball {
            info!("Active ball → {}", ball);
            self.config.active_ball = ball;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn decisions_emitted(&self) -> u64 {
        self.decisions_emitted
    }

    fn is_settled(&self, motion: MotionState, last_movement_ms: Option<f64>, now_ms: f64) -> bool {
        if motion == MotionState::Moving {
            return false;
        }
        last_movement_ms.map_or(true, |last| now_ms - last >= self.config.settle_grace_ms)
    }

    /// One detection cycle. `observed` holds the balls with a qualifying
    /// detection this cycle; streaks live in `tracker`.
    pub fn evaluate(
        &mut self,
        now_ms: f64,
        motion: MotionState,
        last_movement_ms: Option<f64>,
        observed: &BTreeSet<BallId>,
        tracker: &mut TrackingSmoother,
    ) -> Option<RefereeDecision> {
        let settled = self.is_settled(motion, last_movement_ms, now_ms);

        for (id, streak) in tracker.streaks_mut() {
            if observed.contains(&id) {
                *streak = 0;
            } else if settled {
                *streak += 1;
            }
        }

        if !settled {
            self.state = RefereeState::Armed;
            return None;
        }
        self.state = RefereeState::Deciding;

        if !self.config.enabled {
            return None;
        }

        let active = self.config.active_ball;
        let (pot_threshold, foul_threshold) = (self.config.pot_threshold, self.config.foul_threshold);
        let mut decision = None;
        if !active.is_cue() {
            decision = self.try_fire(tracker, active, DecisionKind::Pot, pot_threshold, now_ms);
        }
        if decision.is_none() {
            decision = self.try_fire(tracker, BallId::White, DecisionKind::Foul, foul_threshold, now_ms);
        }

        if decision.is_some() {
            debug!("Referee {} → {}", RefereeState::Fired.as_str(), RefereeState::Armed.as_str());
            self.state = RefereeState::Armed;
        }
        decision
    }

    fn try_fire(
        &mut self,
        tracker: &mut TrackingSmoother,
        subject: BallId,
        kind: DecisionKind,
        threshold: u32,
        now_ms: f64,
    ) -> Option<RefereeDecision> {
        let (_, streak) = tracker.streaks_mut().find(|(id, _)| *id == subject)?;
        if *streak < threshold {
            return None;
        }

        let decision = RefereeDecision {
            kind,
            subject,
            evidence: DecisionEvidence {
                missing_streak: *streak,
                threshold,
                timestamp_ms: now_ms,
            },
        };
        *streak = 0;
        self.state = RefereeState::Fired;
        self.decisions_emitted += 1;

        match kind {
            DecisionKind::Pot => info!("🎱 Pot: ball {} missing for {} cycles", subject, threshold),
            DecisionKind::Foul => info!("⚠ Foul: cue ball missing for {} cycles", threshold),
        }
        debug!("Decision evidence: {:?}", decision.evidence);
        Some(decision)
    }

    /// Back to Armed, e.g. when the session stops.
    pub fn reset(&mut self) {
        self.state = RefereeState::Armed;
    }
}
