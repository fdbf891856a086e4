// src/vision/tracking.rs
//
// Per-ball exponential smoothing plus a raw missing-streak counter.
//
// The streak counts consecutive detection cycles without an observation
// of that ball; the referee reads and resets it. Smoothing never
// extrapolates: a ball that isn't seen this cycle has no position.

use crate::types::{BallId, Point2};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BallCircle {
    pub center: Point2,
    pub radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackedBall {
    pub position: Option<BallCircle>,
    pub missing_streak: u32,
}

pub struct TrackingSmoother {
    alpha: f64,
    balls: BTreeMap<BallId, TrackedBall>,
}

impl TrackingSmoother {
    /// Every id in `ids` is tracked from the start with a zero streak.
    pub fn new(alpha: f64, ids: impl IntoIterator<Item = BallId>) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            balls: ids.into_iter().map(|id| (id, TrackedBall::default())).collect(),
        }
    }

    /// Blend this cycle's observations into the tracked positions.
    /// Balls absent from `observed` lose their position.
    pub fn update(&mut self, observed: &BTreeMap<BallId, BallCircle>) {
        let a = self.alpha;
        for (id, ball) in self.balls.iter_mut() {
            ball.position = match (ball.position, observed.get(id)) {
                (Some(prev), Some(curr)) => Some(BallCircle {
                    center: Point2::new(
                        prev.center.x * (1.0 - a) + curr.center.x * a,
                        prev.center.y * (1.0 - a) + curr.center.y * a,
                    ),
                    radius: prev.radius * (1.0 - a) + curr.radius * a,
                }),
                (None, Some(curr)) => Some(*curr),
                (_, None) => None,
            };
        }
        // ids outside the configured set start tracking on first sight
        for (id, circle) in observed {
            self.balls.entry(*id).or_insert_with(|| TrackedBall {
                position: Some(*circle),
                missing_streak: 0,
            });
        }
    }

    pub fn get(&self, id: BallId) -> Option<&TrackedBall> {
        self.balls.get(&id)
    }

    pub fn balls(&self) -> &BTreeMap<BallId, TrackedBall> {
        &self.balls
    }

    /// Streak counters, owned by the referee between cycles.
    pub fn streaks_mut(&mut self) -> impl Iterator<Item = (BallId, &mut u32)> + '_ {
        self.balls.iter_mut().map(|(id, b)| (*id, &mut b.missing_streak))
    }

    pub fn missing_streak(&self, id: BallId) -> u32 {
        self.balls.get(&id).map_or(0, |b| b.missing_streak)
    }

    /// Ids with a current position, in ascending order (white first).
    pub fn visible_ids(&self) -> Vec<BallId> {
        self.balls
            .iter()
            .filter(|(_, b)| b.position.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Point2> + '_ {
        self.balls
            .values()
            .filter_map(|b| b.position.as_ref().map(|c| &c.center))
    }

    /// Drop positions and zero streaks, keeping the tracked id set.
    pub fn reset(&mut self) {
        for ball in self.balls.values_mut() {
            *ball = TrackedBall::default();
        }
    }
}

/// Human-readable visibility line: object balls in number order, or
/// "none". The cue ball is reported separately.
pub fn visibility_summary(visible: &[BallId]) -> String {
    let numbers: Vec<String> = visible
        .iter()
        .filter(|id| !id.is_cue())
        .map(|id| id.to_string())
        .collect();
    if numbers.is_empty() {
        "none".to_string()
    } else {
        numbers.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(x: f64, y: f64, r: f64) -> BallCircle {
        BallCircle {
            center: Point2::new(x, y),
            radius: r,
        }
    }

    #[test]
    fn test_first_observation_taken_as_is() {
        let mut s = TrackingSmoother::new(0.42, [BallId::White]);
        let obs = BTreeMap::from([(BallId::White, circle(100.0, 50.0, 8.0))]);
        s.update(&obs);
        assert_eq!(s.get(BallId::White).unwrap().position, Some(circle(100.0, 50.0, 8.0)));
    }

    #[test]
    fn test_exponential_blend() {
        let mut s = TrackingSmoother::new(0.42, [BallId::Number(1)]);
        s.update(&BTreeMap::from([(BallId::Number(1), circle(0.0, 0.0, 10.0))]));
        s.update(&BTreeMap::from([(BallId::Number(1), circle(100.0, 50.0, 20.0))]));
        let p = s.get(BallId::Number(1)).unwrap().position.unwrap();
        assert!((p.center.x - 42.0).abs() < 1e-9);
        assert!((p.center.y - 21.0).abs() < 1e-9);
        assert!((p.radius - 14.2).abs() < 1e-9);
    }

    #[test]
    fn test_missing_drops_position() {
        let mut s = TrackingSmoother::new(0.42, [BallId::White]);
        s.update(&BTreeMap::from([(BallId::White, circle(1.0, 1.0, 5.0))]));
        s.update(&BTreeMap::new());
        assert!(s.get(BallId::White).unwrap().position.is_none());
        // reappearance restarts from the raw observation
        s.update(&BTreeMap::from([(BallId::White, circle(9.0, 9.0, 5.0))]));
        assert_eq!(s.get(BallId::White).unwrap().position, Some(circle(9.0, 9.0, 5.0)));
    }

    #[test]
    fn test_visibility_summary() {
        assert_eq!(visibility_summary(&[]), "none");
        assert_eq!(visibility_summary(&[BallId::White]), "none");
        assert_eq!(
            visibility_summary(&[BallId::White, BallId::Number(1), BallId::Number(3), BallId::Number(7)]),
            "1, 3, 7"
        );
    }

    #[test]
    fn test_reset_clears_streaks() {
        let mut s = TrackingSmoother::new(0.42, [BallId::White, BallId::Number(2)]);
        for (_, streak) in s.streaks_mut() {
            *streak = 5;
        }
        assert_eq!(s.missing_streak(BallId::Number(2)), 5);
        s.reset();
        assert_eq!(s.missing_streak(BallId::Number(2)), 0);
        assert!(s.visible_ids().is_empty());
    }
}
