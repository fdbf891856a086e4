// tests/referee_scenarios.rs
use table_referee::pipeline::{PipelineEvent, Session, TableTracker, TickOutcome};
use table_referee::sink::{RecordedDecision, RecordingSink};
use table_referee::types::{BallId, Config, Frame, Point2};
use table_referee::vision::{DecisionKind, MotionState};
use table_referee::{CalibrationCommand, SyntheticSource};

const W: u32 = 640;
const H: u32 = 360;
const RAIL: [u8; 3] = [60, 60, 70];
const FELT: [u8; 3] = [20, 120, 110];
const TABLE: (u32, u32, u32, u32) = (40, 30, 600, 330);

fn ball_color(id: BallId) -> [u8; 3] {
    match id {
        BallId::White => [245, 245, 245],
        BallId::Number(1) => [230, 200, 30],
        BallId::Number(2) => [30, 60, 220],
        BallId::Number(3) => [220, 20, 20],
        BallId::Number(4) => [120, 40, 170],
        BallId::Number(5) => [240, 110, 20],
        BallId::Number(6) => [30, 160, 40],
        _ => [20, 20, 20],
    }
}

fn ball_position(id: BallId) -> (i32, i32) {
    match id {
        BallId::White => (150, 100),
        BallId::Number(n) if n <= 3 => (150 + 100 * n as i32, 100),
        BallId::Number(n) => (150 + 100 * (n as i32 - 4), 250),
    }
}

fn all_balls() -> Vec<BallId> {
    std::iter::once(BallId::White)
        .chain((1..=7).map(BallId::Number))
        .collect()
}

/// Static overhead view: rail border, felt rectangle, the given balls.
fn make_table_frame(balls: &[BallId], timestamp_ms: f64) -> Frame {
    let (x0, y0, x1, y1) = TABLE;
    let mut img = image::RgbImage::from_fn(W, H, |x, y| {
        if x >= x0 && x < x1 && y >= y0 && y < y1 {
            image::Rgb(FELT)
        } else {
            image::Rgb(RAIL)
        }
    });
    let r = 7i32;
    for &id in balls {
        let (cx, cy) = ball_position(id);
        for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    img.put_pixel(x as u32, y as u32, image::Rgb(ball_color(id)));
                }
            }
        }
    }
    Frame::from_rgb_image(img, timestamp_ms)
}

#[test]
fn test_all_balls_detected_on_synthetic_table() {
    let mut tracker = TableTracker::new(Config::default());
    for i in 0..3 {
        tracker.step(&make_table_frame(&all_balls(), i as f64 * 33.0));
    }
    let snap = tracker.snapshot();
    assert!(snap.table_detected);
    assert_eq!(snap.pocket_count, 6);
    assert!(snap.cue_visible);
    assert_eq!(snap.visibility, "1, 2, 3, 4, 5, 6, 7");

    for id in all_balls() {
        let (x, y) = ball_position(id);
        let seen = snap.balls[&id];
        let err = seen.center.distance(&Point2::new(x as f64, y as f64));
        assert!(err < 2.5, "ball {} off by {:.2}px", id, err);
    }
}

#[test]
fn test_pot_for_active_ball_after_settle() {
    let mut config = Config::default();
    config.referee.active_ball = BallId::Number(3);

    let without_three: Vec<BallId> = all_balls()
        .into_iter()
        .filter(|b| *b != BallId::Number(3))
        .collect();

    // 2 detection cycles with every ball, then ball 3 gone for 10 cycles
    let mut frames = Vec::new();
    for i in 0..6 {
        frames.push(make_table_frame(&all_balls(), i as f64 * 33.0));
    }
    for i in 6..36 {
        frames.push(make_table_frame(&without_three, i as f64 * 33.0));
    }

    let mut session = Session::acquire(config, SyntheticSource::new(frames)).unwrap();
    let mut sink = RecordingSink::default();
    let mut fired_at = None;
    let mut tick = 0;

    loop {
        match session.tick(&mut sink).unwrap() {
            TickOutcome::Processed { decision } => {
                tick += 1;
                assert_eq!(session.snapshot().motion_state, MotionState::Idle);
                if let Some(d) = decision {
                    assert!(fired_at.is_none(), "second decision at tick {}", tick);
                    assert_eq!(d.kind, DecisionKind::Pot);
                    assert_eq!(d.subject, BallId::Number(3));
                    assert_eq!(session.tracker().smoother().missing_streak(BallId::Number(3)), 0);
                    fired_at = Some(tick);
                }
            }
            TickOutcome::Exhausted => break,
            TickOutcome::Idle => {}
        }
    }

    // tick 36 is the 10th detection cycle without ball 3
    assert_eq!(fired_at, Some(36));
    assert_eq!(sink.decisions, vec![RecordedDecision::Pot(BallId::Number(3))]);
    assert_eq!(session.tracker().smoother().missing_streak(BallId::White), 0);

    let decisions = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::Decision { .. }))
        .count();
    assert_eq!(decisions, 1);
}

#[test]
fn test_moving_table_never_decides() {
    let mut config = Config::default();
    config.referee.active_ball = BallId::Number(3);
    let mut tracker = TableTracker::new(config);

    // alternate bright/dark frames: constant motion, ball 3 never visible
    for i in 0..60 {
        let value = if i % 2 == 0 { 0 } else { 255 };
        let frame = Frame::new(vec![value; (W * H * 3) as usize], W as usize, H as usize, i as f64 * 33.0);
        assert!(tracker.step(&frame).is_none());
    }
    assert_eq!(tracker.smoother().missing_streak(BallId::Number(3)), 0);
}

fn manual_pockets(walk: &[(f64, f64)]) -> Vec<(String, Point2, f64)> {
    let mut tracker = TableTracker::new(Config::default());
    tracker.apply(CalibrationCommand::BeginTableCapture);
    for &(x, y) in walk {
        tracker.apply(CalibrationCommand::Click(Point2::new(x, y)));
    }
    assert!(tracker.snapshot().table_detected);

    let blank = Frame::new(vec![0u8; (W * H * 3) as usize], W as usize, H as usize, 0.0);
    for _ in 0..3 {
        tracker.step(&blank);
    }
    tracker
        .snapshot()
        .pockets
        .iter()
        .map(|p| (p.name.clone(), p.center, p.radius))
        .collect()
}

#[test]
fn test_manual_calibration_walk_order_independent() {
    let corners = [(62.0, 41.0), (588.0, 35.0), (603.0, 322.0), (45.0, 330.0)];
    let clockwise = manual_pockets(&corners);
    let scrambled = manual_pockets(&[corners[2], corners[0], corners[3], corners[1]]);
    let reversed = manual_pockets(&[corners[3], corners[2], corners[1], corners[0]]);

    assert_eq!(clockwise.len(), 6);
    assert_eq!(clockwise, scrambled);
    assert_eq!(clockwise, reversed);
    assert_eq!(clockwise[0].0, "top-left");
    assert!(clockwise[0].1.distance(&Point2::new(62.0, 41.0)) < 10.0);
}
