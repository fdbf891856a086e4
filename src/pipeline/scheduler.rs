// src/pipeline/scheduler.rs
//
// Full detection (calibration, warp, ball segmentation) is too heavy for
// every frame. The motion gate runs every tick; detection runs on every
// Nth tick.

use tracing::debug;

pub struct DetectionScheduler {
    interval: u32,
    ticks: u64,
    detections: u64,
}

impl DetectionScheduler {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            ticks: 0,
            detections: 0,
        }
    }

    /// Advance one tick; true when this tick should run detection.
    pub fn should_detect(&mut self) -> bool {
        self.ticks += 1;
        let run = self.ticks % self.interval as u64 == 0;
        if run {
            self.detections += 1;
            debug!("Detection cycle {} (tick {})", self.detections, self.ticks);
        }
        run
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
        self.detections = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_third_tick() {
        let mut s = DetectionScheduler::new(3);
        let runs: Vec<bool> = (0..9).map(|_| s.should_detect()).collect();
        assert_eq!(
            runs,
            vec![false, false, true, false, false, true, false, false, true]
        );
        assert_eq!(s.detections(), 3);
    }

    #[test]
    fn test_zero_interval_runs_every_tick() {
        let mut s = DetectionScheduler::new(0);
        assert!(s.should_detect());
        assert!(s.should_detect());
    }
}
