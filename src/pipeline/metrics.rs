// src/pipeline/metrics.rs
//
// Run counters and timings. Cloning shares the counters, so a reporter
// can hold a handle while the session keeps ticking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_ticks: Arc<AtomicU64>,
    pub detection_cycles: Arc<AtomicU64>,
    pub cycles_with_table: Arc<AtomicU64>,
    pub motion_starts: Arc<AtomicU64>,
    pub pots: Arc<AtomicU64>,
    pub fouls: Arc<AtomicU64>,
    pub detection_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_ticks: Arc::new(AtomicU64::new(0)),
            detection_cycles: Arc::new(AtomicU64::new(0)),
            cycles_with_table: Arc::new(AtomicU64::new(0)),
            motion_starts: Arc::new(AtomicU64::new(0)),
            pots: Arc::new(AtomicU64::new(0)),
            fouls: Arc::new(AtomicU64::new(0)),
            detection_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn ticks_per_sec(&self) -> f64 {
        let ticks = self.total_ticks.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            ticks as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let detection_cycles = self.detection_cycles.load(Ordering::Relaxed);
        let with_table = self.cycles_with_table.load(Ordering::Relaxed);
        MetricsSummary {
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
            ticks_per_sec: self.ticks_per_sec(),
            detection_cycles,
            table_visible_pct: if detection_cycles > 0 {
                with_table as f64 / detection_cycles as f64 * 100.0
            } else {
                0.0
            },
            motion_starts: self.motion_starts.load(Ordering::Relaxed),
            pots: self.pots.load(Ordering::Relaxed),
            fouls: self.fouls.load(Ordering::Relaxed),
            last_detection_us: self.detection_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub ticks_per_sec: f64,
    pub detection_cycles: u64,
    pub table_visible_pct: f64,
    pub motion_starts: u64,
    pub pots: u64,
    pub fouls: u64,
    pub last_detection_us: u64,
    pub elapsed_secs: f64,
}
