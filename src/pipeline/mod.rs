// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod tracker;

pub use event_bus::{EventBus, PipelineEvent};
pub use frame_context::FrameContext;
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use scheduler::DetectionScheduler;
pub use session::{Session, TickOutcome};
pub use snapshot::TrackerSnapshot;
pub use tracker::{CalibrationCommand, TableTracker};
