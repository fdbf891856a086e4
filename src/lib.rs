// src/lib.rs
//
// Overhead-camera pool table tracker: finds the table and its pockets,
// follows the balls and raises pot/foul decisions once play has settled.

pub mod config;
pub mod error;
pub mod frame_source;
pub mod pipeline;
pub mod sink;
pub mod types;
pub mod vision;

pub use error::AcquireError;
pub use frame_source::{FrameSource, ImageSequenceSource, SyntheticSource};
pub use pipeline::{CalibrationCommand, PipelineEvent, Session, TickOutcome, TrackerSnapshot};
pub use sink::{DecisionSink, JsonlEventWriter, LoggingSink, RecordingSink};
pub use types::{BallId, Config, Frame, Point2};

#[cfg(feature = "opencv")]
pub use frame_source::CameraSource;
