// src/error.rs

use thiserror::Error;

/// Terminal failures when a session tries to acquire its frame source.
/// Once acquired, missing frames are transient and never surface as errors.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Device or path could not be opened
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// The platform refused access to the capture device
    #[error("permission denied for frame source: {0}")]
    PermissionDenied(String),

    /// Opened, but there is nothing to read
    #[error("frame source has no frames: {0}")]
    NoFrames(String),
}
