//! Common error types for lumen-tracking.

use thiserror::Error;

/// Camera service errors.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to open camera: {0}")]
    Open(String),
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("camera is not capturing")]
    NotCapturing,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
