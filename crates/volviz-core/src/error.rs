//! Error types for volviz-core.

use thiserror::Error;

/// The main error type for data-model operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A transfer function needs at least two control points.
    #[error("transfer function needs at least 2 control points, got {0}")]
    NotEnoughControlPoints(usize),

    /// Control points must be sorted ascending by value.
    #[error("control points not sorted ascending by value (index {0})")]
    UnsortedControlPoints(usize),

    /// A control point value or opacity lies outside [0, 1].
    #[error("control point {index} out of range: value={value}, opacity={opacity}")]
    ControlPointOutOfRange {
        index: usize,
        value: f32,
        opacity: f32,
    },

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The volume has no voxels.
    #[error("volume has no voxels")]
    EmptyVolume,

    /// Statistics were required but have not been computed.
    #[error("volume statistics not computed - call compute_histogram first")]
    StatsNotComputed,

    /// A persisted volume record is malformed.
    #[error("malformed volume file: {0}")]
    MalformedVolume(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for volviz-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
