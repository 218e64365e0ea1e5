//! Data model for volviz-rs.
//!
//! This crate holds everything the renderer consumes but the GPU never owns:
//! - [`VolumeDataset`]: the voxel grid with spacing, statistics, and histogram
//! - [`TransferFunctionTable`]: dense RGBA lookup table resampled from sparse
//!   control points
//! - Persisted volume I/O (the fixed-layout `.bin` record)

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod io;
pub mod transfer_function;
pub mod volume;

pub use error::{CoreError, Result};
pub use io::{load_volume, read_volume, save_volume, write_volume};
pub use transfer_function::{
    ControlPoint, TransferFunctionPreset, TransferFunctionTable, TF_RESOLUTION,
};
pub use volume::{VolumeDataset, VolumeStats, DEFAULT_HISTOGRAM_BINS};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec3, Vec4};
