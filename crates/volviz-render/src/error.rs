//! Rendering error types.

use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The device reported a validation or internal error during a frame.
    #[error("device error: {0}")]
    DeviceError(String),

    /// The device ran out of memory.
    #[error("out of device memory")]
    OutOfMemory,

    /// The shared output surface is already acquired by another writer.
    #[error("output surface already acquired")]
    OutputSurfaceBusy,

    /// No output surface has been attached to the renderer.
    #[error("no output surface attached")]
    NoOutputSurface,

    /// A surface or target with a zero dimension was requested.
    #[error("zero-sized surface: {width}x{height}")]
    ZeroSizedSurface { width: u32, height: u32 },
}

impl RenderError {
    /// Maps a captured device error scope result.
    #[must_use]
    pub fn from_device_error(error: &wgpu::Error) -> Self {
        match error {
            wgpu::Error::OutOfMemory { .. } => RenderError::OutOfMemory,
            other => RenderError::DeviceError(other.to_string()),
        }
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
