//! Shared output surface.
//!
//! The composite stage writes the final image into a texture that another
//! party (the windowing collaborator, a screenshot encoder) also reads. Both
//! sides must hold the surface exclusively while touching it, so access goes
//! through an [`ExclusiveFlag`] and the RAII [`SurfaceWriteGuard`] that
//! releases it on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// Format of the shared output image.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A one-owner-at-a-time flag.
///
/// `try_acquire` either takes ownership or reports the flag busy; it never
/// blocks. Dropping the surface guard releases it.
#[derive(Debug, Default)]
pub struct ExclusiveFlag {
    held: AtomicBool,
}

impl ExclusiveFlag {
    /// Creates a released flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take the flag. Returns `false` if someone already holds it.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases the flag.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether the flag is currently held.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// The output texture the composite stage writes and the host displays.
pub struct SharedOutputSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    lock: Arc<ExclusiveFlag>,
}

impl SharedOutputSurface {
    /// Allocates an output surface. Zero-area extents are rejected.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedSurface { width, height });
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shared Output Surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width,
            height,
            lock: Arc::new(ExclusiveFlag::new()),
        })
    }

    /// Acquires the surface for writing.
    ///
    /// Fails with [`RenderError::OutputSurfaceBusy`] if a reader or another
    /// writer holds it; the caller should retry on the next frame rather
    /// than wait.
    pub fn acquire_write(&self) -> RenderResult<SurfaceWriteGuard<'_>> {
        if !self.lock.try_acquire() {
            return Err(RenderError::OutputSurfaceBusy);
        }
        Ok(SurfaceWriteGuard { surface: self })
    }

    /// The shared lock, for handing to the reading side.
    #[must_use]
    pub fn lock(&self) -> Arc<ExclusiveFlag> {
        Arc::clone(&self.lock)
    }

    /// The underlying texture.
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Surface extent.
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Write access to the output surface; releases the lock on drop.
pub struct SurfaceWriteGuard<'a> {
    surface: &'a SharedOutputSurface,
}

impl SurfaceWriteGuard<'_> {
    /// The view to bind as the composite stage's output.
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.surface.view
    }
}

impl Drop for SurfaceWriteGuard<'_> {
    fn drop(&mut self) {
        self.surface.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_acquires_once() {
        let flag = ExclusiveFlag::new();
        assert!(flag.try_acquire());
        assert!(!flag.try_acquire());
        flag.release();
        assert!(flag.try_acquire());
    }

    #[test]
    fn test_flag_visible_across_threads() {
        let flag = Arc::new(ExclusiveFlag::new());
        assert!(flag.try_acquire());

        let other = Arc::clone(&flag);
        let handle = std::thread::spawn(move || other.try_acquire());
        assert!(!handle.join().unwrap());

        flag.release();
        assert!(!flag.is_held());
    }
}
