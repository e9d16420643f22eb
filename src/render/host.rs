use std::sync::Arc;

use super::canvas::Surface;
use super::color::{ColorSpace, HDR_CHANNEL_MAX};
use super::gpu::GpuContext;
use crate::error::ContextError;

/// Lifecycle and surface services a visualization borrows from whatever
/// drives it (window, offscreen encoder, test harness).
pub trait RenderLoopHost {
    fn size(&self) -> (u32, u32);
    /// Gate for one frame; false while paused.
    fn begin_frame(&mut self) -> bool;
    fn pause(&mut self);
    fn resume(&mut self);
    fn is_paused(&self) -> bool;
    /// Allocate a surface of the current size in `space`.
    fn create_context(&self, space: ColorSpace) -> Result<Surface, ContextError>;
    fn resize(&mut self, width: u32, height: u32);
    fn destroy(&mut self);
}

/// Host without a display: frames are rendered on demand and read back.
pub struct OffscreenHost {
    gpu: Arc<GpuContext>,
    width: u32,
    height: u32,
    hdr: bool,
    paused: bool,
    frames: u64,
    destroyed: bool,
}

impl OffscreenHost {
    pub fn new(gpu: Arc<GpuContext>, width: u32, height: u32, hdr: bool) -> Self {
        Self {
            gpu,
            width,
            height,
            hdr,
            paused: false,
            frames: 0,
            destroyed: false,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl RenderLoopHost for OffscreenHost {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> bool {
        if self.paused || self.destroyed {
            return false;
        }
        self.frames += 1;
        true
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn create_context(&self, space: ColorSpace) -> Result<Surface, ContextError> {
        let headroom = match space {
            ColorSpace::DisplayP3 if !self.hdr => {
                return Err(ContextError::UnsupportedColorSpace(space));
            }
            ColorSpace::DisplayP3 => HDR_CHANNEL_MAX as f32,
            ColorSpace::Srgb => 1.0,
        };
        Surface::new(Arc::clone(&self.gpu), self.width, self.height, space, headroom)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}
