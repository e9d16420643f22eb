use thiserror::Error;

use crate::render::color::ColorSpace;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("color space {0:?} is not supported by this host")]
    UnsupportedColorSpace(ColorSpace),
    #[error("surface of {0}x{1} exceeds the maximum dimension")]
    TooLarge(u32, u32),
    #[error("surface must be at least 1x1")]
    EmptySurface,
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("frame readback failed: {0}")]
    Readback(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer has been destroyed")]
    Destroyed,
    #[error("playback speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),
    #[error("drawing context unavailable: {0}")]
    Context(#[from] ContextError),
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("fft size must be a power of two between 32 and 32768, got {0}")]
    InvalidFftSize(usize),
    #[error("sample rate must be positive")]
    InvalidSampleRate,
}
