//! The rave visualization: a morphing polar ring with a zooming feedback trail.
//!
//! Each frame redraws the previous trail slightly enlarged and darkened, adds
//! the colored layers, snapshots that into the trail buffer, then draws the
//! white highlight layer on top so it never enters the trail.

use super::canvas::{Paint, Surface};
use super::color::{Color, ColorSpace};
use super::features::FeatureState;
use super::host::RenderLoopHost;
use super::shapes::{draw_inner, draw_inner_mask, draw_outer, Pass, Radii, ShapeContext};
use crate::audio::analyzer::{AnalysisSource, BandConfig, DataSet, DataType, FilterConfig};
use crate::error::{ContextError, RenderError};

/// Per-frame zoom of the trail, divided by speed.
pub const TRAIL_ZOOM: f64 = 0.04;
/// Per-frame opacity of the black decay wash, divided by speed.
pub const TRAIL_DECAY: f64 = 0.05;

/// Band 0 feeds the waveform and spectrum, band 1 the bass envelope.
pub fn band_configs() -> Vec<BandConfig> {
    vec![
        BandConfig {
            filters: vec![FilterConfig::lowpass(5000.0)],
            smoothing_time_constant: 0.2,
            min_decibels: -70.0,
            max_decibels: -30.0,
            data_type: DataType::Byte,
            data_set: DataSet::Both,
        },
        BandConfig {
            filters: vec![FilterConfig::lowpass(100.0)],
            data_type: DataType::Float,
            data_set: DataSet::Time,
            ..BandConfig::default()
        },
    ]
}

/// Lifecycle as seen between frames. A frame in flight holds `&mut Rave`,
/// so it can neither be observed nor re-entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Destroyed,
}

struct Surfaces {
    canvas: Surface,
    trail: Surface,
}

pub struct Rave<H: RenderLoopHost, A: AnalysisSource> {
    host: H,
    analyzer: A,
    surfaces: Option<Surfaces>,
    features: FeatureState,
    radii: Radii,
}

impl<H: RenderLoopHost, A: AnalysisSource> Rave<H, A> {
    pub fn new(host: H, mut analyzer: A, speed: f64) -> Result<Self, RenderError> {
        check_speed(speed)?;
        analyzer.set_options(&band_configs());

        let canvas = acquire_context(&host)?;
        let trail = host.create_context(canvas.color_space())?;
        let (width, height) = host.size();
        log::info!(
            "Rave renderer ready: {}x{}, {:?} context, speed {}",
            width,
            height,
            canvas.color_space(),
            speed
        );

        Ok(Self {
            host,
            analyzer,
            surfaces: Some(Surfaces { canvas, trail }),
            features: FeatureState::new(speed),
            radii: Radii::from_height(height),
        })
    }

    /// Draw one frame. Returns `Ok(false)` without drawing while the host is paused.
    pub fn render(&mut self) -> Result<bool, RenderError> {
        self.render_passes(true)
    }

    fn render_passes(&mut self, highlights: bool) -> Result<bool, RenderError> {
        let Some(surfaces) = self.surfaces.as_mut() else {
            return Err(RenderError::Destroyed);
        };
        if !self.host.begin_frame() {
            return Ok(false);
        }
        let frame = self.analyzer.get_data();
        self.features.update(&frame);

        let ctx = ShapeContext {
            frame: &frame,
            features: &self.features,
            radii: self.radii,
        };
        let Surfaces { canvas, trail } = surfaces;
        composite_trail(canvas, trail, &ctx, self.features.speed());
        if highlights {
            draw_inner(canvas, &ctx, Pass::White);
            draw_outer(canvas, &ctx, Pass::White);
        }

        Ok(true)
    }

    /// Resize both surfaces (discarding their content) and recompute the radii.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let surfaces = self.surfaces.as_mut().ok_or(RenderError::Destroyed)?;
        surfaces.canvas.resize(width, height)?;
        surfaces.trail.resize(width, height)?;
        self.host.resize(width, height);
        self.radii = Radii::from_height(height);
        log::debug!(
            "Resized to {}x{} (r1={:.2}, r2={:.2})",
            width,
            height,
            self.radii.r1,
            self.radii.r2
        );
        Ok(())
    }

    /// Release the surfaces and history. Any later call reports `Destroyed`.
    pub fn destroy(&mut self) -> Result<(), RenderError> {
        if self.surfaces.take().is_none() {
            return Err(RenderError::Destroyed);
        }
        self.host.destroy();
        self.features.release_history();
        log::info!("Rave renderer destroyed after tick {}", self.features.tick());
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), RenderError> {
        if self.surfaces.is_none() {
            return Err(RenderError::Destroyed);
        }
        check_speed(speed)?;
        self.features.set_speed(speed);
        Ok(())
    }

    pub fn state(&self) -> State {
        match self.surfaces {
            Some(_) => State::Idle,
            None => State::Destroyed,
        }
    }

    pub fn features(&self) -> &FeatureState {
        &self.features
    }

    pub fn radii(&self) -> Radii {
        self.radii
    }

    pub fn canvas(&self) -> Option<&Surface> {
        self.surfaces.as_ref().map(|s| &s.canvas)
    }

    pub fn trail(&self) -> Option<&Surface> {
        self.surfaces.as_ref().map(|s| &s.trail)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn analyzer_mut(&mut self) -> &mut A {
        &mut self.analyzer
    }
}

fn check_speed(speed: f64) -> Result<(), RenderError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(RenderError::InvalidSpeed(speed));
    }
    Ok(())
}

/// Prefer the wide-gamut context, fall back to sRGB when the host lacks it.
fn acquire_context<H: RenderLoopHost>(host: &H) -> Result<Surface, RenderError> {
    match host.create_context(ColorSpace::DisplayP3) {
        Ok(surface) => Ok(surface),
        Err(ContextError::UnsupportedColorSpace(space)) => {
            log::warn!("{} context not supported, using sRGB", space.css_name());
            Ok(host.create_context(ColorSpace::Srgb)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Trail, decay and colored layers, then snapshot the result into `trail`.
fn composite_trail(canvas: &mut Surface, trail: &mut Surface, ctx: &ShapeContext<'_>, speed: f64) {
    canvas.clear();
    canvas.draw_scaled(trail, 1.0 + TRAIL_ZOOM / speed);

    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let wash = Paint::solid(Color::BLACK).with_alpha((TRAIL_DECAY / speed) as f32);
    canvas.fill_rect(-0.5 * w, -0.5 * h, w, h, &wash);

    draw_inner(canvas, ctx, Pass::Colored);
    draw_inner_mask(canvas, ctx);
    draw_outer(canvas, ctx, Pass::Colored);

    trail.copy_from(canvas);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analyzer::{AnalysisFrame, BandData, Samples};
    use crate::render::gpu::{test_gpu, GpuContext};
    use crate::render::host::OffscreenHost;
    use std::sync::Arc;

    /// Deterministic, loud-ish source so every layer draws something.
    struct Wobble {
        calls: usize,
        configured: usize,
    }

    impl AnalysisSource for Wobble {
        fn set_options(&mut self, bands: &[BandConfig]) {
            self.configured = bands.len();
        }

        fn get_data(&mut self) -> AnalysisFrame {
            self.calls += 1;
            let n = 256;
            let phase = self.calls as f32 * 0.3;
            let wave: Vec<f32> = (0..n).map(|i| (i as f32 * 0.15 + phase).sin()).collect();
            AnalysisFrame {
                bands: vec![
                    BandData {
                        time: Samples::Byte(wave.iter().map(|x| (128.0 + 100.0 * x) as u8).collect()),
                        freq: Samples::Byte((0..n / 2).map(|i| (255 - i * 2) as u8).collect()),
                    },
                    BandData {
                        time: Samples::Float(wave.iter().map(|x| 0.6 * x).collect()),
                        freq: Samples::Float(Vec::new()),
                    },
                ],
            }
        }
    }

    fn rave(gpu: &Arc<GpuContext>) -> Rave<OffscreenHost, Wobble> {
        let source = Wobble { calls: 0, configured: 0 };
        Rave::new(OffscreenHost::new(Arc::clone(gpu), 160, 120, true), source, 1.0).unwrap()
    }

    #[test]
    fn configures_two_bands() {
        let Some(gpu) = test_gpu() else { return };
        let r = rave(&gpu);
        assert_eq!(r.analyzer.configured, 2);
        assert_eq!(r.radii(), Radii::from_height(120));
        assert_eq!(r.canvas().unwrap().color_space(), ColorSpace::DisplayP3);
    }

    #[test]
    fn trail_holds_frame_without_highlights() {
        let Some(gpu) = test_gpu() else { return };
        let mut full = rave(&gpu);
        let mut bare = rave(&gpu);
        for _ in 0..3 {
            assert!(full.render().unwrap());
            assert!(bare.render_passes(false).unwrap());
            let trail = full.trail().unwrap().pixels().unwrap();
            assert_eq!(trail, bare.canvas().unwrap().pixels().unwrap());
            assert_eq!(trail, bare.trail().unwrap().pixels().unwrap());
            assert_ne!(trail, full.canvas().unwrap().pixels().unwrap());
        }
    }

    #[test]
    fn zero_speed_rejected() {
        let Some(gpu) = test_gpu() else { return };
        let source = Wobble { calls: 0, configured: 0 };
        assert!(matches!(
            Rave::new(OffscreenHost::new(Arc::clone(&gpu), 8, 8, true), source, 0.0),
            Err(RenderError::InvalidSpeed(_))
        ));
        let mut r = rave(&gpu);
        assert!(r.set_speed(f64::NAN).is_err());
        assert!(r.set_speed(0.5).is_ok());
        assert_eq!(r.features().speed(), 0.5);
    }

    #[test]
    fn state_is_idle_between_frames_until_destroyed() {
        let Some(gpu) = test_gpu() else { return };
        let mut r = rave(&gpu);
        assert_eq!(r.state(), State::Idle);
        r.render().unwrap();
        assert_eq!(r.state(), State::Idle);
        r.destroy().unwrap();
        assert_eq!(r.state(), State::Destroyed);
        assert!(matches!(r.set_speed(2.0), Err(RenderError::Destroyed)));
        assert!(matches!(r.destroy(), Err(RenderError::Destroyed)));
    }
}
