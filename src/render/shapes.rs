//! The three concentric layers: a waveform ring (inner), a black cutout
//! (inner mask) and a spectrum shell (outer).

use std::f64::consts::FRAC_PI_2;

use super::canvas::{Composite, FillRule, Paint, Path, Surface};
use super::color::{hdr_color, Color};
use super::features::{FeatureState, BASS_BAND, WIDE_BAND};
use super::geometry::{mirrored_index, morph_blend, morph_point, TAU};
use crate::audio::analyzer::AnalysisFrame;
use crate::util::arg_max;

const LAYER_BOOST: f64 = 1.4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Radii {
    pub r1: f64,
    pub r2: f64,
}

impl Radii {
    pub fn from_height(height: u32) -> Self {
        let r1 = 0.05 * height as f64;
        Self { r1, r2: 4.0 * r1 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    /// Additive, hue-cycling layer that feeds the trail buffer.
    Colored,
    /// Monochrome highlight drawn after the trail snapshot.
    White,
}

/// Everything a builder reads for one frame.
pub struct ShapeContext<'a> {
    pub frame: &'a AnalysisFrame,
    pub features: &'a FeatureState,
    pub radii: Radii,
}

impl ShapeContext<'_> {
    fn blend(&self) -> f64 {
        morph_blend(self.features.tick())
    }
}

pub fn inner_color(features: &FeatureState) -> Color {
    let tick = features.tick() as f64;
    let hue = tick / 10.0 + 10.0 * (tick / 10.0).sin();
    let lightness = (55.0 - (20.0 * features.bass).floor()) / features.speed();
    hdr_color(hue, 100.0, lightness, LAYER_BOOST)
}

pub fn outer_color(features: &FeatureState) -> Color {
    let tick = features.tick() as f64;
    let hue = tick / 10.0 + 10.0 + 10.0 * (tick / 10.0).sin();
    let lightness = (52.0 + (features.bass * 5.0).floor()) / features.speed();
    hdr_color(hue, 100.0, lightness, LAYER_BOOST)
}

/// Waveform ring around `r1`, phase-locked to the strongest peak so it does
/// not drift between frames.
pub fn inner_path(ctx: &ShapeContext<'_>) -> Path {
    let samples = ctx.frame.time(WIDE_BAND).signals();
    let l = samples.len() / 3;
    let mut path = Path::new();
    if l == 0 {
        return path;
    }

    let r = ctx.radii.r1;
    let h = 0.15 * r;
    let bass = ctx.features.bass;
    let q = ctx.blend();

    let start = l / 2;
    let end = (3 * l) / 2;
    let offset = arg_max(&samples, start, end) - start;
    let sample = |i: usize| samples.get(i).copied().unwrap_or(0.0);

    for j in (0..2 * l).step_by(2) {
        let i = mirrored_index(j, l);
        let t0 = sample(i + offset);
        let t1 = sample(i + offset + 1);
        let radius = r + h * (t0 + t1) + 2.0 * h * bass;
        let a = TAU * (j as f64 / (2 * l) as f64) - FRAC_PI_2;
        path.vertex(j == 0, morph_point(a, radius, q));
    }
    path
}

/// Two opposite sweeps around `r2`: the first outward, the second inward and
/// pulled in by `h * bass^2`. Offsets receive `(h, f, t)`.
fn shell_path<F, G>(ctx: &ShapeContext<'_>, outer: F, inner: G) -> Path
where
    F: Fn(f64, f64, f64) -> f64,
    G: Fn(f64, f64, f64) -> f64,
{
    let levels = ctx.frame.freq(WIDE_BAND).levels();
    let bass_time = ctx.frame.time(BASS_BAND).signals();
    let l = levels.len() / 3;
    let mut path = Path::new();
    if l == 0 {
        return path;
    }

    let features = ctx.features;
    let h = 0.2 * ctx.radii.r2;
    let avg = features.spectrum_average;
    let rs = 1.0 + avg / 255.0;
    let q = ctx.blend();
    let steps = 4 * l;
    let step = TAU / steps as f64;

    let sample = |j: usize| {
        let i = mirrored_index(j, l);
        let f = rs * (levels[i] - avg).max(0.0) / 255.0;
        let t = bass_time.get(i * 2).copied().unwrap_or(0.0);
        (f, t)
    };

    let mut base = ctx.radii.r2 * features.bass_multiplier;
    for j in 0..steps {
        let (f, t) = sample(j);
        let a = step * j as f64 + FRAC_PI_2;
        path.vertex(j == 0, morph_point(a, base + outer(h, f, t), q));
    }

    base -= h * features.bass * features.bass;
    for j in 0..steps {
        let (f, t) = sample(j);
        let a = TAU - step * j as f64 + FRAC_PI_2;
        path.vertex(j == 0, morph_point(a, base + inner(h, f, t), q));
    }
    path
}

pub fn inner_mask_path(ctx: &ShapeContext<'_>) -> Path {
    shell_path(
        ctx,
        |h, f, t| h * (t - 0.5 * f) - 2.0,
        |h, f, t| h * (t - 0.5 * f) - 12.0,
    )
}

pub fn outer_path(ctx: &ShapeContext<'_>, pass: Pass) -> Path {
    let inset = match pass {
        Pass::Colored => 0.0,
        Pass::White => 1.5,
    };
    shell_path(
        ctx,
        |h, f, t| h * (f + t),
        move |h, f, t| h * (t - 0.5 * f) - inset,
    )
}

pub fn draw_inner(surface: &mut Surface, ctx: &ShapeContext<'_>, pass: Pass) {
    let mut path = inner_path(ctx);
    let spike = ctx.features.bass_spike;
    match pass {
        Pass::Colored => {
            let paint = Paint::solid(inner_color(ctx.features)).with_composite(Composite::Lighter);
            path.close();
            surface.stroke_path(&path, &paint, if spike { 5.0 } else { 1.0 });
        }
        Pass::White => {
            surface.fill_path(&path, &Paint::solid(Color::BLACK), FillRule::NonZero);
            path.close();
            surface.stroke_path(&path, &Paint::solid(Color::WHITE), if spike { 3.0 } else { 1.0 });
        }
    }
}

pub fn draw_inner_mask(surface: &mut Surface, ctx: &ShapeContext<'_>) {
    let path = inner_mask_path(ctx);
    surface.fill_path(&path, &Paint::solid(Color::BLACK), FillRule::NonZero);
}

pub fn draw_outer(surface: &mut Surface, ctx: &ShapeContext<'_>, pass: Pass) {
    let path = outer_path(ctx, pass);
    let paint = match pass {
        Pass::Colored => Paint::solid(outer_color(ctx.features)).with_composite(Composite::Lighter),
        Pass::White => Paint::solid(Color::WHITE),
    };
    surface.fill_path(&path, &paint, FillRule::NonZero);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analyzer::{BandData, Samples};
    use crate::render::color::ColorSpace;
    use crate::render::gpu::test_gpu;

    fn silent_frame(n: usize) -> AnalysisFrame {
        AnalysisFrame {
            bands: vec![
                BandData {
                    time: Samples::Byte(vec![128; n]),
                    freq: Samples::Byte(vec![0; n / 2]),
                },
                BandData {
                    time: Samples::Float(vec![0.0; n]),
                    freq: Samples::Float(Vec::new()),
                },
            ],
        }
    }

    fn ctx<'a>(frame: &'a AnalysisFrame, features: &'a FeatureState) -> ShapeContext<'a> {
        ShapeContext {
            frame,
            features,
            radii: Radii::from_height(600),
        }
    }

    #[test]
    fn radii_follow_height() {
        let r = Radii::from_height(600);
        assert_eq!(r.r1, 30.0);
        assert_eq!(r.r2, 120.0);
    }

    #[test]
    fn inner_uses_every_other_step() {
        let frame = silent_frame(60);
        let features = FeatureState::new(1.0);
        let path = inner_path(&ctx(&frame, &features));
        assert_eq!(path.subpath_count(), 1);
        assert_eq!(path.vertex_count(), 20);
    }

    #[test]
    fn silent_inner_sits_on_morphed_r1() {
        let frame = silent_frame(60);
        let features = FeatureState::new(1.0);
        let c = ctx(&frame, &features);
        // tick 0 puts the morph fully on the hexagon; first vertex is a corner at -pi/2.
        let expected = morph_point(-FRAC_PI_2, 30.0, 1.0);
        let mut path = inner_path(&c);
        path.close();
        assert!((expected.y + 37.5).abs() < 1e-9);

        let Some(gpu) = test_gpu() else { return };
        let mut s = Surface::new(gpu, 200, 200, ColorSpace::Srgb, 1.0).unwrap();
        s.stroke_path(&path, &Paint::solid(Color::WHITE), 3.0);
        let (px, py) = ((100.0 + expected.x) as usize, (100.0 + expected.y) as usize);
        let pixels = s.pixels().unwrap();
        assert!(pixels[py * 200 + px][0] > 0.0);
        assert_eq!(pixels[100 * 200 + 100], [0.0; 3]);
    }

    #[test]
    fn shell_sweeps_have_opposite_winding() {
        let frame = silent_frame(60);
        let mut features = FeatureState::new(1.0);
        features.bass = 0.5;
        let c = ctx(&frame, &features);
        for path in [inner_mask_path(&c), outer_path(&c, Pass::Colored)] {
            assert_eq!(path.subpath_count(), 2);
            assert_eq!(path.vertex_count(), 2 * 4 * 10);
            let areas = path.signed_areas();
            assert!(areas[0] * areas[1] < 0.0, "{areas:?}");
            assert!(areas[0].abs() > areas[1].abs());
        }
    }

    #[test]
    fn mask_band_is_a_ring() {
        let frame = silent_frame(60);
        let features = FeatureState::new(1.0);
        let c = ctx(&frame, &features);
        let Some(gpu) = test_gpu() else { return };
        let mut s = Surface::new(gpu, 400, 400, ColorSpace::Srgb, 1.0).unwrap();
        s.fill_rect(-200.0, -200.0, 400.0, 400.0, &Paint::solid(Color::WHITE));
        draw_inner_mask(&mut s, &c);
        // Silent: outer sweep at ~118, inner sweep at ~108 (scaled by the morph).
        let pixels = s.pixels().unwrap();
        let at = |x: usize, y: usize| pixels[y * 400 + x];
        assert_eq!(at(200, 200), [1.0; 3], "centre untouched");
        assert!(at(200, 200 + 141)[0] < 0.01, "band blacked out");
        assert_eq!(at(200, 399), [1.0; 3], "outside untouched");
    }

    #[test]
    fn white_outer_is_inset() {
        let frame = silent_frame(60);
        let features = FeatureState::new(1.0);
        let c = ctx(&frame, &features);
        let colored = outer_path(&c, Pass::Colored).signed_areas();
        let white = outer_path(&c, Pass::White).signed_areas();
        assert_eq!(colored[0], white[0]);
        assert!(white[1].abs() < colored[1].abs());
    }

    #[test]
    fn degenerate_frames_produce_empty_paths() {
        let frame = AnalysisFrame::default();
        let features = FeatureState::new(1.0);
        let c = ctx(&frame, &features);
        assert!(inner_path(&c).is_empty());
        assert!(inner_mask_path(&c).is_empty());
        assert!(outer_path(&c, Pass::White).is_empty());

        let Some(gpu) = test_gpu() else { return };
        let mut s = Surface::new(gpu, 10, 10, ColorSpace::Srgb, 1.0).unwrap();
        draw_inner(&mut s, &c, Pass::White);
        draw_outer(&mut s, &c, Pass::Colored);
        assert!(s.pixels().unwrap().iter().all(|p| *p == [0.0; 3]));
    }

    #[test]
    fn louder_bass_darkens_inner_and_brightens_outer() {
        let mut quiet = FeatureState::new(1.0);
        quiet.bass = 0.0;
        let mut loud = FeatureState::new(1.0);
        loud.bass = 1.0;
        let sum = |c: Color| c.r + c.g + c.b;
        assert!(sum(inner_color(&loud)) < sum(inner_color(&quiet)));
        assert!(sum(outer_color(&loud)) > sum(outer_color(&quiet)));
    }
}
