use std::fmt;

/// Largest channel value the generator emits; values above 1.0 address HDR headroom.
pub const HDR_CHANNEL_MAX: f64 = 1.5;
pub const DEFAULT_BOOST: f64 = 1.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    DisplayP3,
}

impl ColorSpace {
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Srgb => "srgb",
            Self::DisplayP3 => "display-p3",
        }
    }
}

// Linear-light primaries conversion, both spaces share the D65 white point.
const P3_TO_SRGB: [[f64; 3]; 3] = [
    [1.224_940_2, -0.224_940_2, 0.0],
    [-0.042_056_9, 1.042_056_9, 0.0],
    [-0.019_637_6, -0.078_636_0, 1.098_273_6],
];
const SRGB_TO_P3: [[f64; 3]; 3] = [
    [0.822_461_9, 0.177_538_1, 0.0],
    [0.033_194_2, 0.966_805_8, 0.0],
    [0.017_082_6, 0.072_397_4, 0.910_519_9],
];

/// A color tagged with the space its channels belong to. Channels may exceed
/// 1.0; consumers must be configured for extended range to honor them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub space: ColorSpace,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::srgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::srgb(1.0, 1.0, 1.0);

    pub const fn srgb(r: f64, g: f64, b: f64) -> Self {
        Self { space: ColorSpace::Srgb, r, g, b }
    }

    pub const fn display_p3(r: f64, g: f64, b: f64) -> Self {
        Self { space: ColorSpace::DisplayP3, r, g, b }
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Re-express the color in `target`, keeping extended-range values.
    pub fn to_space(self, target: ColorSpace) -> Self {
        if self.space == target {
            return self;
        }
        let matrix = match target {
            ColorSpace::Srgb => &P3_TO_SRGB,
            ColorSpace::DisplayP3 => &SRGB_TO_P3,
        };
        let lin = self.channels().map(decode_transfer);
        let mut out = [0.0; 3];
        for (row, o) in matrix.iter().zip(out.iter_mut()) {
            *o = encode_transfer(row[0] * lin[0] + row[1] * lin[1] + row[2] * lin[2]);
        }
        Self {
            space: target,
            r: out[0],
            g: out[1],
            b: out[2],
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "color({} {:.3} {:.3} {:.3})",
            self.space.css_name(),
            self.r,
            self.g,
            self.b
        )
    }
}

fn decode_transfer(v: f64) -> f64 {
    let a = v.abs();
    let lin = if a <= 0.040_45 {
        a / 12.92
    } else {
        ((a + 0.055) / 1.055).powf(2.4)
    };
    lin.copysign(v)
}

fn encode_transfer(v: f64) -> f64 {
    let a = v.abs();
    let enc = if a <= 0.003_130_8 {
        a * 12.92
    } else {
        1.055 * a.powf(1.0 / 2.4) - 0.055
    };
    enc.copysign(v)
}

/// HSL to a boosted Display-P3 color.
///
/// `hue` is in degrees and wraps with period 360. `saturation` is a percentage
/// clamped to 0..=100. `lightness` is not clamped: values above 100 (slow
/// playback divides lightness by speed) push every channel towards the cap
/// while keeping a tint. Each channel is scaled by `boost` and capped at
/// [`HDR_CHANNEL_MAX`], never below zero.
pub fn hdr_color(hue: f64, saturation: f64, lightness: f64, boost: f64) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let s = (saturation / 100.0).clamp(0.0, 1.0);
    let l = lightness / 100.0;

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let boost = boost.max(0.0);
    let lift = |v: f64| ((v + m) * boost).clamp(0.0, HDR_CHANNEL_MAX);
    Color::display_p3(lift(r), lift(g), lift(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color, eps: f64) -> bool {
        a.space == b.space
            && (a.r - b.r).abs() < eps
            && (a.g - b.g).abs() < eps
            && (a.b - b.b).abs() < eps
    }

    #[test]
    fn hue_wraps_every_360_degrees() {
        for hue in [0.0, 10.0, 59.9, 123.0, 299.0] {
            let a = hdr_color(hue, 80.0, 40.0, DEFAULT_BOOST);
            let b = hdr_color(hue + 360.0, 80.0, 40.0, DEFAULT_BOOST);
            let c = hdr_color(hue - 720.0, 80.0, 40.0, DEFAULT_BOOST);
            assert!(close(a, b, 1e-9), "{a} vs {b}");
            assert!(close(a, c, 1e-9), "{a} vs {c}");
        }
    }

    #[test]
    fn channels_capped_at_headroom() {
        let c = hdr_color(200.0, 100.0, 100.0, 10.0);
        for v in c.channels() {
            assert!(v <= HDR_CHANNEL_MAX);
        }
        assert_eq!(c.r, HDR_CHANNEL_MAX);
    }

    #[test]
    fn channels_never_negative() {
        for l in [-50.0, 0.0, 30.0, 140.0] {
            for hue in [-30.0, 0.0, 180.0, 359.0] {
                let c = hdr_color(hue, 100.0, l, 1.4);
                assert!(c.channels().iter().all(|&v| v >= 0.0), "{c}");
            }
        }
    }

    #[test]
    fn lightness_above_full_keeps_tint() {
        let c = hdr_color(0.0, 100.0, 110.0, 1.4);
        assert!(close(c, Color::display_p3(1.4, 1.5, 1.5), 1e-12), "{c}");
        assert_ne!(c, hdr_color(0.0, 100.0, 100.0, 1.4));
    }

    #[test]
    fn primary_red_is_boosted() {
        let c = hdr_color(0.0, 100.0, 50.0, 1.4);
        assert!(close(c, Color::display_p3(1.4, 0.0, 0.0), 1e-12));
        assert_eq!(c.to_string(), "color(display-p3 1.400 0.000 0.000)");
    }

    #[test]
    fn sector_boundaries() {
        let green = hdr_color(120.0, 100.0, 50.0, 1.0);
        assert!(close(green, Color::display_p3(0.0, 1.0, 0.0), 1e-12));
        let blue = hdr_color(240.0, 100.0, 50.0, 1.0);
        assert!(close(blue, Color::display_p3(0.0, 0.0, 1.0), 1e-12));
    }

    #[test]
    fn conversion_roundtrips_and_keeps_white() {
        let white = Color::WHITE.to_space(ColorSpace::DisplayP3);
        assert!(close(white, Color::display_p3(1.0, 1.0, 1.0), 1e-4));
        let c = Color::display_p3(0.9, 0.2, 0.4);
        let back = c.to_space(ColorSpace::Srgb).to_space(ColorSpace::DisplayP3);
        assert!(close(c, back, 1e-4));
        // P3 red sits outside sRGB.
        let red = Color::display_p3(1.0, 0.0, 0.0).to_space(ColorSpace::Srgb);
        assert!(red.r > 1.0 && red.g < 0.0);
    }
}
