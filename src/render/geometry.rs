use std::f64::consts::{FRAC_PI_2, PI};

use crate::util::lerp;

pub const TAU: f64 = 2.0 * PI;

/// Sides of the polygon the silhouette morphs towards.
pub const MORPH_SIDES: u32 = 6;
/// Radius scale applied to the polygon end of the morph.
pub const MORPH_RADIUS_SCALE: f64 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Point at angle `a` on a circle (`sides == 0`) or on a regular polygon with
/// `sides` sides inscribed in the circle of radius `r`, one vertex at -pi/2.
pub fn poly_point(sides: u32, a: f64, r: f64) -> Point {
    let mut r = r;
    if sides != 0 {
        let pin = PI / sides as f64;
        r *= pin.cos() / ((a + FRAC_PI_2).rem_euclid(2.0 * pin) - pin).cos();
    }
    Point {
        x: r * a.cos(),
        y: r * a.sin(),
    }
}

/// Blend between the circle and the enlarged hexagon at angle `a`.
pub fn morph_point(a: f64, r: f64, blend: f64) -> Point {
    let s0 = poly_point(0, a, r);
    let s1 = poly_point(MORPH_SIDES, a, MORPH_RADIUS_SCALE * r);
    Point {
        x: lerp(s0.x, s1.x, blend),
        y: lerp(s0.y, s1.y, blend),
    }
}

/// Slow circle/hexagon oscillation driven by the frame tick.
pub fn morph_blend(tick: u64) -> f64 {
    0.5 + 0.5 * (tick as f64 / 500.0).cos()
}

/// Triangular index over `0..=l`, mirrored so a sweep wraps seamlessly.
#[inline]
pub fn mirrored_index(j: usize, l: usize) -> usize {
    if l == 0 {
        return 0;
    }
    (l as isize - (j % (2 * l)) as isize).unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn circle_is_parametric() {
        for k in 0..64 {
            let a = k as f64 * 0.37 - 3.0;
            let p = poly_point(0, a, 7.5);
            assert_eq!(p.x, 7.5 * a.cos());
            assert_eq!(p.y, 7.5 * a.sin());
        }
    }

    #[test]
    fn hexagon_vertices_lie_on_circle() {
        for k in -6..6 {
            let a = -FRAC_PI_2 + k as f64 * PI / 3.0;
            let p = poly_point(6, a, 10.0);
            let d = (p.x * p.x + p.y * p.y).sqrt();
            assert!((d - 10.0).abs() < 1e-6, "k={k} d={d}");
        }
    }

    #[test]
    fn hexagon_edges_dip_inside() {
        let a = -FRAC_PI_2 + PI / 6.0;
        let p = poly_point(6, a, 10.0);
        let d = (p.x * p.x + p.y * p.y).sqrt();
        assert!((d - 10.0 * (PI / 6.0).cos()).abs() < 1e-6);
        let mirrored = poly_point(6, a - TAU, 10.0);
        assert!((mirrored.x - p.x).abs() < 1e-6 && (mirrored.y - p.y).abs() < 1e-6);
    }

    #[test]
    fn morph_endpoints() {
        for k in 0..32 {
            let a = k as f64 * 0.21;
            let c = morph_point(a, 3.0, 0.0);
            let expect = poly_point(0, a, 3.0);
            assert!((c.x - expect.x).abs() < EPS && (c.y - expect.y).abs() < EPS);
            let h = morph_point(a, 3.0, 1.0);
            let expect = poly_point(6, a, 3.75);
            assert!((h.x - expect.x).abs() < EPS && (h.y - expect.y).abs() < EPS);
        }
    }

    #[test]
    fn blend_oscillates_between_circle_and_polygon() {
        assert_eq!(morph_blend(0), 1.0);
        let half = (500.0 * PI).round() as u64;
        assert!(morph_blend(half) < 1e-5);
        for t in [1u64, 77, 9_999, 40_000_000] {
            let b = morph_blend(t);
            assert!((0.0..=1.0).contains(&b));
        }
    }

    #[test]
    fn mirrored_index_is_symmetric() {
        let l = 5;
        let seq: Vec<usize> = (0..4 * l).map(|j| mirrored_index(j, l)).collect();
        assert_eq!(&seq[..10], &[5, 4, 3, 2, 1, 0, 1, 2, 3, 4]);
        assert_eq!(&seq[10..], &seq[..10]);
        assert_eq!(mirrored_index(3, 0), 0);
    }
}
