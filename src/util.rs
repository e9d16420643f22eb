//! Small stateless helpers over sample sequences.

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Mean of `values[start..end]`, clipped to the slice. Empty ranges yield 0.
pub fn average<T: Copy + Into<f64>>(values: &[T], start: usize, end: usize) -> f64 {
    let end = end.min(values.len());
    if start >= end {
        return 0.0;
    }
    let sum: f64 = values[start..end].iter().map(|&v| v.into()).sum();
    sum / (end - start) as f64
}

/// Largest `f(x)` over the slice, 0 when empty.
pub fn max_by<T: Copy, F: Fn(T) -> f64>(values: &[T], f: F) -> f64 {
    values.iter().map(|&v| f(v)).fold(0.0f64, f64::max)
}

/// Index of the first maximum inside `values[start..end]`.
///
/// Returns `start` when the range is empty so callers can subtract it safely.
pub fn arg_max<T: Copy + Into<f64>>(values: &[T], start: usize, end: usize) -> usize {
    let end = end.min(values.len());
    let mut best = start;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate().take(end).skip(start) {
        let v: f64 = v.into();
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_clips_range() {
        let v = [1u8, 2, 3, 4];
        assert_eq!(average(&v, 0, 2), 1.5);
        assert_eq!(average(&v, 2, 100), 3.5);
        assert_eq!(average(&v, 3, 3), 0.0);
        assert_eq!(average::<u8>(&[], 0, 2), 0.0);
    }

    #[test]
    fn arg_max_prefers_first_peak() {
        let v = [0.0f32, 5.0, 1.0, 5.0, 2.0];
        assert_eq!(arg_max(&v, 0, 5), 1);
        assert_eq!(arg_max(&v, 2, 5), 3);
        assert_eq!(arg_max(&v, 4, 4), 4);
    }

    #[test]
    fn max_by_abs() {
        let v = [0.2f32, -0.9, 0.5];
        assert!((max_by(&v, |x| (x as f64).abs()) - 0.9).abs() < 1e-6);
        assert_eq!(max_by::<f32, _>(&[], |x| x as f64), 0.0);
    }
}
