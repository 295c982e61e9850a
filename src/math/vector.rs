use rand::Rng;
use std::f64::consts::PI;

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `acc += scale * v`, element-wise.
#[inline]
pub fn axpy(acc: &mut [f64], scale: f64, v: &[f64]) {
    debug_assert_eq!(acc.len(), v.len());
    for (a, x) in acc.iter_mut().zip(v) {
        *a += scale * x;
    }
}

/// Index of the maximum element in a slice (first one on ties).
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &x)| if x > bv { (i, x) } else { (bi, bv) })
        .0
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Both uniforms on (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Xavier (Glorot) initialization: `len` samples from N(0, sqrt(1 / fan_in)).
pub fn xavier<R: Rng + ?Sized>(rng: &mut R, len: usize, fan_in: usize) -> Vec<f64> {
    let std_dev = (1.0 / fan_in.max(1) as f64).sqrt();
    (0..len).map(|_| sample_standard_normal(rng) * std_dev).collect()
}
