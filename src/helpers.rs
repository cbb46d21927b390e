//! Numerical utilities shared by the material tables and the transport loop.
//!
//! This module provides:
//! - Log-log table interpolation with clamp-to-edge behaviour
//! - Composite Simpson integration for smooth integrands
//! - Direction rotation for scattering events
//! - Logarithmically spaced grids

use nalgebra::Vector3;
use ndarray::Array1;

#[cfg(test)]
mod tests {

    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn loglog_interpolates_power_law_exactly() {
        // y = 3 x^-2 is a straight line in log-log space
        let x: Vec<f64> = vec![1.0, 2.0, 4.0, 8.0];
        let ln_x: Vec<f64> = x.iter().map(|v| v.ln()).collect();
        let ln_y: Vec<f64> = x.iter().map(|v| (3.0 * v.powi(-2)).ln()).collect();
        let y = interpolate_loglog(&ln_x, &ln_y, 3.0);
        assert!((y - 3.0 / 9.0).abs() < 1e-12, "y: {}", y);
    }

    #[test]
    fn loglog_clamps_to_table_edges() {
        let ln_x = vec![1.0_f64.ln(), 10.0_f64.ln()];
        let ln_y = vec![5.0_f64.ln(), 0.5_f64.ln()];
        assert!((interpolate_loglog(&ln_x, &ln_y, 0.1) - 5.0).abs() < 1e-12);
        assert!((interpolate_loglog(&ln_x, &ln_y, 1e3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn simpson_integrates_sine() {
        let result = integrate_simpson(|x| x.sin(), 0.0, PI, 64);
        assert!((result - 2.0).abs() < 1e-6, "result: {}", result);
    }

    #[test]
    fn rotated_direction_keeps_polar_angle() {
        let dir = Vector3::new(1.0, 2.0, -0.5).normalize();
        for &(cos_theta, phi) in &[(0.3, 0.1), (-0.9, 2.0), (1.0, 4.0), (-1.0, 0.0)] {
            let new_dir = rotate_direction(&dir, cos_theta, phi);
            assert!((new_dir.norm() - 1.0).abs() < 1e-12);
            assert!((new_dir.dot(&dir) - cos_theta).abs() < 1e-9);
        }
    }

    #[test]
    fn logspace_endpoints() {
        let grid = logspace(1.0, 100.0, 3);
        assert!((grid[0] - 1.0).abs() < 1e-12);
        assert!((grid[1] - 10.0).abs() < 1e-9);
        assert!((grid[2] - 100.0).abs() < 1e-9);
    }
}

/// Log-log linear interpolation on a table given as logarithms of both axes.
/// `ln_x` must be ascending. Arguments outside the table are clamped to the
/// first or last tabulated value.
pub fn interpolate_loglog(ln_x: &[f64], ln_y: &[f64], x: f64) -> f64 {
    debug_assert_eq!(ln_x.len(), ln_y.len());
    let n = ln_x.len();
    let lx = x.ln();
    if n == 1 || lx <= ln_x[0] {
        return ln_y[0].exp();
    }
    if lx >= ln_x[n - 1] {
        return ln_y[n - 1].exp();
    }
    // index of first element strictly greater than lx
    let hi = ln_x.partition_point(|&v| v <= lx);
    let lo = hi - 1;
    let dx = ln_x[hi] - ln_x[lo];
    if dx <= 0.0 {
        return ln_y[hi].exp();
    }
    let t = (lx - ln_x[lo]) / dx;
    (ln_y[lo] + t * (ln_y[hi] - ln_y[lo])).exp()
}

/// Composite Simpson rule with `intervals` sub-intervals (rounded up to even).
pub fn integrate_simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> f64 {
    let n = if intervals % 2 == 0 {
        intervals.max(2)
    } else {
        intervals + 1
    };
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for i in 1..n {
        let x = a + h * i as f64;
        sum += if i % 2 == 0 { 2.0 * f(x) } else { 4.0 * f(x) };
    }
    sum * h / 3.0
}

/// `n` logarithmically spaced values from `start` to `end`, inclusive.
pub fn logspace(start: f64, end: f64, n: usize) -> Array1<f64> {
    Array1::logspace(std::f64::consts::E, start.ln(), end.ln(), n)
}

/// Rotates a unit direction by polar angle `acos(cos_theta)` and azimuth `phi`
/// about itself. The result is re-normalised.
pub fn rotate_direction(dir: &Vector3<f64>, cos_theta: f64, phi: f64) -> Vector3<f64> {
    let cos_theta = cos_theta.clamp(-1.0, 1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (u, v) = orthonormal_basis(dir);
    let mut new_dir = dir * cos_theta + (u * cos_phi + v * sin_phi) * sin_theta;
    new_dir.normalize_mut();
    new_dir
}

/// Two unit vectors perpendicular to `dir` and to each other.
pub fn orthonormal_basis(dir: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    // pick the coordinate axis least aligned with dir
    let helper = if dir.x.abs() < 0.6 {
        Vector3::x()
    } else if dir.y.abs() < 0.6 {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u = dir.cross(&helper).normalize();
    let v = dir.cross(&u);
    (u, v)
}
