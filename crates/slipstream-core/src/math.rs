//! Interpolation helpers shared by the recorder and the resolver

use std::f64::consts::{PI, TAU};

/// Wrap an angle difference into `[-PI, PI]`
pub fn wrap_angle(delta: f64) -> f64 {
    if (-PI..=PI).contains(&delta) {
        return delta;
    }
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps +PI to -PI; keep the sign of the input at the boundary
    if wrapped == -PI && delta > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Interpolate between two headings along the shortest arc
///
/// The result is wrapped into `[-PI, PI]`. Missing headings fall back to
/// whichever side is known.
pub fn lerp_heading(a: Option<f64>, b: Option<f64>, s: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(wrap_angle(a + wrap_angle(b - a) * s)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Cubic Hermite basis functions `(h00, h10, h01, h11)` at `s`
pub fn hermite_basis(s: f64) -> (f64, f64, f64, f64) {
    let s2 = s * s;
    let s3 = s2 * s;
    (
        2.0 * s3 - 3.0 * s2 + 1.0,
        s3 - 2.0 * s2 + s,
        -2.0 * s3 + 3.0 * s2,
        s3 - s2,
    )
}

/// Evaluate a one-dimensional cubic Hermite segment
pub fn hermite(p0: f64, m0: f64, p1: f64, m1: f64, s: f64) -> f64 {
    let (h00, h10, h01, h11) = hermite_basis(s);
    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}

/// Clamp to `[-limit, limit]`, mapping non-finite values to the boundary
/// with the value's sign
pub fn clamp_finite(value: f64, limit: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-limit, limit)
    } else if value.is_sign_negative() {
        -limit
    } else {
        limit
    }
}
