//! Frame conventions shared by the reconstruction and draping crates.
//!
//! World and mesh frames are east-north-up: x east, y north, z up, so depths
//! below the surface are negative heights. The vehicle frame is x forward,
//! y port, z up; heading rotates the vehicle frame about world z.

use std::f64::consts::{PI, TAU};

/// Convert a world height (z up) into a depth below the surface.
pub fn depth_from_height(z: f64) -> f64 {
    -z
}

/// Wrap an angle into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_angle(-0.5 - TAU) + 0.5).abs() < 1e-12);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
    }

    #[test]
    fn test_depth_from_height() {
        assert_eq!(depth_from_height(-12.5), 12.5);
    }
}
