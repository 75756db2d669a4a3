//! Unit conversions for the shifting tank drive.
//!
//! Distances are in inches and angles in degrees throughout the drive base.
//!
//! # Example
//! ```rust
//! use drivebase_core::utils::math::units;
//! let circumference = units::wheel_circumference(2.0);
//! let per_pulse = units::drive_conversion_factor(0.224, circumference, 1.0 / 240.0);
//! assert!(per_pulse > 0.0);
//! ```
use core::f64::consts::PI;
use libm;

/// Circumference of a wheel with the given radius.
pub fn wheel_circumference(radius: f64) -> f64 {
    2.0 * PI * radius
}

/// Linear travel per encoder pulse.
///
/// `gear_ratio` is wheel turns per encoder shaft turn in high gear and
/// `calibration` is the empirically tuned pulse scale.
pub fn drive_conversion_factor(
    gear_ratio: f64,
    circumference: f64,
    calibration: f64,
) -> f64 {
    gear_ratio * circumference * calibration
}

/// Wrap an angle in degrees into `[-180, 180)`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = libm::fmod(angle + 180.0, 360.0);
    if wrapped < 0.0 {
        wrapped + 180.0
    } else {
        wrapped - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_circumference() {
        assert!((wheel_circumference(2.0) - 12.566_370_614).abs() < 1e-6);
    }

    #[test]
    fn test_conversion_factor_scales_linearly() {
        let c = wheel_circumference(2.0);
        let single = drive_conversion_factor(0.224, c, 1.0);
        let double = drive_conversion_factor(0.448, c, 1.0);
        assert!((double - 2.0 * single).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert!((wrap_degrees(190.0) - -170.0).abs() < 1e-9);
        assert!((wrap_degrees(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_degrees(720.0 + 45.0) - 45.0).abs() < 1e-9);
        assert!((wrap_degrees(180.0) - -180.0).abs() < 1e-9);
    }
}
