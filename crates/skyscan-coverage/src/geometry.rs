use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use skyscan_imu::Orientation;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Pitch offset between the device frame and the camera's optical axis.
///
/// Empirical calibration: with zero pitch the phone lies flat and the camera
/// looks along the vertical axis.
pub const DEFAULT_PITCH_OFFSET: f64 = -FRAC_PI_2;

/// A direction on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookDirection {
    /// Polar angle measured from +Y, in `[0, π]`.
    pub phi: f64,
    /// Azimuth measured from +X toward +Z, in `[0, 2π)`.
    pub theta: f64,
}

impl LookDirection {
    pub fn new(phi: f64, theta: f64) -> Self {
        Self {
            phi,
            theta: normalize_azimuth(theta),
        }
    }

    /// Camera look direction for a device orientation.
    ///
    /// The forward vector (-Z) is pitched about X by `pitch + pitch_offset`,
    /// then yawed about Y. Roll spins the image around the optical axis and
    /// does not move the look direction.
    pub fn from_orientation(orientation: &Orientation, pitch_offset: f64) -> Self {
        let rotation = DQuat::from_rotation_y(orientation.yaw)
            * DQuat::from_rotation_x(orientation.pitch + pitch_offset);
        Self::from_vector(rotation * DVec3::NEG_Z)
    }

    pub fn from_vector(v: DVec3) -> Self {
        let phi = v.y.clamp(-1.0, 1.0).acos();
        let theta = normalize_azimuth(v.z.atan2(v.x));
        Self { phi, theta }
    }

    pub fn to_vector(self) -> DVec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        DVec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta)
    }

    /// Zero-roll orientation whose look direction is `self`.
    pub fn to_orientation(self, pitch_offset: f64) -> Orientation {
        let elevation = self.phi.cos().clamp(-1.0, 1.0).asin();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        Orientation {
            pitch: elevation - pitch_offset,
            yaw: (-cos_theta).atan2(-sin_theta),
            roll: 0.0,
        }
    }

    /// Great-circle angle to another direction.
    pub fn angle_to(self, other: LookDirection) -> f64 {
        self.to_vector().angle_between(other.to_vector())
    }
}

/// Polar-angle band of the sky that has to be swept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyBand {
    pub start: f64,
    pub end: f64,
    /// Slack on both edges so looks hovering on a boundary do not flicker.
    pub tolerance: f64,
}

impl Default for SkyBand {
    fn default() -> Self {
        Self {
            start: 2.0 * PI / 3.0,
            end: PI,
            tolerance: 0.05,
        }
    }
}

impl SkyBand {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `phi` lies in the band widened by the tolerance.
    pub fn contains(&self, phi: f64) -> bool {
        phi >= self.start - self.tolerance && phi <= self.end + self.tolerance
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_azimuth(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly 2π for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two azimuths.
pub fn azimuth_distance(a: f64, b: f64) -> f64 {
    let d = normalize_azimuth(a - b);
    d.min(TAU - d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn flat_device_looks_along_minus_y() {
        let look = LookDirection::from_orientation(&Orientation::ZERO, DEFAULT_PITCH_OFFSET);
        // acos is ill-conditioned at the pole.
        assert_relative_eq!(look.phi, PI, epsilon = 1e-6);
    }

    #[test]
    fn pitch_moves_polar_angle() {
        let orientation = Orientation::new(PI / 6.0, -FRAC_PI_2, 0.0);
        let look = LookDirection::from_orientation(&orientation, DEFAULT_PITCH_OFFSET);
        assert_relative_eq!(look.phi, 5.0 * PI / 6.0, epsilon = 1e-9);
        assert!(azimuth_distance(look.theta, 0.0) < 1e-9);
    }

    #[test]
    fn roll_does_not_move_look_direction() {
        let level = Orientation::new(0.4, 1.0, 0.0);
        let rolled = Orientation { roll: 2.5, ..level };
        let a = LookDirection::from_orientation(&level, DEFAULT_PITCH_OFFSET);
        let b = LookDirection::from_orientation(&rolled, DEFAULT_PITCH_OFFSET);
        assert_eq!(a, b);
    }

    #[rstest]
    #[case(5.0 * PI / 6.0, 0.0)]
    #[case(2.3, 1.0)]
    #[case(2.9, 4.0)]
    #[case(1.2, 6.0)]
    fn orientation_round_trips_through_look_direction(#[case] phi: f64, #[case] theta: f64) {
        let target = LookDirection::new(phi, theta);
        let orientation = target.to_orientation(DEFAULT_PITCH_OFFSET);
        let look = LookDirection::from_orientation(&orientation, DEFAULT_PITCH_OFFSET);
        assert_relative_eq!(look.phi, phi, epsilon = 1e-9);
        assert!(azimuth_distance(look.theta, theta) < 1e-9);
    }

    #[rstest]
    #[case(-0.5, TAU - 0.5)]
    #[case(TAU, 0.0)]
    #[case(7.0, 7.0 - TAU)]
    #[case(-1e-18, 0.0)]
    fn azimuth_is_wrapped(#[case] input: f64, #[case] expected: f64) {
        let wrapped = normalize_azimuth(input);
        assert!((0.0..TAU).contains(&wrapped));
        assert_relative_eq!(wrapped, expected, epsilon = 1e-12);
    }

    #[test]
    fn band_tolerance_widens_both_edges() {
        let band = SkyBand::default();
        assert!(band.contains(band.start - 0.04));
        assert!(!band.contains(band.start - 0.06));
        assert!(band.contains(PI));
        assert!(!band.contains(PI / 2.0));
    }

    #[test]
    fn azimuth_distance_wraps() {
        assert_relative_eq!(azimuth_distance(0.1, TAU - 0.1), 0.2, epsilon = 1e-12);
    }
}
