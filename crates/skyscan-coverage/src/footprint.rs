use crate::geometry::{normalize_azimuth, LookDirection, SkyBand};
use std::f64::consts::PI;

/// Floor for the polar angle before it is used in `sin(phi)` as a divisor.
pub const POLE_EPSILON: f64 = 1e-6;

/// Disc-shaped sampling pattern for the camera's field of view.
///
/// Offsets `(u, v)` are laid on an evenly spaced grid over `[-1, 1]²` and only
/// those inside the unit circle are kept, approximating a circular lens.
#[derive(Debug, Clone)]
pub struct Footprint {
    half_fov: f64,
    offsets: Vec<(f64, f64)>,
}

impl Footprint {
    /// `samples_per_axis` grid points along each of `u` and `v`. A single
    /// sample degenerates to the look direction itself.
    pub fn new(fov: f64, samples_per_axis: usize) -> Self {
        let offsets = if samples_per_axis <= 1 {
            vec![(0.0, 0.0)]
        } else {
            let step = 2.0 / (samples_per_axis - 1) as f64;
            let axis: Vec<f64> = (0..samples_per_axis)
                .map(|i| -1.0 + step * i as f64)
                .collect();
            axis.iter()
                .flat_map(|&v| axis.iter().map(move |&u| (u, v)))
                .filter(|(u, v)| u * u + v * v <= 1.0 + 1e-12)
                .collect()
        };
        Self {
            half_fov: fov / 2.0,
            offsets,
        }
    }

    pub fn half_fov(&self) -> f64 {
        self.half_fov
    }

    pub fn offsets(&self) -> &[(f64, f64)] {
        &self.offsets
    }

    /// Sky points covered when looking at `center`, restricted to `band`.
    ///
    /// Azimuth offsets are divided by `sin(phi)` so the footprint narrows in
    /// azimuth toward the pole. Near the pole that width exceeds the full
    /// circle, so the azimuth half-width is capped at π.
    pub fn project<'a>(
        &'a self,
        center: LookDirection,
        band: &'a SkyBand,
    ) -> impl Iterator<Item = LookDirection> + 'a {
        let sin_phi = center.phi.max(POLE_EPSILON).sin().abs().max(POLE_EPSILON);
        let azimuth_half_width = (self.half_fov / sin_phi).min(PI);

        self.offsets.iter().filter_map(move |&(u, v)| {
            let phi = center.phi + v * self.half_fov;
            if !(0.0..=PI).contains(&phi) || !band.contains(phi) {
                return None;
            }
            let theta = normalize_azimuth(center.theta + u * azimuth_half_width);
            Some(LookDirection { phi, theta })
        })
    }
}
