use crate::types::{Orientation, SensorSample, Vector3};
use std::f64::consts::TAU;
use std::time::Duration;
use thiserror::Error;

/// Callback invoked with every orientation produced by an accepted gyro sample.
pub type OrientationCallback = Box<dyn FnMut(Orientation)>;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("stale gap threshold must be greater than zero")]
    ZeroStaleGap,
    #[error("drift correction strength {0} is outside (0, 1]")]
    CorrectionStrength(f64),
    #[error("drift correction interval must be greater than zero")]
    ZeroCorrectionInterval,
}

/// Fixed-strength blend of the integrated pitch/roll toward the
/// accelerometer's gravity reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftCorrection {
    /// Interpolation factor applied per correction step.
    pub strength: f64,
    /// Minimum time between two correction steps, on the gyro clock.
    pub interval: Duration,
}

impl Default for DriftCorrection {
    fn default() -> Self {
        Self {
            strength: 0.1,
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Gyroscope interval requested from the sensor sampler (~1000 Hz).
    pub gyro_interval: Duration,
    /// Accelerometer interval requested from the sensor sampler (~20 Hz).
    pub accel_interval: Duration,
    /// Magnetometer interval requested from the sensor sampler (~10 Hz).
    pub magnetic_interval: Duration,
    /// Gyro gaps longer than this are treated as a pause, not motion.
    pub stale_gap: Duration,
    /// `None` runs pure integration.
    pub drift_correction: Option<DriftCorrection>,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            gyro_interval: Duration::from_millis(1),
            accel_interval: Duration::from_millis(50),
            magnetic_interval: Duration::from_millis(100),
            stale_gap: Duration::from_millis(100),
            drift_correction: Some(DriftCorrection::default()),
        }
    }
}

impl EstimatorSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.stale_gap.is_zero() {
            return Err(SettingsError::ZeroStaleGap);
        }
        if let Some(correction) = &self.drift_correction {
            if !(correction.strength > 0.0 && correction.strength <= 1.0) {
                return Err(SettingsError::CorrectionStrength(correction.strength));
            }
            if correction.interval.is_zero() {
                return Err(SettingsError::ZeroCorrectionInterval);
            }
        }
        Ok(())
    }
}

/// Running orientation estimate from gyro integration.
///
/// Angular velocity is integrated per axis into pitch/yaw/roll. When drift
/// correction is enabled, the latest accelerometer vector periodically pulls
/// pitch and roll toward the gravity-derived attitude. Yaw has no absolute
/// reference and is never corrected.
pub struct OrientationEstimator {
    settings: EstimatorSettings,
    orientation: Orientation,
    /// Timestamp of the previous gyro sample; `None` until reseeded.
    last_timestamp: Option<Duration>,
    /// Gyro timestamp of the last drift-correction step.
    last_correction: Option<Duration>,
    latest_acceleration: Option<Vector3>,
    latest_magnetic: Option<Vector3>,
    on_orientation_change: Option<OrientationCallback>,
    running: bool,
    accepted_samples: u64,
}

impl OrientationEstimator {
    pub fn new(settings: EstimatorSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            orientation: Orientation::ZERO,
            last_timestamp: None,
            last_correction: None,
            latest_acceleration: None,
            latest_magnetic: None,
            on_orientation_change: None,
            running: false,
            accepted_samples: 0,
        })
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Register the consumer notified after each accepted gyro sample.
    pub fn on_orientation_change(&mut self, callback: impl FnMut(Orientation) + 'static) {
        self.on_orientation_change = Some(Box::new(callback));
    }

    /// Begin consuming samples. The first gyro sample afterwards only seeds
    /// the integration clock.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_timestamp = None;
        tracing::info!(
            gyro_hz = rate_hz(self.settings.gyro_interval),
            accel_hz = rate_hz(self.settings.accel_interval),
            magnetic_hz = rate_hz(self.settings.magnetic_interval),
            drift_correction = self.settings.drift_correction.is_some(),
            "Orientation estimator started"
        );
    }

    /// Detach from the sensor streams. Samples delivered while stopped are ignored.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        tracing::info!(samples = self.accepted_samples, "Orientation estimator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Zero the estimate and forget the gyro clock so the next sample reseeds it.
    pub fn reset(&mut self) {
        self.orientation = Orientation::ZERO;
        self.last_timestamp = None;
        self.last_correction = None;
        self.accepted_samples = 0;
        tracing::info!("Orientation estimate reset");
    }

    pub fn current_orientation(&self) -> Orientation {
        self.orientation
    }

    /// Route a sample to the matching handler.
    pub fn on_sample(&mut self, sample: SensorSample) {
        match sample {
            SensorSample::AngularVelocity { value, timestamp } => {
                self.on_angular_velocity_sample(value, timestamp)
            }
            SensorSample::Acceleration { value, .. } => self.on_acceleration_sample(value),
            SensorSample::MagneticField { value, .. } => self.on_magnetic_sample(value),
        }
    }

    pub fn on_angular_velocity_sample(&mut self, angular_velocity: Vector3, timestamp: Duration) {
        if !self.running {
            return;
        }

        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(timestamp);
            self.last_correction = Some(timestamp);
            return;
        };

        let Some(dt) = timestamp.checked_sub(last) else {
            tracing::trace!(?timestamp, ?last, "Discarding out-of-order gyro sample");
            return;
        };
        self.last_timestamp = Some(timestamp);

        if dt > self.settings.stale_gap {
            tracing::debug!(gap_ms = dt.as_millis() as u64, "Gyro gap treated as pause");
            return;
        }

        let dt = dt.as_secs_f64();
        self.orientation.pitch += angular_velocity.x * dt;
        self.orientation.yaw += angular_velocity.y * dt;
        self.orientation.roll += angular_velocity.z * dt;

        self.maybe_correct_drift(timestamp);

        self.accepted_samples += 1;
        if self.accepted_samples % 1000 == 0 {
            tracing::debug!(samples = self.accepted_samples, "Gyro samples integrated");
        }

        if let Some(callback) = self.on_orientation_change.as_mut() {
            callback(self.orientation);
        }
    }

    pub fn on_acceleration_sample(&mut self, acceleration: Vector3) {
        if self.running {
            self.latest_acceleration = Some(acceleration);
        }
    }

    pub fn on_magnetic_sample(&mut self, magnetic_field: Vector3) {
        if self.running {
            self.latest_magnetic = Some(magnetic_field);
        }
    }

    pub fn latest_acceleration(&self) -> Option<Vector3> {
        self.latest_acceleration
    }

    pub fn latest_magnetic(&self) -> Option<Vector3> {
        self.latest_magnetic
    }

    /// Tilt-compensated azimuth of the device's +Y axis, in `[0, 2π)`.
    ///
    /// Needs both an acceleration and a magnetic sample; returns `None` when
    /// either is missing or the two are parallel.
    pub fn magnetic_heading(&self) -> Option<f64> {
        let up = self.latest_acceleration?.try_normalize()?;
        let magnetic = self.latest_magnetic?;
        let east = magnetic.cross(up).try_normalize()?;
        let north = up.cross(east);
        Some(east.y.atan2(north.y).rem_euclid(TAU))
    }

    fn maybe_correct_drift(&mut self, now: Duration) {
        let Some(correction) = self.settings.drift_correction else {
            return;
        };
        let due = match self.last_correction {
            Some(last) => now.saturating_sub(last) >= correction.interval,
            None => true,
        };
        if !due {
            return;
        }
        self.last_correction = Some(now);

        let Some((true_pitch, true_roll)) = self.latest_acceleration.and_then(gravity_attitude)
        else {
            return;
        };
        self.orientation.pitch = lerp(self.orientation.pitch, true_pitch, correction.strength);
        self.orientation.roll = lerp(self.orientation.roll, true_roll, correction.strength);
        tracing::trace!(
            pitch = self.orientation.pitch,
            roll = self.orientation.roll,
            "Drift correction applied"
        );
    }
}

/// Pitch and roll implied by the gravity vector, or `None` for a zero vector.
pub fn gravity_attitude(acceleration: Vector3) -> Option<(f64, f64)> {
    if acceleration == Vector3::ZERO {
        return None;
    }
    let Vector3 { x, y, z } = acceleration;
    let pitch = (-y).atan2((x * x + z * z).sqrt());
    let roll = x.atan2(z);
    Some((pitch, roll))
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

fn rate_hz(interval: Duration) -> f64 {
    if interval.is_zero() {
        0.0
    } else {
        1.0 / interval.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    const STEP: Duration = Duration::from_millis(10);

    fn integrating_only() -> OrientationEstimator {
        let settings = EstimatorSettings {
            drift_correction: None,
            ..EstimatorSettings::default()
        };
        let mut estimator = OrientationEstimator::new(settings).unwrap();
        estimator.start();
        estimator
    }

    fn feed_constant(estimator: &mut OrientationEstimator, omega: Vector3, steps: u32) {
        // One seeding sample plus `steps` integrating ones.
        for i in 0..=steps {
            estimator.on_angular_velocity_sample(omega, STEP * i);
        }
    }

    #[rstest]
    #[case::pitch(Vector3::new(0.5, 0.0, 0.0))]
    #[case::yaw(Vector3::new(0.0, -1.2, 0.0))]
    #[case::roll(Vector3::new(0.0, 0.0, 2.0))]
    #[case::all_axes(Vector3::new(0.3, 0.7, -0.4))]
    fn constant_rate_integrates_linearly(#[case] omega: Vector3) {
        let mut estimator = integrating_only();
        feed_constant(&mut estimator, omega, 200);

        let expected = omega * 200.0 * STEP.as_secs_f64();
        let o = estimator.current_orientation();
        assert_relative_eq!(o.pitch, expected.x, epsilon = 1e-9);
        assert_relative_eq!(o.yaw, expected.y, epsilon = 1e-9);
        assert_relative_eq!(o.roll, expected.z, epsilon = 1e-9);
    }

    #[test]
    fn first_sample_only_seeds_clock() {
        let mut estimator = integrating_only();
        estimator.on_angular_velocity_sample(Vector3::splat(5.0), Duration::from_secs(1000));
        assert_eq!(estimator.current_orientation(), Orientation::ZERO);
    }

    #[test]
    fn stale_gap_is_not_integrated() {
        let mut estimator = integrating_only();
        let omega = Vector3::new(1.0, 1.0, 1.0);
        estimator.on_angular_velocity_sample(omega, Duration::ZERO);
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(10));
        let before = estimator.current_orientation();

        estimator.on_angular_velocity_sample(omega, Duration::from_millis(200));
        assert_eq!(estimator.current_orientation(), before);

        // The gap still advanced the clock, so the next step is 10 ms.
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(210));
        assert_relative_eq!(estimator.current_orientation().pitch, before.pitch + 0.01);
    }

    #[test]
    fn gap_equal_to_threshold_is_integrated() {
        let mut estimator = integrating_only();
        let omega = Vector3::new(1.0, 0.0, 0.0);
        estimator.on_angular_velocity_sample(omega, Duration::ZERO);
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(100));
        assert_relative_eq!(estimator.current_orientation().pitch, 0.1);
    }

    #[test]
    fn out_of_order_sample_is_dropped() {
        let mut estimator = integrating_only();
        let omega = Vector3::new(1.0, 0.0, 0.0);
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(50));
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(40));
        assert_eq!(estimator.current_orientation(), Orientation::ZERO);

        estimator.on_angular_velocity_sample(omega, Duration::from_millis(60));
        assert_relative_eq!(estimator.current_orientation().pitch, 0.01);
    }

    #[test]
    fn reset_zeroes_and_reseeds() {
        let mut estimator = integrating_only();
        feed_constant(&mut estimator, Vector3::splat(1.0), 10);
        estimator.reset();
        assert_eq!(estimator.current_orientation(), Orientation::ZERO);

        // Without reseeding this would integrate a 10 s step.
        estimator.on_angular_velocity_sample(Vector3::splat(1.0), Duration::from_secs(10));
        assert_eq!(estimator.current_orientation(), Orientation::ZERO);
    }

    #[test]
    fn callback_fires_once_per_accepted_sample() {
        let mut estimator = integrating_only();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        estimator.on_orientation_change(move |o| sink.borrow_mut().push(o));

        let omega = Vector3::new(1.0, 0.0, 0.0);
        estimator.on_angular_velocity_sample(omega, Duration::ZERO);
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(10));
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(500));
        estimator.on_angular_velocity_sample(omega, Duration::from_millis(510));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], estimator.current_orientation());
    }

    #[test]
    fn stopped_estimator_ignores_samples() {
        let mut estimator = integrating_only();
        estimator.stop();
        feed_constant(&mut estimator, Vector3::splat(1.0), 10);
        estimator.on_acceleration_sample(Vector3::new(0.0, 0.0, 9.81));
        assert_eq!(estimator.current_orientation(), Orientation::ZERO);
        assert!(estimator.latest_acceleration().is_none());
    }

    #[test]
    fn drift_correction_pulls_toward_gravity() {
        let settings = EstimatorSettings {
            drift_correction: Some(DriftCorrection {
                strength: 0.1,
                interval: Duration::from_millis(100),
            }),
            ..EstimatorSettings::default()
        };
        let mut estimator = OrientationEstimator::new(settings).unwrap();
        estimator.start();
        // Level device: gravity along +z gives zero pitch and roll.
        estimator.on_acceleration_sample(Vector3::new(0.0, 0.0, 9.81));

        let drift = Vector3::new(0.01, 0.0, 0.01);
        estimator.on_angular_velocity_sample(drift, Duration::ZERO);
        for i in 1..=100 {
            estimator.on_angular_velocity_sample(drift, STEP * i);
        }

        // Pure integration would reach 0.01 rad; ten blends keep it well below.
        let o = estimator.current_orientation();
        assert!(o.pitch > 0.0 && o.pitch < 0.0075, "pitch = {}", o.pitch);
        assert!(o.roll > 0.0 && o.roll < 0.0075, "roll = {}", o.roll);
    }

    #[test]
    fn zero_acceleration_skips_correction() {
        let settings = EstimatorSettings {
            drift_correction: Some(DriftCorrection {
                strength: 1.0,
                interval: Duration::from_millis(10),
            }),
            ..EstimatorSettings::default()
        };
        let mut estimator = OrientationEstimator::new(settings).unwrap();
        estimator.start();
        estimator.on_acceleration_sample(Vector3::ZERO);
        feed_constant(&mut estimator, Vector3::new(1.0, 0.0, 0.0), 10);
        assert_relative_eq!(estimator.current_orientation().pitch, 0.1, epsilon = 1e-12);
    }

    #[rstest]
    #[case::level(Vector3::new(0.0, 0.0, 9.81), 0.0, 0.0)]
    #[case::nose_down(Vector3::new(0.0, -9.81, 0.0), std::f64::consts::FRAC_PI_2, 0.0)]
    #[case::on_side(Vector3::new(9.81, 0.0, 0.0), 0.0, std::f64::consts::FRAC_PI_2)]
    fn gravity_attitude_matches_axes(
        #[case] accel: Vector3,
        #[case] pitch: f64,
        #[case] roll: f64,
    ) {
        let (p, r) = gravity_attitude(accel).unwrap();
        assert_relative_eq!(p, pitch, epsilon = 1e-12);
        assert_relative_eq!(r, roll, epsilon = 1e-12);
    }

    #[test]
    fn heading_requires_both_vectors() {
        let mut estimator = integrating_only();
        assert!(estimator.magnetic_heading().is_none());
        estimator.on_acceleration_sample(Vector3::new(0.0, 0.0, 9.81));
        assert!(estimator.magnetic_heading().is_none());

        // Level, top of the device pointing at magnetic north.
        estimator.on_magnetic_sample(Vector3::new(0.0, 20.0, -40.0));
        assert_relative_eq!(estimator.magnetic_heading().unwrap(), 0.0, epsilon = 1e-9);

        // Field arriving from the device's -x side: top points east.
        estimator.on_magnetic_sample(Vector3::new(-20.0, 0.0, -40.0));
        assert_relative_eq!(
            estimator.magnetic_heading().unwrap(),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = EstimatorSettings {
            drift_correction: Some(DriftCorrection {
                strength: 1.5,
                interval: Duration::from_secs(2),
            }),
            ..EstimatorSettings::default()
        };
        assert_eq!(
            OrientationEstimator::new(settings).err(),
            Some(SettingsError::CorrectionStrength(1.5))
        );
    }
}
