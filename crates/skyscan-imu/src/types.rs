use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw three-axis sensor vector.
pub type Vector3 = DVec3;

/// Device orientation as Euler angles, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Rotation about the lateral axis.
    pub pitch: f64,
    /// Rotation about the vertical axis.
    pub yaw: f64,
    /// Rotation about the longitudinal axis.
    pub roll: f64,
}

impl Orientation {
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// A single timestamped reading from one of the device sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorSample {
    /// Gyroscope angular velocity (rad/s).
    AngularVelocity { value: Vector3, timestamp: Duration },
    /// Accelerometer reading (m/s^2).
    Acceleration { value: Vector3, timestamp: Duration },
    /// Magnetometer reading (uT).
    MagneticField { value: Vector3, timestamp: Duration },
}

impl SensorSample {
    pub fn timestamp(&self) -> Duration {
        match *self {
            SensorSample::AngularVelocity { timestamp, .. }
            | SensorSample::Acceleration { timestamp, .. }
            | SensorSample::MagneticField { timestamp, .. } => timestamp,
        }
    }
}
