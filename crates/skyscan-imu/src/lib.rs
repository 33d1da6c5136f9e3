//! Orientation estimation for sky sweeps.
//!
//! The estimator integrates gyro samples into pitch/yaw/roll and bounds
//! long-run drift with the accelerometer's gravity reference. Samples come
//! from an external sampler (or a recording, see [`recording`]) and are
//! delivered synchronously, in timestamp order.

pub mod estimator;
pub mod recording;
pub mod types;

pub use estimator::{
    gravity_attitude, DriftCorrection, EstimatorSettings, OrientationCallback,
    OrientationEstimator, SettingsError,
};
pub use recording::{format_sample, parse_recording, RecordingError, RecordingParser};
pub use types::{Orientation, SensorSample, Vector3};
