use serde::{Deserialize, Serialize};
use skyscan_coverage::{CoverageSettings, SkyBand};
use skyscan_imu::{DriftCorrection, EstimatorSettings};
use std::f64::consts::PI;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Orientation estimator configuration.
    pub imu: ImuConfig,
    /// Sky coverage configuration.
    pub coverage: CoverageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Gyroscope sampling interval requested from the sensor (microseconds).
    pub gyro_interval_us: u64,
    /// Accelerometer sampling interval (milliseconds).
    pub accel_interval_ms: u64,
    /// Magnetometer sampling interval (milliseconds).
    pub magnetic_interval_ms: u64,
    /// Gyro gaps longer than this are treated as a pause (milliseconds).
    pub stale_gap_ms: u64,
    /// Blend pitch/roll toward the accelerometer's gravity reference.
    pub drift_correction: bool,
    /// Interpolation factor per correction step, in (0, 1].
    pub drift_correction_strength: f64,
    /// Time between correction steps (milliseconds).
    pub drift_correction_interval_ms: u64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            gyro_interval_us: 1_000,
            accel_interval_ms: 50,
            magnetic_interval_ms: 100,
            stale_gap_ms: 100,
            drift_correction: true,
            drift_correction_strength: 0.1,
            drift_correction_interval_ms: 2_000,
        }
    }
}

impl ImuConfig {
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            gyro_interval: Duration::from_micros(self.gyro_interval_us),
            accel_interval: Duration::from_millis(self.accel_interval_ms),
            magnetic_interval: Duration::from_millis(self.magnetic_interval_ms),
            stale_gap: Duration::from_millis(self.stale_gap_ms),
            drift_correction: self.drift_correction.then(|| DriftCorrection {
                strength: self.drift_correction_strength,
                interval: Duration::from_millis(self.drift_correction_interval_ms),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Camera field of view in degrees (typical phone: 75).
    pub field_of_view_deg: f64,
    /// Polar angle where the scannable band starts (degrees).
    pub band_start_deg: f64,
    /// Polar angle where the scannable band ends (degrees).
    pub band_end_deg: f64,
    /// Edge slack on both band boundaries (radians).
    pub band_tolerance: f64,
    /// Rows and columns of the coverage grid (10-14).
    pub grid_resolution: usize,
    /// Minimum time between accepted updates (80-300 ms).
    pub min_dwell_ms: u64,
    /// Coverage this close to 100 % is reported as complete (percentage points).
    pub completion_tolerance: f64,
    /// Lens disc samples per axis. Higher = denser footprint, slower updates.
    pub footprint_samples: usize,
    /// Device-to-camera pitch calibration (degrees).
    pub pitch_offset_deg: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        let settings = CoverageSettings::default();
        Self {
            field_of_view_deg: 75.0,
            band_start_deg: 120.0,
            band_end_deg: 180.0,
            band_tolerance: settings.band.tolerance,
            grid_resolution: settings.grid_resolution,
            min_dwell_ms: settings.min_dwell.as_millis() as u64,
            completion_tolerance: settings.completion_tolerance,
            footprint_samples: settings.footprint_samples,
            pitch_offset_deg: -90.0,
        }
    }
}

impl CoverageConfig {
    pub fn coverage_settings(&self) -> CoverageSettings {
        CoverageSettings {
            field_of_view: self.field_of_view_deg.to_radians(),
            band: SkyBand {
                // Degree conversion can overshoot the poles by an ulp.
                start: self.band_start_deg.to_radians().max(0.0),
                end: self.band_end_deg.to_radians().min(PI),
                tolerance: self.band_tolerance,
            },
            grid_resolution: self.grid_resolution,
            min_dwell: Duration::from_millis(self.min_dwell_ms),
            completion_tolerance: self.completion_tolerance,
            footprint_samples: self.footprint_samples,
            pitch_offset: self.pitch_offset_deg.to_radians(),
        }
    }
}
