use skyscan_config::AppConfig;
use skyscan_coverage::{LookDirection, SkyBand};
use skyscan_imu::{format_sample, SensorSample, Vector3};
use std::f64::consts::TAU;
use std::time::Duration;

const STANDARD_GRAVITY: f64 = 9.81;

/// Synthetic scan: tilt to a ring of the band, turn a full circle, repeat.
///
/// Rings are evenly spaced across the band, starting at the edge farthest
/// from the pole. The accelerometer stream follows the tilt so drift
/// correction has a consistent gravity reference.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub rings: u32,
    pub band: SkyBand,
    pub pitch_offset: f64,
    pub gyro_interval: Duration,
    pub accel_interval: Duration,
    pub tilt_duration: Duration,
    pub turn_duration: Duration,
}

impl SweepPlan {
    pub fn from_config(config: &AppConfig, rings: u32) -> Self {
        let imu = config.imu.estimator_settings();
        let coverage = config.coverage.coverage_settings();
        Self {
            rings,
            band: coverage.band,
            pitch_offset: coverage.pitch_offset,
            gyro_interval: imu.gyro_interval,
            accel_interval: imu.accel_interval,
            tilt_duration: Duration::from_secs(1),
            turn_duration: Duration::from_secs(12),
        }
    }

    /// Polar angle of each ring's center.
    pub fn ring_angles(&self) -> impl Iterator<Item = f64> + '_ {
        let rings = self.rings.max(1) as f64;
        (0..self.rings).map(move |ring| {
            self.band.start + self.band.width() * (ring as f64 + 0.5) / rings
        })
    }

    pub fn samples(&self) -> Vec<SensorSample> {
        let mut generator = Generator::new(self);
        generator.emit(Vector3::ZERO);

        for phi in self.ring_angles() {
            let target = LookDirection::new(phi, 0.0)
                .to_orientation(self.pitch_offset)
                .pitch;
            let tilt_rate = (target - generator.pitch) / self.tilt_duration.as_secs_f64();
            generator.segment(Vector3::new(tilt_rate, 0.0, 0.0), self.tilt_duration);

            let turn_rate = TAU / self.turn_duration.as_secs_f64();
            generator.segment(Vector3::new(0.0, turn_rate, 0.0), self.turn_duration);
        }
        generator.samples
    }

    /// The sweep as recording text, one sample per line.
    pub fn to_recording(&self) -> String {
        let mut text = format!(
            "# skyscan simulated sweep: {} rings over phi [{:.4}, {:.4}]\n",
            self.rings, self.band.start, self.band.end
        );
        for sample in self.samples() {
            text.push_str(&format_sample(&sample));
            text.push('\n');
        }
        text
    }
}

struct Generator {
    gyro_interval: Duration,
    accel_interval: Duration,
    time: Duration,
    pitch: f64,
    next_accel: Duration,
    samples: Vec<SensorSample>,
}

impl Generator {
    fn new(plan: &SweepPlan) -> Self {
        Self {
            gyro_interval: plan.gyro_interval,
            accel_interval: plan.accel_interval,
            time: Duration::ZERO,
            pitch: 0.0,
            next_accel: Duration::ZERO,
            samples: Vec::new(),
        }
    }

    /// Hold a constant angular velocity for `duration`.
    fn segment(&mut self, angular_velocity: Vector3, duration: Duration) {
        let steps = duration.as_nanos() / self.gyro_interval.as_nanos().max(1);
        let dt = self.gyro_interval.as_secs_f64();
        for _ in 0..steps {
            self.time += self.gyro_interval;
            self.pitch += angular_velocity.x * dt;
            self.emit(angular_velocity);
        }
    }

    fn emit(&mut self, angular_velocity: Vector3) {
        self.samples.push(SensorSample::AngularVelocity {
            value: angular_velocity,
            timestamp: self.time,
        });
        if self.time >= self.next_accel {
            let (sin, cos) = self.pitch.sin_cos();
            self.samples.push(SensorSample::Acceleration {
                value: Vector3::new(0.0, -sin, cos) * STANDARD_GRAVITY,
                timestamp: self.time,
            });
            self.next_accel = self.time + self.accel_interval;
        }
    }
}
