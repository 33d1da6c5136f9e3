use crate::clock::{Clock, MonotonicClock};
use crate::footprint::Footprint;
use crate::geometry::{LookDirection, SkyBand, DEFAULT_PITCH_OFFSET};
use crate::grid::CoverageGrid;
use serde::Serialize;
use skyscan_imu::Orientation;
use std::f64::consts::PI;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

pub const GRID_RESOLUTION_RANGE: RangeInclusive<usize> = 10..=14;
pub const MIN_DWELL_RANGE: RangeInclusive<Duration> =
    Duration::from_millis(80)..=Duration::from_millis(300);

/// Callback receiving the coverage after every recorded update and on reset.
pub type CoverageCallback = Box<dyn for<'a> FnMut(ScanCoverage<'a>)>;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("grid resolution {0} is outside 10..=14")]
    GridResolution(usize),
    #[error("minimum dwell of {0:?} is outside 80..=300 ms")]
    MinDwell(Duration),
    #[error("field of view {0} rad must be within (0, π)")]
    FieldOfView(f64),
    #[error("sky band [{start}, {end}] must satisfy 0 <= start < end <= π")]
    Band { start: f64, end: f64 },
    #[error("band tolerance {0} must be non-negative")]
    BandTolerance(f64),
    #[error("completion tolerance {0} must be within [0, 100)")]
    CompletionTolerance(f64),
    #[error("footprint needs an odd number of samples per axis, got {0}")]
    FootprintSamples(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSettings {
    /// Full cone angle of the camera, in radians.
    pub field_of_view: f64,
    pub band: SkyBand,
    /// Rows and columns of the coverage grid.
    pub grid_resolution: usize,
    /// Updates closer together than this are dropped.
    pub min_dwell: Duration,
    /// Coverage within this many percentage points of 100 reports as 100.
    pub completion_tolerance: f64,
    /// Footprint samples along each axis of the lens disc. Must be odd so the
    /// look direction itself is one of them.
    pub footprint_samples: usize,
    /// Device-to-camera pitch calibration.
    pub pitch_offset: f64,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            field_of_view: 75f64.to_radians(),
            band: SkyBand::default(),
            grid_resolution: 12,
            min_dwell: Duration::from_millis(100),
            completion_tolerance: 4.0,
            footprint_samples: 9,
            pitch_offset: DEFAULT_PITCH_OFFSET,
        }
    }
}

impl CoverageSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !GRID_RESOLUTION_RANGE.contains(&self.grid_resolution) {
            return Err(SettingsError::GridResolution(self.grid_resolution));
        }
        if !MIN_DWELL_RANGE.contains(&self.min_dwell) {
            return Err(SettingsError::MinDwell(self.min_dwell));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < PI) {
            return Err(SettingsError::FieldOfView(self.field_of_view));
        }
        let SkyBand {
            start,
            end,
            tolerance,
        } = self.band;
        if !(start >= 0.0 && start < end && end <= PI) {
            return Err(SettingsError::Band { start, end });
        }
        if !(tolerance >= 0.0) {
            return Err(SettingsError::BandTolerance(tolerance));
        }
        if !(self.completion_tolerance >= 0.0 && self.completion_tolerance < 100.0) {
            return Err(SettingsError::CompletionTolerance(
                self.completion_tolerance,
            ));
        }
        if self.footprint_samples % 2 == 0 {
            return Err(SettingsError::FootprintSamples(self.footprint_samples));
        }
        Ok(())
    }
}

/// One rasterized footprint sample on the sky sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanPoint {
    pub phi: f64,
    pub theta: f64,
    /// Tracker clock time when the point was recorded.
    pub timestamp: Duration,
}

/// Coverage as seen by consumers: a percentage plus a read-only view of
/// every recorded point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanCoverage<'a> {
    pub total_coverage: f64,
    pub scanned_points: &'a [ScanPoint],
}

impl ScanCoverage<'_> {
    pub fn is_complete(&self) -> bool {
        self.total_coverage >= 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageStats {
    pub total_cells: usize,
    pub visited_cells: usize,
    pub unvisited_cells: usize,
    pub scanned_points: usize,
    pub total_coverage: f64,
}

/// What happened to an orientation handed to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Arrived inside the minimum dwell window.
    Throttled,
    /// Look direction outside the band.
    OutOfBand,
    /// Footprint recorded with this many new points.
    Recorded { points: usize },
}

/// Accumulates the camera footprint over the sky band and reports coverage.
///
/// Coverage is always recomputed from the whole point history, so it cannot
/// drift from what was actually recorded. Only [`CoverageTracker::reset`]
/// brings it back to zero.
pub struct CoverageTracker<C: Clock = MonotonicClock> {
    settings: CoverageSettings,
    footprint: Footprint,
    clock: C,
    points: Vec<ScanPoint>,
    last_accepted: Option<Duration>,
    on_coverage_change: Option<CoverageCallback>,
    completed: bool,
}

impl CoverageTracker<MonotonicClock> {
    pub fn new(settings: CoverageSettings) -> Result<Self, SettingsError> {
        Self::with_clock(settings, MonotonicClock::new())
    }
}

impl<C: Clock> CoverageTracker<C> {
    pub fn with_clock(settings: CoverageSettings, clock: C) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            footprint: Footprint::new(settings.field_of_view, settings.footprint_samples),
            settings,
            clock,
            points: Vec::new(),
            last_accepted: None,
            on_coverage_change: None,
            completed: false,
        })
    }

    pub fn settings(&self) -> &CoverageSettings {
        &self.settings
    }

    /// Register the consumer notified after each recorded update and on reset.
    pub fn on_coverage_change(&mut self, callback: impl FnMut(ScanCoverage<'_>) + 'static) {
        self.on_coverage_change = Some(Box::new(callback));
    }

    pub fn look_direction(&self, orientation: &Orientation) -> LookDirection {
        LookDirection::from_orientation(orientation, self.settings.pitch_offset)
    }

    pub fn update_orientation(&mut self, orientation: Orientation) -> UpdateOutcome {
        let now = self.clock.now();
        if let Some(last) = self.last_accepted {
            if now.saturating_sub(last) < self.settings.min_dwell {
                return UpdateOutcome::Throttled;
            }
        }
        self.last_accepted = Some(now);

        let center = self.look_direction(&orientation);
        if !self.settings.band.contains(center.phi) {
            tracing::trace!(phi = center.phi, "Look direction outside scan band");
            return UpdateOutcome::OutOfBand;
        }

        let before = self.points.len();
        self.points.extend(
            self.footprint
                .project(center, &self.settings.band)
                .map(|p| ScanPoint {
                    phi: p.phi,
                    theta: p.theta,
                    timestamp: now,
                }),
        );
        let added = self.points.len() - before;

        let total_coverage = self.calculate_coverage();
        tracing::debug!(
            phi = center.phi,
            theta = center.theta,
            added,
            total_coverage,
            "Footprint recorded"
        );
        if total_coverage >= 100.0 && !self.completed {
            self.completed = true;
            tracing::info!(points = self.points.len(), "Sky band fully covered");
        }

        self.notify(total_coverage);
        UpdateOutcome::Recorded { points: added }
    }

    /// Coverage percentage of the band, rebuilt from the full history.
    pub fn calculate_coverage(&self) -> f64 {
        let raw = self.grid().coverage_percent();
        if raw >= 100.0 - self.settings.completion_tolerance {
            100.0
        } else {
            raw
        }
    }

    pub fn grid(&self) -> CoverageGrid {
        CoverageGrid::from_points(
            self.settings.grid_resolution,
            self.settings.band,
            &self.points,
        )
    }

    pub fn coverage(&self) -> ScanCoverage<'_> {
        ScanCoverage {
            total_coverage: self.calculate_coverage(),
            scanned_points: &self.points,
        }
    }

    pub fn statistics(&self) -> CoverageStats {
        let grid = self.grid();
        let visited_cells = grid.visited_cells();
        CoverageStats {
            total_cells: grid.total_cells(),
            visited_cells,
            unvisited_cells: grid.total_cells() - visited_cells,
            scanned_points: self.points.len(),
            total_coverage: self.calculate_coverage(),
        }
    }

    pub fn scanned_points(&self) -> &[ScanPoint] {
        &self.points
    }

    /// Forget the whole history and broadcast zero coverage.
    pub fn reset(&mut self) {
        self.points.clear();
        self.last_accepted = None;
        self.completed = false;
        tracing::info!("Coverage reset");
        self.notify(0.0);
    }

    fn notify(&mut self, total_coverage: f64) {
        if let Some(callback) = self.on_coverage_change.as_mut() {
            callback(ScanCoverage {
                total_coverage,
                scanned_points: &self.points,
            });
        }
    }
}
