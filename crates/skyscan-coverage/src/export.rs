use crate::clock::Clock;
use crate::tracker::{CoverageStats, CoverageTracker};
use serde::{Deserialize, Serialize};

/// Serializable snapshot of the coverage grid and how it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMap {
    pub metadata: CoverageMapMetadata,
    /// `grid[row][column]`; rows run from the band start toward its end,
    /// columns from azimuth 0 toward 2π.
    pub grid: Vec<Vec<bool>>,
    /// Points recorded per cell, same layout as `grid`.
    pub sample_counts: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMapMetadata {
    pub phi_range_radians: [f64; 2],
    pub phi_range_degrees: [f64; 2],
    pub theta_range_radians: [f64; 2],
    pub grid_dimensions: [usize; 2],
    pub field_of_view_degrees: f64,
    pub total_cells: usize,
    pub visited_cells: usize,
    pub scanned_points: usize,
    pub total_coverage: f64,
}

impl CoverageMap {
    pub fn from_tracker<C: Clock>(tracker: &CoverageTracker<C>) -> Self {
        let settings = tracker.settings();
        let grid = tracker.grid();
        let CoverageStats {
            total_cells,
            visited_cells,
            scanned_points,
            total_coverage,
            ..
        } = tracker.statistics();
        let band = settings.band;

        Self {
            metadata: CoverageMapMetadata {
                phi_range_radians: [band.start, band.end],
                phi_range_degrees: [band.start.to_degrees(), band.end.to_degrees()],
                theta_range_radians: [0.0, std::f64::consts::TAU],
                grid_dimensions: [grid.resolution(), grid.resolution()],
                field_of_view_degrees: settings.field_of_view.to_degrees(),
                total_cells,
                visited_cells,
                scanned_points,
                total_coverage,
            },
            grid: grid.rows(),
            sample_counts: grid.sample_counts(),
        }
    }
}
