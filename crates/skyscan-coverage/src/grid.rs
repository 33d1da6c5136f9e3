use crate::geometry::SkyBand;
use crate::tracker::ScanPoint;
use std::f64::consts::TAU;

/// Square grid of per-cell sample counts over the sky band. A cell is
/// visited once any point has landed in it.
///
/// Rows split the band's polar range, columns split the full azimuth.
/// Points slightly outside the band (within its tolerance) land in the edge
/// rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageGrid {
    resolution: usize,
    band: SkyBand,
    counts: Vec<u32>,
}

impl CoverageGrid {
    pub fn new(resolution: usize, band: SkyBand) -> Self {
        Self {
            resolution,
            band,
            counts: vec![0; resolution * resolution],
        }
    }

    /// Build a grid from scratch out of a full point history.
    pub fn from_points(resolution: usize, band: SkyBand, points: &[ScanPoint]) -> Self {
        let mut grid = Self::new(resolution, band);
        for point in points {
            grid.mark(point.phi, point.theta);
        }
        grid
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn band(&self) -> &SkyBand {
        &self.band
    }

    /// Cell `(row, column)` for a sky position.
    pub fn cell_of(&self, phi: f64, theta: f64) -> (usize, usize) {
        let last = self.resolution.saturating_sub(1);
        let r = self.resolution as f64;
        let row = ((phi - self.band.start) / self.band.width() * r).floor();
        let column = (theta / TAU * r).floor();
        (clamp_index(row, last), clamp_index(column, last))
    }

    pub fn mark(&mut self, phi: f64, theta: f64) {
        if self.counts.is_empty() {
            return;
        }
        let (row, column) = self.cell_of(phi, theta);
        let count = &mut self.counts[row * self.resolution + column];
        *count = count.saturating_add(1);
    }

    /// Points that landed in a cell; 0 outside the grid.
    pub fn sample_count(&self, row: usize, column: usize) -> u32 {
        if row < self.resolution && column < self.resolution {
            self.counts[row * self.resolution + column]
        } else {
            0
        }
    }

    pub fn is_visited(&self, row: usize, column: usize) -> bool {
        self.sample_count(row, column) > 0
    }

    pub fn total_cells(&self) -> usize {
        self.counts.len()
    }

    pub fn visited_cells(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    /// Visited share of the grid in `[0, 100]`.
    pub fn coverage_percent(&self) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }
        (self.visited_cells() as f64 / self.total_cells() as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Visited flags, one `Vec` per polar row.
    pub fn rows(&self) -> Vec<Vec<bool>> {
        self.counts
            .chunks(self.resolution.max(1))
            .map(|row| row.iter().map(|&count| count > 0).collect())
            .collect()
    }

    /// Per-cell sample counts, one `Vec` per polar row.
    pub fn sample_counts(&self) -> Vec<Vec<u32>> {
        self.counts
            .chunks(self.resolution.max(1))
            .map(<[u32]>::to_vec)
            .collect()
    }
}

fn clamp_index(value: f64, last: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value as usize).min(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use std::time::Duration;

    fn point(phi: f64, theta: f64) -> ScanPoint {
        ScanPoint {
            phi,
            theta,
            timestamp: Duration::ZERO,
        }
    }

    #[test]
    fn band_edges_map_to_edge_rows() {
        let band = SkyBand::default();
        let grid = CoverageGrid::new(10, band);
        assert_eq!(grid.cell_of(band.start, 0.0), (0, 0));
        assert_eq!(grid.cell_of(band.start - 0.03, 0.0).0, 0);
        assert_eq!(grid.cell_of(PI, 0.0).0, 9);
        assert_eq!(grid.cell_of(PI + 0.01, TAU - 1e-9), (9, 9));
    }

    #[test]
    fn duplicates_count_once() {
        let band = SkyBand::default();
        let points = vec![point(2.5, 1.0); 50];
        let grid = CoverageGrid::from_points(10, band, &points);
        assert_eq!(grid.visited_cells(), 1);
        assert!((grid.coverage_percent() - 1.0).abs() < 1e-12);

        let (row, column) = grid.cell_of(2.5, 1.0);
        assert_eq!(grid.sample_count(row, column), 50);
        assert!(grid.is_visited(row, column));
        assert_eq!(grid.sample_count(10, 0), 0);
    }

    #[test]
    fn every_cell_marked_is_full() {
        let band = SkyBand::default();
        let resolution = 12;
        let mut grid = CoverageGrid::new(resolution, band);
        for row in 0..resolution {
            for column in 0..resolution {
                let phi = band.start + (row as f64 + 0.5) * band.width() / resolution as f64;
                let theta = (column as f64 + 0.5) * TAU / resolution as f64;
                grid.mark(phi, theta);
            }
        }
        assert_eq!(grid.visited_cells(), resolution * resolution);
        assert_eq!(grid.coverage_percent(), 100.0);
        assert!(grid.rows().iter().all(|row| row.iter().all(|&cell| cell)));
    }

    #[test]
    fn empty_history_is_zero() {
        let grid = CoverageGrid::from_points(14, SkyBand::default(), &[]);
        assert_eq!(grid.coverage_percent(), 0.0);
        assert_eq!(grid.rows().len(), 14);
    }
}
