//! Sky coverage tracking.
//!
//! Each accepted orientation is turned into a camera look direction, the
//! lens footprint around it is rasterized into points on the sky sphere, and
//! coverage is measured as the share of a fixed grid over the scannable band
//! that those points touch.

pub mod clock;
pub mod export;
pub mod footprint;
pub mod geometry;
pub mod grid;
pub mod tracker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use export::{CoverageMap, CoverageMapMetadata};
pub use footprint::Footprint;
pub use geometry::{LookDirection, SkyBand, DEFAULT_PITCH_OFFSET};
pub use grid::CoverageGrid;
pub use tracker::{
    CoverageCallback, CoverageSettings, CoverageStats, CoverageTracker, ScanCoverage, ScanPoint,
    SettingsError, UpdateOutcome,
};
