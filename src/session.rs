use anyhow::Result;
use skyscan_config::AppConfig;
use skyscan_coverage::{
    Clock, CoverageMap, CoverageStats, CoverageTracker, ManualClock, UpdateOutcome,
};
use skyscan_imu::{OrientationEstimator, SensorSample};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::watch;

/// Latest coverage reported by the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    pub total_coverage: f64,
    pub scanned_points: usize,
}

/// Counts of what happened to the orientations the estimator produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub recorded: u64,
    pub throttled: u64,
    pub out_of_band: u64,
}

/// One scan: an estimator feeding a tracker that runs on sample time.
///
/// Sample timestamps drive the tracker clock, so a recording replays with
/// the same throttling it had when captured, however fast it is fed.
pub struct ScanSession {
    estimator: OrientationEstimator,
    tracker: Rc<RefCell<CoverageTracker<ManualClock>>>,
    clock: ManualClock,
    counts: Rc<Cell<UpdateCounts>>,
    progress_rx: watch::Receiver<Progress>,
    samples: u64,
}

impl ScanSession {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut estimator = OrientationEstimator::new(config.imu.estimator_settings())?;
        let clock = ManualClock::new();
        let tracker = Rc::new(RefCell::new(CoverageTracker::with_clock(
            config.coverage.coverage_settings(),
            clock.clone(),
        )?));

        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        tracker.borrow_mut().on_coverage_change(move |coverage| {
            let _ = progress_tx.send(Progress {
                total_coverage: coverage.total_coverage,
                scanned_points: coverage.scanned_points.len(),
            });
        });

        let counts = Rc::new(Cell::new(UpdateCounts::default()));
        let downstream = tracker.clone();
        let tally = counts.clone();
        estimator.on_orientation_change(move |orientation| {
            let outcome = downstream.borrow_mut().update_orientation(orientation);
            let mut counts = tally.get();
            match outcome {
                UpdateOutcome::Recorded { .. } => counts.recorded += 1,
                UpdateOutcome::Throttled => counts.throttled += 1,
                UpdateOutcome::OutOfBand => counts.out_of_band += 1,
            }
            tally.set(counts);
        });

        Ok(Self {
            estimator,
            tracker,
            clock,
            counts,
            progress_rx,
            samples: 0,
        })
    }

    pub fn start(&mut self) {
        self.estimator.start();
    }

    pub fn stop(&mut self) {
        self.estimator.stop();
    }

    /// Receiver that sees every coverage broadcast.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress_rx.clone()
    }

    pub fn feed(&mut self, sample: SensorSample) {
        // The tracker clock never runs backwards, even for out-of-order samples.
        if sample.timestamp() > self.clock.now() {
            self.clock.set(sample.timestamp());
        }
        self.estimator.on_sample(sample);
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn counts(&self) -> UpdateCounts {
        self.counts.get()
    }

    pub fn statistics(&self) -> CoverageStats {
        self.tracker.borrow().statistics()
    }

    pub fn magnetic_heading(&self) -> Option<f64> {
        self.estimator.magnetic_heading()
    }

    pub fn coverage_map(&self) -> CoverageMap {
        CoverageMap::from_tracker(&self.tracker.borrow())
    }
}
