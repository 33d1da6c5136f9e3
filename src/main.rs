mod session;
mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use session::{Progress, ScanSession};
use simulate::SweepPlan;
use skyscan_config::AppConfig;
use skyscan_imu::RecordingParser;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "skyscan", version, about = "Sky coverage from phone motion sensors")]
struct Cli {
    /// Config file to use instead of <config dir>/skyscan/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a sensor recording through the estimator and coverage tracker.
    Replay {
        /// Recording with one `kind,seconds,x,y,z` sample per line.
        log: PathBuf,
        /// Write the final coverage map as JSON.
        #[arg(long)]
        export: Option<PathBuf>,
        /// Pace samples by their timestamps instead of as fast as possible.
        #[arg(long)]
        realtime: bool,
    },
    /// Generate a synthetic sweep over the band and replay it.
    Simulate {
        /// Number of full turns, evenly spaced across the band.
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        rings: u32,
        /// Write the final coverage map as JSON.
        #[arg(long)]
        export: Option<PathBuf>,
        /// Also save the generated samples as a recording.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "skyscan=info,skyscan_imu=info,skyscan_coverage=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => skyscan_config::load_config_from(path)?,
        None => skyscan_config::load_config().unwrap_or_else(|e| {
            warn!(?e, "Failed to load config, using defaults");
            AppConfig::default()
        }),
    };
    info!(
        grid = config.coverage.grid_resolution,
        fov_deg = config.coverage.field_of_view_deg,
        drift_correction = config.imu.drift_correction,
        "Config loaded"
    );

    match cli.command {
        Command::Replay {
            log,
            export,
            realtime,
        } => {
            let session = ScanSession::new(&config)?;
            let reporter = spawn_reporter(session.subscribe());
            let session = replay(session, &log, realtime).await?;
            finish(session, reporter, export.as_deref()).await
        }
        Command::Simulate {
            rings,
            export,
            output,
        } => {
            let plan = SweepPlan::from_config(&config, rings);
            if let Some(path) = &output {
                tokio::fs::write(path, plan.to_recording())
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(?path, "Recording saved");
            }

            let mut session = ScanSession::new(&config)?;
            let reporter = spawn_reporter(session.subscribe());
            session.start();
            for sample in plan.samples() {
                session.feed(sample);
            }
            session.stop();
            finish(session, reporter, export.as_deref()).await
        }
    }
}

/// Stream a recording file through the session, chunk by chunk.
async fn replay(mut session: ScanSession, path: &Path, realtime: bool) -> Result<ScanSession> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    info!(?path, realtime, "Replaying recording");

    let mut parser = RecordingParser::new();
    let mut buf = [0u8; 4096];
    let mut skipped: u64 = 0;
    let origin = tokio::time::Instant::now();
    session.start();

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            parser.finish();
        } else {
            parser.push_data(&buf[..n]);
        }

        // Drain all complete lines.
        while let Some(result) = parser.next_sample() {
            match result {
                Ok(sample) => {
                    if realtime {
                        tokio::time::sleep_until(origin + sample.timestamp()).await;
                    }
                    session.feed(sample);
                }
                Err(e) => {
                    warn!(%e, "Skipping malformed recording line");
                    skipped += 1;
                }
            }
        }

        if n == 0 {
            break;
        }
    }

    session.stop();
    if skipped > 0 {
        warn!(skipped, "Recording had malformed lines");
    }
    Ok(session)
}

/// Log coverage each time it crosses another tenth of the band.
fn spawn_reporter(mut progress: watch::Receiver<Progress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_step = 0;
        while progress.changed().await.is_ok() {
            let Progress {
                total_coverage,
                scanned_points,
            } = *progress.borrow_and_update();
            let step = (total_coverage / 10.0).floor() as u32;
            if step != last_step {
                info!(
                    coverage = %format!("{total_coverage:.1}%"),
                    scanned_points, "Coverage progress"
                );
                last_step = step;
            }
        }
    })
}

async fn finish(
    session: ScanSession,
    reporter: JoinHandle<()>,
    export: Option<&Path>,
) -> Result<()> {
    let stats = session.statistics();
    let counts = session.counts();
    info!(
        samples = session.samples(),
        recorded = counts.recorded,
        throttled = counts.throttled,
        out_of_band = counts.out_of_band,
        "Replay finished"
    );
    if let Some(heading) = session.magnetic_heading() {
        info!(heading_deg = heading.to_degrees(), "Final magnetic heading");
    }

    if let Some(path) = export {
        let json = serde_json::to_string_pretty(&session.coverage_map())?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(?path, "Coverage map exported");
    }

    // Dropping the session closes the progress channel and ends the reporter.
    drop(session);
    reporter.await?;

    println!(
        "coverage {:.1}% ({} of {} cells, {} points)",
        stats.total_coverage, stats.visited_cells, stats.total_cells, stats.scanned_points
    );
    Ok(())
}
