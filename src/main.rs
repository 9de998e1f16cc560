use anyhow::{anyhow, Context, Result};
use clap::Parser;
use daydream_controller::domain::settings::SettingsService;
use daydream_controller::infrastructure::logging;
use daydream_controller::{
    ConnectionState, ControllerService, ControllerState, ControllerTracker, ServiceConfig,
    TrackedState, TrackerConfig,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Replay captured Daydream controller notifications and print the decoded states
#[derive(Debug, Parser)]
#[command(name = "daydream-replay", version)]
struct Cli {
    /// Hex-encoded frames, one per line. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Settings file instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Battery level to report, percent
    #[arg(long)]
    battery: Option<u8>,

    /// Time between notifications, used for hold detection
    #[arg(long, default_value_t = 15)]
    interval_ms: u64,
}

#[derive(Serialize)]
struct Output<'a> {
    line: usize,
    state: &'a ControllerState,
    tracked: &'a TrackedState,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_service = match &cli.config {
        Some(path) => SettingsService::with_path(path.clone()),
        None => SettingsService::new()?,
    };
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();
    info!("Settings loaded from {}", settings_service.path().display());

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let service = ControllerService::start(ServiceConfig::from(&settings));
    let feeder = service.feeder();
    let mut states = service.subscribe();
    let mut tracker = ControllerTracker::new(TrackerConfig::from(&settings));

    feeder.connection(ConnectionState::Connected)?;
    if let Some(percentage) = cli.battery {
        feeder.battery_level(percentage)?;
    }
    states
        .wait_for(|s| {
            s.connection_state == ConnectionState::Connected
                && (cli.battery.is_none() || s.supports_battery_status)
        })
        .await?;

    let start = Instant::now();
    let interval = Duration::from_millis(cli.interval_ms);
    let mut stdout = io::stdout().lock();
    let mut frames = 0u32;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let bytes = match hex::decode(text.replace(' ', "")) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Line {}: not a hex frame: {}", index + 1, e);
                continue;
            }
        };

        // One state update per frame, malformed ones included
        feeder.frame(&bytes)?;
        states.changed().await?;
        let state = *states.borrow_and_update();

        let tracked = tracker.update(&state, frame_time(start, interval, frames)?);
        frames = frames.checked_add(1).context("too many frames")?;

        let output = Output {
            line: index + 1,
            state: &state,
            tracked: &tracked,
        };
        serde_json::to_writer(&mut stdout, &output)?;
        writeln!(stdout)?;
    }

    let last = service.shutdown().await;
    info!("Replayed {} frames, last sequence {}", frames, last.sequence);

    Ok(())
}

/// Simulated arrival time of the `frame`-th notification
fn frame_time(start: Instant, interval: Duration, frame: u32) -> Result<Instant> {
    interval
        .checked_mul(frame)
        .and_then(|offset| start.checked_add(offset))
        .ok_or_else(|| anyhow!("frame {} at {:?} intervals overflows the clock", frame, interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time_spacing() {
        let start = Instant::now();
        let interval = Duration::from_millis(15);
        assert_eq!(frame_time(start, interval, 0).unwrap(), start);
        assert_eq!(
            frame_time(start, interval, 4).unwrap(),
            start + Duration::from_millis(60)
        );
    }

    #[test]
    fn test_frame_time_overflow_is_an_error() {
        let start = Instant::now();
        assert!(frame_time(start, Duration::from_millis(u64::MAX), 2).is_err());
        assert!(frame_time(start, Duration::MAX, 1).is_err());
    }
}
