//! Vehicle CAN CLI Application
//!
//! Command-line consumer of the vehicle-can library. It opens the vehicle
//! bus (or replays a candump log), runs the ingestion thread and prints a
//! snapshot of every decoded parameter at a fixed period.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vehicle_can::{
    DecoderTable, FrameTransport, Ingestion, ReplayTransport, UnitSystem, VehicleSignals,
};

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::Snapshot;

/// Receive timeout applied to a live bus when none is configured, so a stop
/// request is noticed on a quiet bus
#[cfg(target_os = "linux")]
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Vehicle CAN - Decode and display live vehicle parameters
#[derive(Parser, Debug)]
#[command(name = "vehicle-can-cli")]
#[command(about = "Decode and display vehicle parameters from a CAN bus", long_about = None)]
#[command(version)]
struct Args {
    /// CAN interface to bind (default: can0, then vcan0)
    #[arg(short, long, value_name = "NAME")]
    interface: Option<String>,

    /// Replay a candump log instead of reading a live bus
    #[arg(short, long, value_name = "FILE", conflicts_with = "interface")]
    replay: Option<PathBuf>,

    /// Pace replay by the recorded timestamps
    #[arg(long, requires = "replay")]
    realtime: bool,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show imperial units
    #[arg(long)]
    imperial: bool,

    /// Snapshot output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Time between snapshots in milliseconds
    #[arg(long, value_name = "MS")]
    period_ms: Option<u64>,

    /// Stop after this many snapshots
    #[arg(short = 'n', long, value_name = "COUNT")]
    iterations: Option<u64>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Vehicle CAN CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using vehicle-can library v{}", vehicle_can::VERSION);

    let config = build_config(&args)?;
    log::debug!("Effective configuration: {:?}", config);

    run(&args, &config)
}

/// Load the config file, if any, and apply command line overrides
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(interface) = &args.interface {
        config.bus.interface = Some(interface.clone());
    }
    if args.imperial {
        config.display.units = UnitSystem::Imperial;
    }
    if let Some(format) = args.format {
        config.display.format = format;
    }
    if let Some(period_ms) = args.period_ms {
        anyhow::ensure!(period_ms > 0, "--period-ms must be greater than zero");
        config.display.period_ms = period_ms;
    }
    Ok(config)
}

fn open_transport(args: &Args, config: &AppConfig) -> Result<Box<dyn FrameTransport>> {
    if let Some(path) = &args.replay {
        let replay = ReplayTransport::open(path)
            .with_context(|| format!("Failed to open replay log: {:?}", path))?
            .with_realtime(args.realtime);
        return Ok(Box::new(replay));
    }

    open_bus(config)
}

#[cfg(target_os = "linux")]
fn open_bus(config: &AppConfig) -> Result<Box<dyn FrameTransport>> {
    let mut bus_config = config.bus.clone();
    if bus_config.read_timeout_ms.is_none() {
        bus_config = bus_config.with_read_timeout(DEFAULT_READ_TIMEOUT);
    }

    let bus = vehicle_can::SocketCanBus::from_config(&bus_config)
        .with_context(|| format!("Failed to open CAN bus ({})", bus_config.candidates().join(", ")))?;
    Ok(Box::new(bus))
}

#[cfg(not(target_os = "linux"))]
fn open_bus(_config: &AppConfig) -> Result<Box<dyn FrameTransport>> {
    anyhow::bail!("Live CAN buses need SocketCAN (Linux); use --replay instead")
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let selected = config.display.selected_signals()?;
    let transport = open_transport(args, config)?;

    let table = Arc::new(DecoderTable::vehicle());
    let stats = table.stats();
    log::info!(
        "Decoder table: {} messages, {} fields",
        stats.num_messages,
        stats.num_fields
    );

    let signals = Arc::new(VehicleSignals::new());
    let handle = Ingestion::new(transport, table, signals.clone())
        .with_config(config.ingest.clone())
        .spawn()
        .context("Failed to start ingestion thread")?;

    let mut printed = 0u64;
    loop {
        thread::sleep(config.display.period());

        // a finished replay still gets one final snapshot
        let finished = handle.is_finished();
        let snapshot = Snapshot::capture(
            &signals,
            &selected,
            &config.display,
            handle.stats(),
            chrono::Utc::now(),
        );
        println!("{}", snapshot.render(config.display.format)?);
        printed += 1;

        if finished || args.iterations.is_some_and(|n| printed >= n) {
            break;
        }
    }

    handle.stop();
    let stats = handle.join();
    log::info!(
        "Done: {} frames received, {} decoded, {} ignored, {} receive errors",
        stats.frames_received,
        stats.frames_decoded,
        stats.frames_ignored,
        stats.receive_errors
    );

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "vehicle-can-cli",
            "--interface",
            "vcan3",
            "--imperial",
            "--format",
            "json",
            "--period-ms",
            "250",
            "-n",
            "2",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.bus.candidates(), vec!["vcan3"]);
        assert_eq!(config.display.units, UnitSystem::Imperial);
        assert_eq!(config.display.format, OutputFormat::Json);
        assert_eq!(config.display.period_ms, 250);
        assert_eq!(args.iterations, Some(2));
    }

    #[test]
    fn test_replay_conflicts_with_interface() {
        let result = Args::try_parse_from([
            "vehicle-can-cli",
            "--interface",
            "can0",
            "--replay",
            "drive.log",
        ]);
        assert!(result.is_err());

        assert!(Args::try_parse_from(["vehicle-can-cli", "--realtime"]).is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let args = Args::parse_from(["vehicle-can-cli", "--period-ms", "0"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_replay_run_ends_with_log() {
        use std::io::Write;

        let mut log = tempfile::NamedTempFile::new().unwrap();
        writeln!(log, "(1.000000) can0 0B4#0000000000138800").unwrap();
        writeln!(log, "(1.001000) can0 03B#006400C8").unwrap();

        let path = log.path().to_str().unwrap();
        let args = Args::parse_from(["vehicle-can-cli", "--replay", path, "--period-ms", "20"]);
        let config = build_config(&args).unwrap();
        run(&args, &config).unwrap();
    }
}
