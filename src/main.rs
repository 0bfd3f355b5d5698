//! Motion-sickness logger CLI
//!
//! Collects face, inertial and GPS streams and writes one summary row per
//! second.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use motionsick_logger::{
    collector::{
        nmea, FaceListener, SharedToggleState, SyntheticRig, ToggleFile, ToggleState, TOGGLE_COUNT,
    },
    config::{Config, SourceConfig},
    core::{row::Row, AggregationScheduler, SensorHub},
    session::{create_shared_log_with_persistence, PersistedStats},
    sink::{CsvSink, JsonlSink, RowSink, SinkWorker},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "motionsick-logger")]
#[command(version = VERSION)]
#[command(about = "In-vehicle motion-sickness logger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start logging
    Start {
        /// Input sources (face, gps, synthetic, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Replace every live source with the synthetic rig
        #[arg(long)]
        synthetic: bool,

        /// Output directory for summary logs
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// NMEA serial device (already configured for 9600 8N1)
        #[arg(long)]
        gps_device: Option<PathBuf>,

        /// Also write a JSON Lines summary log
        #[arg(long)]
        jsonl: bool,

        /// Pulse rate simulated by the synthetic rig
        #[arg(long, default_value_t = 72.0)]
        pulse_bpm: f64,

        /// Vehicle speed simulated by the synthetic rig
        #[arg(long, default_value_t = 40.0)]
        speed_kmh: f64,
    },

    /// Show session statistics
    Status,

    /// Set an operator flag on a running logger
    Toggle {
        /// Flag index (0-2)
        index: usize,

        #[arg(value_enum)]
        state: Switch,
    },

    /// List output columns in order
    Columns,

    /// Show configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// Signal parameters for the synthetic rig.
#[derive(Clone, Copy)]
struct RigSettings {
    pulse_bpm: f64,
    speed_kmh: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            sources,
            synthetic,
            output,
            gps_device,
            jsonl,
            pulse_bpm,
            speed_kmh,
        } => {
            let rig = RigSettings {
                pulse_bpm,
                speed_kmh,
            };
            cmd_start(&sources, synthetic, output, gps_device, jsonl, rig).await
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Toggle { index, state } => cmd_toggle(index, state),
        Commands::Columns => {
            cmd_columns();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    }
}

async fn cmd_start(
    sources: &str,
    synthetic: bool,
    output: Option<PathBuf>,
    gps_device: Option<PathBuf>,
    jsonl: bool,
    rig: RigSettings,
) -> Result<()> {
    println!("Motion-Sickness Logger v{VERSION}");
    println!();

    if !(rig.pulse_bpm > 0.0 && rig.pulse_bpm.is_finite()) {
        bail!("--pulse-bpm must be a positive number");
    }
    if !(rig.speed_kmh >= 0.0 && rig.speed_kmh.is_finite()) {
        bail!("--speed-kmh must not be negative");
    }

    let mut config = Config::load().context("loading configuration")?;

    let source_config = if synthetic {
        SourceConfig::from_csv("synthetic")
    } else {
        SourceConfig::from_csv(sources)
    };
    if !source_config.any_enabled() {
        bail!("at least one source must be enabled (face, gps, or synthetic)");
    }
    config.sources = source_config;
    if let Some(output) = output {
        config.output_path = output;
    }
    if gps_device.is_some() {
        config.gps_device = gps_device;
    }
    config.sinks.jsonl |= jsonl;
    config.ensure_directories().context("creating directories")?;

    let session = create_shared_log_with_persistence(config.session_stats_path());
    let hub = SensorHub::new(&config.capacity, session.clone());

    let toggles = ToggleState::shared();
    match ToggleFile::load(&config.toggles_path()) {
        Ok(file) => toggles.apply(&file),
        Err(e) => eprintln!("Warning: Could not read toggle state: {e}"),
    }

    println!("Starting collection...");
    println!("  Session: {}", session.session_id());
    println!("  Face: {}", enabled(config.sources.face));
    println!("  GPS: {}", enabled(config.sources.gps));
    println!("  Synthetic: {}", enabled(config.sources.synthetic));
    println!("  Row period: {}s", config.tick_period.as_secs());
    println!("  Output: {:?}", config.output_path);
    println!();

    let sinks = open_sinks(&config, session.session_id())?;
    let worker = SinkWorker::spawn(sinks, config.sink_queue, session.clone())
        .context("starting sink thread")?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("setting Ctrl+C handler")?;

    let tasks = spawn_producers(&config, &hub, rig, &cancel).await;
    let watcher = tokio::spawn(watch_toggles(
        config.toggles_path(),
        toggles.clone(),
        cancel.clone(),
    ));

    println!("Press Ctrl+C to stop");
    println!();

    let scheduler = AggregationScheduler::new(hub, toggles, &config);
    scheduler.run(worker.sender(), cancel.clone()).await;

    println!();
    println!("Stopping collection...");
    for task in tasks.into_iter().chain(std::iter::once(watcher)) {
        if let Err(e) = task.await {
            tracing::warn!("producer task failed: {e}");
        }
    }
    tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .context("joining sink thread")?;

    if let Err(e) = session.save() {
        eprintln!("Warning: Could not save session stats: {e}");
    }

    println!();
    println!("{}", session.summary());
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Open every configured sink. Names carry the date and a short session id
/// so concurrent runs never share a file.
fn open_sinks(config: &Config, session_id: Uuid) -> Result<Vec<Box<dyn RowSink>>> {
    let stem = format!(
        "summary_log_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        &session_id.simple().to_string()[..8]
    );

    let mut sinks: Vec<Box<dyn RowSink>> = Vec::new();
    if config.sinks.csv {
        let path = config.output_path.join(format!("{stem}.csv"));
        let sink = CsvSink::open(&path).with_context(|| format!("opening {path:?}"))?;
        println!("Writing CSV to {:?}", sink.path());
        sinks.push(Box::new(sink));
    }
    if config.sinks.jsonl {
        let path = config.output_path.join(format!("{stem}.jsonl"));
        let sink = JsonlSink::open(&path).with_context(|| format!("opening {path:?}"))?;
        println!("Writing JSON Lines to {path:?}");
        sinks.push(Box::new(sink));
    }
    if sinks.is_empty() {
        bail!("no sinks enabled; set sinks.csv or sinks.jsonl in the config file");
    }
    Ok(sinks)
}

/// Start the configured producers. A producer that cannot start is
/// reported and skipped; rows keep coming from whatever streams remain.
async fn spawn_producers(
    config: &Config,
    hub: &SensorHub,
    rig: RigSettings,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    if config.sources.face {
        match FaceListener::bind(&config.face_listen_addr, hub.clone()).await {
            Ok(listener) => tasks.push(tokio::spawn(listener.run(cancel.clone()))),
            Err(e) => {
                tracing::error!(addr = %config.face_listen_addr, "face listener failed to bind: {e}")
            }
        }
    }

    if config.sources.gps {
        match config.gps_device.clone() {
            Some(path) => {
                let hub = hub.clone();
                let cancel = cancel.clone();
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = nmea::read_device(&path, hub, cancel).await {
                        tracing::error!(device = %path.display(), "GPS reader stopped: {e}");
                    }
                }));
            }
            None => eprintln!("Warning: GPS enabled but no gps_device configured"),
        }
    }

    if config.sources.synthetic {
        let synthetic = SyntheticRig::new(hub.clone())
            .with_pulse(rig.pulse_bpm)
            .with_speed(rig.speed_kmh);
        tasks.extend(synthetic.spawn(cancel.clone()));
    }

    tasks
}

/// Reload operator flags once per second so `toggle` reaches a running
/// logger.
async fn watch_toggles(path: PathBuf, toggles: SharedToggleState, cancel: CancellationToken) {
    let mut last = toggles.snapshot();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match ToggleFile::load(&path) {
            Ok(file) if file.flags != last => {
                toggles.apply(&file);
                last = file.flags;
                tracing::info!(flags = ?file.flags, "toggles updated");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("could not read toggle file: {e}"),
        }
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Motion-Sickness Logger Status");
    println!("=============================");
    println!();

    println!("Configuration:");
    println!("  Face listener: {}", config.face_listen_addr);
    println!(
        "  GPS device: {}",
        config
            .gps_device
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  Row period: {}s", config.tick_period.as_secs());
    println!("  Output: {:?}", config.output_path);
    println!();

    match ToggleFile::load(&config.toggles_path()) {
        Ok(file) => println!("Toggles: {:?}", file.flags),
        Err(e) => println!("Toggles: unreadable ({e})"),
    }
    println!();

    let stats_path = config.session_stats_path();
    match read_persisted_stats(&stats_path) {
        Some(stats) => {
            println!("Totals (last session {}):", stats.last_session_id);
            println!("  Face samples: {}", stats.face_samples);
            println!("  Face-lost resets: {}", stats.face_lost);
            println!("  Inertial samples: {}", stats.inertial_samples);
            println!("  Position fixes: {}", stats.position_samples);
            println!("  Dropped frames: {}", stats.dropped_frames);
            println!("  Rows written: {}", stats.rows_emitted);
            println!("  Rows dropped: {}", stats.rows_dropped);
            println!("  Last updated: {}", stats.last_updated);
        }
        None => println!("No previous session data found."),
    }
}

fn read_persisted_stats(path: &Path) -> Option<PersistedStats> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn cmd_toggle(index: usize, state: Switch) -> Result<()> {
    if index >= TOGGLE_COUNT {
        bail!("toggle index must be below {TOGGLE_COUNT}");
    }

    let config = Config::load().unwrap_or_default();
    let path = config.toggles_path();
    let mut file = ToggleFile::load(&path).context("reading toggle state")?;
    file.flags[index] = match state {
        Switch::On => 1,
        Switch::Off => 0,
    };
    file.save(&path).context("saving toggle state")?;

    println!("Toggle {index} set. Current flags: {:?}", file.flags);
    Ok(())
}

fn cmd_columns() {
    for (i, name) in Row::column_names().iter().enumerate() {
        println!("{i:>3}  {name}");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
