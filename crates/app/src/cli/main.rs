//! Tonestack CLI Application

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tonestack_core::domain::{
    AudioEnumerator, Band, ConfigManager, ControlReadings, ControlSource, ControlSourceKind,
    ThreeBandEqualizer, TonestackConfig, Topology,
};
use tonestack_infra::audio::{AudioEngine, CpalEnumerator};
use tonestack_infra::control::{ControlLoop, FileControls, FixedControls};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tonestack")]
#[command(about = "Three-band tone stack for a live mono input", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the equalizer on the configured devices until Ctrl-C
    Run {
        /// Config file (default: <config dir>/tonestack/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List audio devices
    Devices,

    /// Print the cascade's magnitude response for a set of pot readings
    Response {
        #[arg(long, default_value_t = 0.5)]
        bass: f32,

        #[arg(long, default_value_t = 0.5)]
        mid: f32,

        #[arg(long, default_value_t = 0.5)]
        treble: f32,

        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,

        #[arg(long, value_enum, default_value_t = TopologyArg::OutputFeedback)]
        topology: TopologyArg,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration file
    InitConfig {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TopologyArg {
    OutputFeedback,
    TransposedDirectForm2,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::OutputFeedback => Topology::OutputFeedback,
            TopologyArg::TransposedDirectForm2 => Topology::TransposedDirectForm2,
        }
    }
}

/// How often `run` checks the streams for overruns and underruns
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Frequencies reported by `response`
const REPORT_FREQUENCIES: [f64; 13] = [
    20.0, 50.0, 80.0, 200.0, 500.0, 800.0, 1000.0, 2000.0, 4000.0, 8000.0, 12000.0, 16000.0,
    20000.0,
];

#[derive(Debug, Serialize)]
struct BandReport {
    band: Band,
    pot: f32,
    requested_db: f32,
    installed_db: f32,
    pole_radius: f64,
}

#[derive(Debug, Serialize)]
struct ResponsePoint {
    freq_hz: f64,
    magnitude_db: f64,
}

#[derive(Debug, Serialize)]
struct ResponseReport {
    sample_rate: u32,
    topology: Topology,
    bands: Vec<BandReport>,
    points: Vec<ResponsePoint>,
}

fn build_report(readings: ControlReadings, sample_rate: u32, topology: Topology) -> ResponseReport {
    let control = ThreeBandEqualizer::with_topology(sample_rate as f32, topology).control();

    let bands = Band::ALL
        .iter()
        .map(|&band| {
            let pot = readings.get(band);
            let installed_db = control.set_band(band, pot);
            BandReport {
                band,
                pot: pot.value(),
                requested_db: band.descriptor().gain_db(pot),
                installed_db,
                pole_radius: control.coefficients(band).pole_radius(topology),
            }
        })
        .collect();

    let nyquist = f64::from(sample_rate) / 2.0;
    let points = REPORT_FREQUENCIES
        .iter()
        .filter(|&&freq| freq < nyquist)
        .map(|&freq| ResponsePoint {
            freq_hz: freq,
            magnitude_db: control.magnitude_db(freq),
        })
        .collect();

    ResponseReport {
        sample_rate,
        topology,
        bands,
        points,
    }
}

fn print_report(report: &ResponseReport) {
    println!(
        "{} Hz, {} recurrence",
        report.sample_rate,
        report.topology.name()
    );
    println!();
    println!("{:<8} {:>6} {:>10} {:>10} {:>12}", "band", "pot", "requested", "installed", "pole radius");
    for band in &report.bands {
        println!(
            "{:<8} {:>6.3} {:>7.2} dB {:>7.2} dB {:>12.6}",
            band.band.name(),
            band.pot,
            band.requested_db,
            band.installed_db,
            band.pole_radius
        );
    }
    println!();
    println!("{:>10} {:>10}", "freq", "gain");
    for point in &report.points {
        println!("{:>7.0} Hz {:>7.2} dB", point.freq_hz, point.magnitude_db);
    }
}

fn config_manager(path: Option<PathBuf>) -> anyhow::Result<ConfigManager> {
    Ok(match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(ConfigManager::default_config_dir()?),
    })
}

fn control_source(config: &TonestackConfig) -> anyhow::Result<Box<dyn ControlSource>> {
    Ok(match config.controls.source {
        ControlSourceKind::Fixed => Box::new(FixedControls::new(config.controls.startup)),
        ControlSourceKind::File => {
            let path = config
                .controls
                .file
                .clone()
                .context("controls.file is required for a file control source")?;
            Box::new(FileControls::new(path)?)
        }
    })
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = config_manager(config_path)?;
    let config = manager.load().await;
    config.validate()?;

    let equalizer =
        ThreeBandEqualizer::with_topology(config.engine.sample_rate as f32, config.engine.topology);
    let source = control_source(&config)?;

    let engine = AudioEngine::start(&config, equalizer, &CpalEnumerator::new())?;
    let control_loop = ControlLoop::new(engine.control(), source, config.engine.control_interval());

    let mut monitor = engine.monitor();
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        loop {
            ticker.tick().await;
            monitor.check();
        }
    });

    info!("Running, press Ctrl-C to stop");
    control_loop
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    reporter.abort();
    drop(engine);
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let enumerator = CpalEnumerator::new();
    let default_input = enumerator.default_input_device().ok().map(|d| d.name);
    let default_output = enumerator.default_output_device().ok().map(|d| d.name);

    for device in enumerator.devices()? {
        let mut marks = Vec::new();
        if default_input.as_deref() == Some(device.name.as_str()) {
            marks.push("default input");
        }
        if default_output.as_deref() == Some(device.name.as_str()) {
            marks.push("default output");
        }
        let rate = device
            .default_sample_rate
            .map(|r| format!("{} Hz", r.hz()))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<40} {:<8} {:>9} {}",
            device.name,
            format!("{:?}", device.device_type),
            rate,
            marks.join(", ")
        );
    }
    Ok(())
}

async fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let manager = config_manager(path)?;
    if manager.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            manager.config_path().display()
        );
    }
    manager.save(&TonestackConfig::default()).await?;
    println!("Wrote {}", manager.config_path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Devices => list_devices(),
        Command::Response {
            bass,
            mid,
            treble,
            sample_rate,
            topology,
            json,
        } => {
            anyhow::ensure!(sample_rate > 0, "sample rate must be positive");
            let report = build_report(
                ControlReadings::new(bass, mid, treble),
                sample_rate,
                topology.into(),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Command::InitConfig { config, force } => init_config(config, force).await,
    }
}
