//! opflash command-line interface.
//!
//! Runs the flash finder over a JSON readout and writes hits, flashes and
//! their hit clusters.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};
use opflash_algorithms::{FlashFinder, FlashFinderOutput};
use opflash_core::config::FlashFinderConfig;
use opflash_core::geometry::ChannelPositions;
use opflash_core::trigger::BeamGate;
use opflash_core::waveform::Waveform;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] opflash_core::ConfigError),

    #[error("Reconstruction error: {0}")]
    Core(#[from] opflash_core::Error),
}

/// One readout: digitized waveforms plus the beam markers and detector layout.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Readout {
    waveforms: Vec<Waveform>,
    beam_gates: Vec<BeamGate>,
    channel_positions: ChannelPositions,
}

/// Optical flash finder for scintillation detector readouts.
#[derive(Parser)]
#[command(name = "opflash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct hits and flashes from a JSON readout
    Process {
        /// Input readout (JSON)
        input: PathBuf,

        /// Output file path (.json for the full result, .csv for a flash table)
        #[arg(short, long)]
        output: PathBuf,

        /// Flash finder configuration (JSON); defaults are used when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Summarize a JSON readout
    Info {
        /// Input readout (JSON)
        input: PathBuf,
    },

    /// Print the default configuration as JSON
    DefaultConfig,
}

fn load_config(path: Option<&Path>) -> Result<FlashFinderConfig> {
    let config = match path {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => FlashFinderConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_readout(path: &Path) -> Result<Readout> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

fn write_flash_csv<W: Write>(out: &mut W, output: &FlashFinderOutput) -> Result<()> {
    writeln!(
        out,
        "frame,time_ns,time_width_ns,abs_time_ns,total_pe,n_hits,n_channels,y,z,on_beam"
    )?;
    for flash in &output.flashes {
        writeln!(
            out,
            "{},{:.3},{:.3},{:.3},{:.3},{},{},{:.3},{:.3},{}",
            flash.frame,
            flash.time,
            flash.time_width,
            flash.abs_time,
            flash.total_pe,
            flash.n_hits,
            flash.n_active_channels(),
            flash.center[1],
            flash.center[2],
            flash.on_beam
        )?;
    }
    Ok(())
}

fn write_output(path: &Path, output: &FlashFinderOutput) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(|| "json".to_string(), str::to_lowercase);
    match format.as_str() {
        "csv" => write_flash_csv(&mut writer, output)?,
        "json" => serde_json::to_writer_pretty(&mut writer, output)?,
        other => {
            log::warn!("unknown extension '{other}', writing JSON");
            serde_json::to_writer_pretty(&mut writer, output)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "warn" };
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(default_level),
            )
            .init();

            let config = load_config(config.as_deref())?;
            log::info!(
                "{} channel(s), {:?} pulse finding, {} ns flash window",
                config.n_channels,
                config.pulse.algorithm,
                config.clustering.flash_width_ns
            );

            let readout = load_readout(&input)?;
            let geometry = if readout.channel_positions.as_slice().is_empty() {
                ChannelPositions::unplaced(config.n_channels)
            } else {
                readout.channel_positions
            };

            let start = Instant::now();
            let finder = FlashFinder::new(config)?;
            let result =
                finder.run_flash_finder(&readout.waveforms, &readout.beam_gates, &geometry)?;
            let elapsed = start.elapsed();

            write_output(&output, &result)?;

            println!(
                "Processed {} waveform(s) in {} frame(s) in {:.3}s",
                result.statistics.waveforms_processed,
                result.statistics.frames,
                elapsed.as_secs_f64()
            );
            println!("Hits: {}", result.hits.len());
            println!("Flashes: {}", result.flashes.len());
            if verbose {
                println!(
                    "Rejected waveforms: {}",
                    result.statistics.waveforms_rejected
                );
                println!(
                    "Clusters split/rejected: {}/{}",
                    result.statistics.clustering.clusters_split,
                    result.statistics.clustering.clusters_rejected
                );
                println!(
                    "Late-light flashes removed: {}",
                    result.statistics.late_light_removed
                );
            }
            if result.trigger.found {
                println!("Trigger: {:.3} ns", result.trigger.time_ns);
            } else {
                println!("Trigger: none");
            }
        }

        Commands::Info { input } => {
            env_logger::init();
            let readout = load_readout(&input)?;

            println!("File: {}", input.display());
            println!("Waveforms: {}", readout.waveforms.len());
            println!("Beam gates: {}", readout.beam_gates.len());
            println!(
                "Channel positions: {}",
                readout.channel_positions.as_slice().len()
            );

            let frames = readout.waveforms.iter().map(|wf| wf.frame);
            if let (Some(min), Some(max)) = (frames.clone().min(), frames.max()) {
                println!("Frame range: {} - {}", min, max);
            }
            let channels = readout.waveforms.iter().map(|wf| wf.channel);
            if let (Some(min), Some(max)) = (channels.clone().min(), channels.max()) {
                println!("Channel range: {} - {}", min, max);
            }
            let samples: usize = readout.waveforms.iter().map(Waveform::len).sum();
            if !readout.waveforms.is_empty() {
                println!(
                    "Samples: {} ({:.1} per waveform)",
                    samples,
                    samples as f64 / readout.waveforms.len() as f64
                );
            }
        }

        Commands::DefaultConfig => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &FlashFinderConfig::default())?;
            writeln!(out)?;
        }
    }

    Ok(())
}
