//! PacketCopy - packet-based batch file copier
//!
//! Copies a batch of files into one destination directory, packet by packet,
//! with per-packet progress, cooperative cancellation and optional ranking of
//! sources by measured read speed.

mod display;
mod progress;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use packetcopy_config::{Config, ConfigLoader, LoggingConfig};
use packetcopy_engine::{ChannelObserver, CopyEngine, EngineOptions};
use packetcopy_io::{measure_and_sort, SamplerOptions, ThroughputSampler};
use packetcopy_types::{FailurePolicy, JobReport, JobState, PacketSize};
use progress::spawn_progress_task;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

/// PacketCopy - packet-based batch file copier
#[derive(Parser)]
#[command(
    name = "packetcopy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Packet-based batch file copier",
    long_about = "PacketCopy copies a batch of files into one directory in fixed-size packets.\n\
                  It reports progress per packet, can be cancelled at any packet boundary,\n\
                  and can order sources by their measured read speed."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files into a destination directory
    Copy {
        /// Source files or directories
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Destination directory
        #[arg(short = 't', long = "dest")]
        destination: PathBuf,
        /// Packet size, e.g. 64K or 1M
        #[arg(short, long)]
        packet_size: Option<PacketSize>,
        /// Descend into subdirectories of directory sources
        #[arg(short, long)]
        recursive: bool,
        /// Order sources by measured read speed before copying
        #[arg(long)]
        rank: bool,
        /// Skip a file whose packet fails instead of stopping the batch
        #[arg(long)]
        skip_failed: bool,
    },
    /// Measure read speeds and print them fastest first
    Measure {
        /// Files to measure
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show or save configuration
    Config {
        /// Show the built-in defaults instead of the loaded configuration
        #[arg(long)]
        default: bool,
        /// Write the configuration to this file (YAML, TOML or JSON)
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli, &config.logging)?;

    info!("PacketCopy v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Copy {
            sources,
            destination,
            packet_size,
            recursive,
            rank,
            skip_failed,
        } => {
            let request = CopyCommand {
                sources,
                destination,
                packet_size: packet_size.unwrap_or(config.copy.packet_size),
                recursive,
                rank,
                skip_failed,
            };
            copy_command(request, &config, cli.quiet).await
        }
        Commands::Measure { paths } => {
            measure_command(paths, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { default, save } => {
            config_command(&config, default, save.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => ConfigLoader::load_default().context("Failed to load configuration"),
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(cli.debug)
        .with_writer(std::io::stderr);

    let installed = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!(e))
}

struct CopyCommand {
    sources: Vec<PathBuf>,
    destination: PathBuf,
    packet_size: PacketSize,
    recursive: bool,
    rank: bool,
    skip_failed: bool,
}

async fn copy_command(request: CopyCommand, config: &Config, quiet: bool) -> Result<ExitCode> {
    let mut options = EngineOptions::from_config(config);
    if request.skip_failed {
        options.copy.failure_policy = FailurePolicy::SkipFile;
    }
    let engine = CopyEngine::with_options(options);

    for source in &request.sources {
        if source.is_dir() {
            let added = engine.add_directory(source, request.recursive);
            debug!("Registered {} files from {}", added, source.display());
        } else {
            engine.add_source(source);
        }
    }

    let sources = engine.sources();
    if sources.is_empty() {
        bail!("No source files to copy");
    }

    if request.rank {
        let mut sampler = ThroughputSampler::with_options(sampler_options(config));
        let measurements = engine.rank_sources(&mut sampler)?;
        if !quiet {
            display::print_measurements(&measurements);
        }
    }

    if !quiet {
        println!(
            "{} Copying {} files to {} in {} packets",
            style("→").green().bold(),
            style(sources.len()).cyan(),
            style(request.destination.display()).cyan(),
            style(request.packet_size).cyan()
        );
        if !request.rank {
            display::print_sources(&sources);
        }
    }

    let (observer, receiver) = ChannelObserver::new();
    engine.start(&request.destination, request.packet_size, Arc::new(observer))?;
    let progress = spawn_progress_task(receiver, quiet);

    let report = tokio::select! {
        report = engine.wait() => report?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling copy");
            match engine.cancel().await {
                Some(report) => report,
                None => engine.wait().await?,
            }
        }
    };

    // An abandoned worker may still hold the observer, so its channel never closes
    if report.abandoned {
        progress.abort();
    } else if let Err(e) = progress.await {
        debug!("Progress task ended abnormally: {}", e);
    }

    if !quiet {
        display::print_report(&report);
    }

    Ok(ExitCode::from(exit_status(&report)))
}

/// Process exit status for a finished job
fn exit_status(report: &JobReport) -> u8 {
    match report.state {
        JobState::Completed if report.files_failed == 0 => 0,
        JobState::Completed => 2,
        JobState::Cancelled => 130,
        JobState::Failed | JobState::Idle | JobState::Running => 1,
    }
}

fn sampler_options(config: &Config) -> SamplerOptions {
    SamplerOptions {
        sample_size: config.sampling.sample_size,
        sample_count: config.sampling.sample_count,
    }
}

fn measure_command(mut paths: Vec<PathBuf>, config: &Config) -> Result<()> {
    let mut sampler = ThroughputSampler::with_options(sampler_options(config));
    let measurements = measure_and_sort(&mut sampler, &mut paths)?;
    display::print_measurements(&measurements);
    Ok(())
}

fn config_command(config: &Config, default: bool, save: Option<&Path>) -> Result<()> {
    let defaults = Config::default();
    let shown = if default { &defaults } else { config };

    if let Some(path) = save {
        ConfigLoader::save_to_file(shown, path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        println!(
            "{} Configuration written to {}",
            style("✓").green().bold(),
            style(path.display()).cyan()
        );
        return Ok(());
    }

    let title = if default {
        "Default configuration:"
    } else {
        "Current configuration:"
    };
    println!("{} {}", style("⚙").blue().bold(), style(title).bold());
    print!("{}", serde_yaml::to_string(shown)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_copy_command() {
        let cli = Cli::parse_from([
            "packetcopy",
            "copy",
            "a.bin",
            "b.bin",
            "--dest",
            "out",
            "--packet-size",
            "256K",
            "--rank",
        ]);
        match cli.command {
            Commands::Copy {
                sources,
                destination,
                packet_size,
                rank,
                skip_failed,
                ..
            } => {
                assert_eq!(sources, vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")]);
                assert_eq!(destination, PathBuf::from("out"));
                assert_eq!(packet_size, Some(PacketSize::new(256 * 1024).unwrap()));
                assert!(rank);
                assert!(!skip_failed);
            }
            _ => panic!("expected copy command"),
        }
    }

    #[test]
    fn test_parse_rejects_unsupported_packet_size() {
        let result = Cli::try_parse_from([
            "packetcopy",
            "copy",
            "a.bin",
            "--dest",
            "out",
            "--packet-size",
            "48K",
        ]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case(JobState::Completed, 0, 0)]
    #[case(JobState::Completed, 1, 2)]
    #[case(JobState::Cancelled, 0, 130)]
    #[case(JobState::Failed, 0, 1)]
    fn test_exit_status(#[case] state: JobState, #[case] failed: u64, #[case] expected: u8) {
        let mut report = JobReport::new(state);
        report.files_failed = failed;
        report.duration = Duration::from_secs(1);
        assert_eq!(exit_status(&report), expected);
    }
}
