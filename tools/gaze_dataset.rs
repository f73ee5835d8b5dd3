//! Gaze dataset command-line tool.
//!
//! Runs each preparation stage on its own, or whole recording folders end
//! to end.
//!
//! # Usage
//!
//! ```bash
//! # Telemetry log → same log with absolute_timestamp_iso appended
//! gaze-dataset normalize airsim_rec.txt flight_data_with_iso_timestamp.csv
//!
//! # Nearest-timestamp join with the gaze log
//! gaze-dataset merge --telemetry airsim_rec.txt --gaze gaze_log.csv \
//!     --output 12/airsim_with_gaze_closest.csv
//!
//! # Pre-flight checks over a recordings root
//! gaze-dataset check recordings/
//! gaze-dataset inventory recordings/
//!
//! # One episode, or every episode in parallel
//! gaze-dataset convert recordings/12 --output npz/
//! gaze-dataset convert-all recordings/ --output npz/ --threads 4
//!
//! # Print array shapes of an archive
//! gaze-dataset inspect npz/12.npz
//!
//! # Write the default configuration
//! gaze-dataset generate-config dataset.toml
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `gaze_dataset=info`).

use clap::{Parser, Subcommand};
use gaze_dataset::batch::{BatchConfig, BatchProcessor, ConsoleProgress, ErrorMode};
use gaze_dataset::prelude::*;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gaze-dataset")]
#[command(about = "Align drone telemetry, gaze and imagery into per-episode .npz datasets")]
struct Args {
    /// Pipeline configuration (TOML, or JSON by extension); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append the canonical timestamp column to a telemetry log
    Normalize {
        /// Tab-separated telemetry log
        input: PathBuf,
        /// Output path (tab-separated)
        output: PathBuf,
    },

    /// Join a telemetry log with a gaze log by nearest timestamp
    Merge {
        #[arg(long)]
        telemetry: PathBuf,
        #[arg(long)]
        gaze: PathBuf,
        #[arg(short, long, default_value = "airsim_with_gaze_closest.csv")]
        output: PathBuf,
    },

    /// Compare image counts with merged-table rows for every episode
    Check {
        root: PathBuf,
    },

    /// Count RGB and depth files for every episode
    Inventory {
        root: PathBuf,
    },

    /// Convert one episode directory into an archive
    Convert {
        episode: PathBuf,
        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert every episode under a root directory in parallel
    ConvertAll {
        root: PathBuf,
        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (default: all cores)
        #[arg(short, long)]
        threads: Option<NonZeroUsize>,
        /// Stop at the first failed episode
        #[arg(long)]
        fail_fast: bool,
        /// One progress line per episode, with time remaining
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the arrays and shapes stored in an archive
    Inspect {
        archive: PathBuf,
    },

    /// Write the default configuration (TOML, or JSON by extension)
    GenerateConfig {
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gaze_dataset=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = if is_json(path) {
                PipelineConfig::load_json(path)?
            } else {
                PipelineConfig::load_toml(path)?
            };
            info!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Normalize { input, output } => {
            let (written, dropped) = normalize_telemetry_file(&input, &output, &config)?;
            println!("Wrote {written} rows to {} ({dropped} dropped)", output.display());
        }

        Command::Merge {
            telemetry,
            gaze,
            output,
        } => {
            let summary = merge_logs(&telemetry, &gaze, &output, &config)?;
            let report = &summary.report;
            println!("Merged data saved to {}", output.display());
            println!(
                "  Rows: {} ({} telemetry dropped, {} gaze dropped)",
                summary.rows_written, summary.telemetry_dropped, summary.gaze_dropped
            );
            println!(
                "  Match distance: mean {:.1} ms, max {:.1} ms, {} beyond {} ms",
                report.mean_distance_us / 1_000.0,
                report.max_distance_us as f64 / 1_000.0,
                report.beyond_threshold,
                config.clock.match_distance_warn_ms
            );
        }

        Command::Check { root } => {
            for report in check_all(&root, &config.layout)? {
                println!("{report}");
            }
        }

        Command::Inventory { root } => {
            print!("{}", inventory(&root, &config.layout)?);
        }

        Command::Convert { episode, output } => {
            if let Some(dir) = output {
                config = config.with_output_dir(dir);
            }
            let pipeline = EpisodePipeline::from_config(config)?;
            println!("{}", pipeline.process_episode(&episode)?);
        }

        Command::ConvertAll {
            root,
            output,
            threads,
            fail_fast,
            verbose,
        } => {
            if let Some(dir) = output {
                config = config.with_output_dir(dir);
            }
            let mut batch_config = BatchConfig::new().with_error_mode(if fail_fast {
                ErrorMode::FailFast
            } else {
                ErrorMode::CollectErrors
            });
            if let Some(n) = threads {
                batch_config = batch_config.with_threads(n.get());
            }

            let progress = if verbose {
                ConsoleProgress::new().verbose()
            } else {
                ConsoleProgress::new()
            };
            let processor = BatchProcessor::new(config, batch_config)?
                .with_progress_callback(Box::new(progress));
            let output = processor.process_root(&root)?;
            if !output.all_successful() {
                return Err(DatasetError::generic(format!(
                    "{} of {} episodes failed",
                    output.failed_count(),
                    output.failed_count() + output.successful_count()
                )));
            }
        }

        Command::Inspect { archive } => {
            print!("{}", inspect_archive(&archive)?);
        }

        Command::GenerateConfig { path } => {
            if is_json(&path) {
                PipelineConfig::default().save_json(&path)?;
            } else {
                PipelineConfig::default().save_toml(&path)?;
            }
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}
