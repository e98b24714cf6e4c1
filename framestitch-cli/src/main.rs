//! framestitch CLI.
//!
//! Stitches WFM event data in NeXus files against a frame catalogue.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use framestitch_algorithms::{ClassifierKind, StitchStatistics};
use framestitch_core::{FrameCatalogue, SourceCategory};
use framestitch_io::{
    list_entries, load_entries, read_catalogue, stitch_file, FileReport, IndexConvention,
    StitchOptions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    FramestitchIo(#[from] framestitch_io::Error),

    #[error("failed to write summary: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("{files} file(s) and {entries} of {total} entries could not be stitched")]
    StitchFailed {
        files: usize,
        entries: usize,
        total: usize,
    },
}

/// Frame classifier selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Classifier {
    /// First-match scan over the frames
    Linear,
    /// Binary search over precomputed intervals
    Interval,
}

impl From<Classifier> for ClassifierKind {
    fn from(value: Classifier) -> Self {
        match value {
            Classifier::Linear => Self::Linear,
            Classifier::Interval => Self::Interval,
        }
    }
}

/// On-disk `event_index` layout.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexLayout {
    /// First event of each pulse (NeXus)
    PulseStart,
    /// Cumulative counts with a trailing total
    FencePost,
}

impl From<IndexLayout> for IndexConvention {
    fn from(value: IndexLayout) -> Self {
        match value {
            IndexLayout::PulseStart => Self::PulseStart,
            IndexLayout::FencePost => Self::FencePost,
        }
    }
}

/// Wavelength-frame-multiplication event stitcher.
#[derive(Parser)]
#[command(name = "framestitch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch event entries into `<stem>_stitched.<ext>` copies
    Stitch {
        /// Input NeXus file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Frame catalogue (JSON)
        #[arg(short, long)]
        frames: PathBuf,

        /// Comma-separated entry paths; discovered automatically if omitted
        #[arg(short, long, value_delimiter = ',')]
        entries: Option<Vec<String>>,

        /// Directory for output files (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Frame classifier
        #[arg(long, value_enum, default_value = "linear")]
        classifier: Classifier,

        /// Layout of the event_index datasets
        #[arg(long, value_enum, default_value = "pulse-start")]
        index_convention: IndexLayout,

        /// Worker threads for stitching entries
        #[arg(short, long)]
        threads: Option<usize>,

        /// Write a JSON summary of every entry to this path
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// List the event entries of a NeXus file
    Info {
        /// Input NeXus file
        input: PathBuf,

        /// Layout of the event_index datasets
        #[arg(long, value_enum, default_value = "pulse-start")]
        index_convention: IndexLayout,
    },

    /// Validate a frame catalogue and print its frames
    CheckFrames {
        /// Frame catalogue (JSON)
        frames: PathBuf,
    },
}

#[derive(Serialize)]
struct EntrySummary<'a> {
    entry: &'a str,
    category: SourceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<&'a StitchStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct FileSummary<'a> {
    input: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    entries: Vec<EntrySummary<'a>>,
}

/// Result of stitching one input file.
struct FileOutcome {
    input: PathBuf,
    result: std::result::Result<FileReport, framestitch_io::Error>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("framestitch: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        let default_level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Stitch {
            input,
            frames,
            entries,
            output_dir,
            classifier,
            index_convention,
            threads,
            summary_json,
        } => {
            let catalogue = load_catalogue(&frames)?;

            let mut options = StitchOptions::default()
                .with_classifier(classifier.into())
                .with_index_convention(index_convention.into());
            if let Some(threads) = threads {
                options = options.try_with_parallelism(threads)?;
            }
            if let Some(entries) = entries {
                options = options.with_entries(entries);
            }
            if let Some(dir) = output_dir {
                std::fs::create_dir_all(&dir)?;
                options = options.with_output_dir(dir);
            }

            let start = Instant::now();
            let outcomes: Vec<FileOutcome> = input
                .into_iter()
                .map(|path| {
                    let result = stitch_file(&path, &catalogue, &options);
                    if let Err(err) = &result {
                        warn!(file = %path.display(), error = %err, "file not stitched");
                    }
                    FileOutcome {
                        input: path,
                        result,
                    }
                })
                .collect();

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(report) => print_report(report),
                    Err(err) => println!("{}: FAILED: {}", outcome.input.display(), err),
                }
            }
            println!(
                "Processed {} file(s) in {:.2}s",
                outcomes.len(),
                start.elapsed().as_secs_f64()
            );

            if let Some(path) = summary_json {
                write_summary(&path, &outcomes)?;
                info!(path = %path.display(), "wrote summary");
            }

            let reports = outcomes.iter().filter_map(|o| o.result.as_ref().ok());
            let total: usize = reports.clone().map(|r| r.entries.len()).sum();
            let entries: usize = reports.map(|r| r.failures().count()).sum();
            let files = outcomes.iter().filter(|o| o.result.is_err()).count();
            if files > 0 || entries > 0 {
                return Err(CliError::StitchFailed {
                    files,
                    entries,
                    total,
                });
            }
        }

        Commands::Info {
            input,
            index_convention,
        } => {
            let names = list_entries(&input)?;
            println!("File: {}", input.display());
            println!("Event entries: {}", names.len());

            for name in names {
                let loaded = load_entries(
                    &input,
                    Some(std::slice::from_ref(&name)),
                    index_convention.into(),
                );
                match loaded.as_deref() {
                    Ok([entry]) => {
                        println!("  {} ({})", entry.name, entry.category);
                        println!(
                            "    events: {}  pulses: {}  stored as {} {}",
                            entry.batch.len(),
                            entry.batch.pulse_count(),
                            entry.encoding.storage,
                            entry.encoding.unit
                        );
                        if let Some((min, max)) = entry.batch.time_range() {
                            println!("    time-of-flight: {:.3} - {:.3} us", min, max);
                        }
                    }
                    Ok(_) => warn!(entry = %name, "unexpected number of entries loaded"),
                    Err(err) => println!("  {}: {}", name, err),
                }
            }
        }

        Commands::CheckFrames { frames } => {
            let catalogue = load_catalogue(&frames)?;
            for category in catalogue.categories() {
                println!("{category}:");
                let descriptors = catalogue
                    .descriptors_for(category)
                    .map_err(framestitch_io::Error::from)?;
                for (frame, descriptor) in descriptors.iter().enumerate() {
                    let (lower, upper) = descriptor.unwrapped_window();
                    println!(
                        "  frame {}: [{}, {}) us shift {} us -> [{}, {}) us",
                        frame,
                        descriptor.lower_bound,
                        descriptor.upper_bound,
                        descriptor.shift,
                        lower,
                        upper
                    );
                }
            }
            let warnings = catalogue.validate();
            if warnings.is_empty() {
                println!("No problems found");
            }
            for warning in warnings {
                println!("warning: {warning}");
            }
        }
    }

    Ok(())
}

fn load_catalogue(path: &Path) -> Result<FrameCatalogue> {
    let catalogue = read_catalogue(path)?;
    for warning in catalogue.validate() {
        warn!(catalogue = %path.display(), "{warning}");
    }
    Ok(catalogue)
}

fn print_report(report: &FileReport) {
    println!("{} -> {}", report.input.display(), report.output.display());
    for entry in &report.entries {
        match &entry.result {
            Ok(stats) => println!(
                "  {} ({}): {} events, {} kept, {} dropped ({:.1}%)",
                entry.entry,
                entry.category,
                stats.input_events,
                stats.output_events,
                stats.dropped_events,
                stats.drop_fraction() * 100.0
            ),
            Err(err) => println!("  {} ({}): FAILED: {}", entry.entry, entry.category, err),
        }
    }
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> Result<()> {
    let summaries: Vec<FileSummary<'_>> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => FileSummary {
                input: &outcome.input,
                output: Some(&report.output),
                error: None,
                entries: report
                    .entries
                    .iter()
                    .map(|entry| EntrySummary {
                        entry: &entry.entry,
                        category: entry.category,
                        statistics: entry.result.as_ref().ok(),
                        error: entry.result.as_ref().err().map(ToString::to_string),
                    })
                    .collect(),
            },
            Err(err) => FileSummary {
                input: &outcome.input,
                output: None,
                error: Some(err.to_string()),
                entries: Vec::new(),
            },
        })
        .collect();
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summaries)?;
    Ok(())
}
