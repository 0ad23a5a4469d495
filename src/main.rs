use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use acoustat::batch::{self, BatchOptions, RunReport};
use acoustat::calibration::CalibrationMap;
use acoustat::metrics::registry;
use acoustat::results::ResultTable;
use acoustat::settings::{AnalysisSettings, SettingsError};

#[derive(Parser)]
#[command(name = "acoustat", version, about = "Batch acoustic & psychoacoustic metrics")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Result table as CSV
    Csv,
    /// Full run report (table + errors) as JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a directory of recordings (or a single file)
    Analyze {
        /// Directory containing audio files, or one audio file
        path: PathBuf,

        /// Calibration file (JSON: recording id -> target level in dB)
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Analysis settings file (YAML); defaults to the built-in preset
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Number of parallel workers (0 = auto-detect, 1 = serial)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Fail if the directory yields no recordings
        #[arg(long)]
        strict: bool,

        /// Write results to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// List the registered metrics
    Metrics,

    /// Inspect or produce analysis settings files
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Write the default settings preset as YAML
    Dump {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a settings file and report every violation
    Check {
        /// Settings file to validate
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = acoustat::config::AppConfig::load();

    match cli.command {
        Commands::Analyze {
            path,
            calibration,
            settings,
            jobs,
            strict,
            output,
            format,
        } => {
            let settings_path = settings.or(config.settings_path.clone());
            let analysis_settings = match &settings_path {
                Some(p) => AnalysisSettings::from_yaml_file(p)
                    .with_context(|| format!("Failed to load settings from {}", p.display()))?,
                None => AnalysisSettings::default_preset(),
            };

            let calibration_path = calibration.or(config.calibration_path.clone());
            let calibration_map = match &calibration_path {
                Some(p) => {
                    let (map, warnings) = CalibrationMap::load(p)
                        .with_context(|| format!("Failed to load calibration from {}", p.display()))?;
                    for warning in &warnings {
                        println!(
                            "Calibration entry '{}' skipped: {}",
                            warning.recording_id, warning.message
                        );
                    }
                    println!(
                        "Calibration: {} entries from {}",
                        map.len(),
                        p.display()
                    );
                    map
                }
                None => {
                    println!("No calibration file — level metrics will be NaN");
                    CalibrationMap::empty()
                }
            };

            let options = BatchOptions {
                jobs: if jobs > 0 { jobs } else { config.resolve_workers() },
                strict,
                extensions: config.resolve_extensions(),
                progress: true,
                cancel: None,
            };

            let report = if path.is_dir() {
                batch::run(&path, &analysis_settings, &calibration_map, registry(), &options)
            } else {
                batch::run_single(&path, &analysis_settings, &calibration_map, registry(), &options)
            }
            .context("Analysis failed")?;

            print_result_table(&report.table);
            print_errors(&report);

            if let Some(out) = output {
                match format {
                    OutputFormat::Csv => report
                        .table
                        .write_csv_file(&out)
                        .with_context(|| format!("Failed to write {}", out.display()))?,
                    OutputFormat::Json => report
                        .write_json_file(&out)
                        .with_context(|| format!("Failed to write {}", out.display()))?,
                }
                println!("Wrote {}", out.display());
            }

            println!(
                "Analysis complete: {} processed, {} failed{}",
                report.processed,
                report.failed,
                if report.cancelled { " (cancelled)" } else { "" }
            );
        }

        Commands::Metrics => {
            println!(
                "{:<18} {:<12} {:<12} {:<11} default statistics",
                "family", "name", "label", "calibrated"
            );
            for descriptor in registry().descriptors() {
                let stats: Vec<String> = descriptor
                    .default_statistics
                    .iter()
                    .map(|s| s.label())
                    .collect();
                println!(
                    "{:<18} {:<12} {:<12} {:<11} {}",
                    descriptor.family,
                    descriptor.name,
                    descriptor.label,
                    if descriptor.requires_calibration { "required" } else { "-" },
                    stats.join(", ")
                );
            }
        }

        Commands::Settings { action } => match action {
            SettingsAction::Dump { output } => {
                let yaml = AnalysisSettings::default_preset()
                    .to_yaml_string()
                    .context("Failed to serialize default preset")?;
                match output {
                    Some(path) => {
                        std::fs::write(&path, yaml)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Wrote {}", path.display());
                    }
                    None => print!("{yaml}"),
                }
            }

            SettingsAction::Check { file } => {
                let settings = AnalysisSettings::from_yaml_file(&file)
                    .with_context(|| format!("Failed to load {}", file.display()))?;
                match settings.validate(registry()) {
                    Ok(()) => {
                        let enabled = settings.enabled_metrics().count();
                        println!(
                            "OK: {} metrics configured, {} enabled",
                            settings.metrics.len(),
                            enabled
                        );
                    }
                    Err(SettingsError::Invalid(violations)) => {
                        println!("{} violation(s):", violations.len());
                        for violation in &violations {
                            println!("  - {violation}");
                        }
                        anyhow::bail!("settings file is invalid");
                    }
                    Err(e) => return Err(e).context("Validation failed"),
                }
            }
        },
    }

    Ok(())
}

/// Print the merged table with fixed-width columns. NaN cells show as "-".
fn print_result_table(table: &ResultTable) {
    if table.is_empty() {
        println!("No results.");
        return;
    }

    print!("{:<24} {:<8}", "recording", "channel");
    for name in table.column_names() {
        print!(" {name:>14}");
    }
    println!();

    for row in table.rows() {
        print!("{:<24} {:<8}", truncate(&row.recording_id, 24), row.channel_label);
        for value in &row.values {
            if value.is_nan() {
                print!(" {:>14}", "-");
            } else {
                print!(" {value:>14.2}");
            }
        }
        println!();
    }
    println!();
}

fn print_errors(report: &RunReport) {
    if report.errors.is_empty() {
        return;
    }
    println!("{} annotation(s):", report.errors.len());
    for error in &report.errors {
        println!("  {error}");
    }
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}…")
    }
}
