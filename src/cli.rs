//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::IntensityBasis;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DealScope - M&A carbon-intensity event study pipeline
///
/// Collects prices and fundamentals for acquirers, classifies deals by
/// carbon intensity and runs an event study of announcement returns.
///
/// Examples:
///   dealscope init-config
///   dealscope tickers --input 1_raw/bloomberg_ma_data.csv
///   dealscope merge
///   dealscope classify --basis market-cap
///   dealscope prices --days-after 10 --workers 4
///   dealscope standardize
///   dealscope merge-metrics
///   dealscope event-study --fail-on-significant
///   dealscope hetero
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .dealscope.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Root data directory holding 1_raw, 2_interim and 3_processed
    #[arg(long, value_name = "DIR", env = "DEALSCOPE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory for event-study and heteroskedasticity results
    #[arg(long, value_name = "DIR", global = true)]
    pub results_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline steps.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a default .dealscope.toml configuration file
    InitConfig,

    /// Resolve company names to ticker symbols
    Tickers(TickersArgs),

    /// Fetch closing prices around each announcement date
    Prices(PricesArgs),

    /// Fetch prior-year annual sales for each deal
    Sales(SalesArgs),

    /// Fetch market cap, debt-to-equity and ROA for each deal
    Metrics(MetricsArgs),

    /// Merge deal, emissions and sales tables and compute carbon intensity
    Merge(MergeArgs),

    /// Join announce-date metrics and prior-year emissions into the master table
    MergeMetrics(MergeMetricsArgs),

    /// Label acquirers by carbon intensity and targets by business keywords
    Classify(ClassifyArgs),

    /// Normalize column names, units and formats of the price table
    Standardize(StandardizeArgs),

    /// Drop duplicates and incomplete rows, normalize formats
    Clean(CleanArgs),

    /// Compute abnormal returns and group statistics
    EventStudy(EventStudyArgs),

    /// Run Breusch-Pagan and White tests on event-study results
    Hetero(HeteroArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct TickersArgs {
    /// Input CSV with a `Company Name` column
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output CSV (`Company Name`, `Ticker`)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct PricesArgs {
    /// Classified deal table
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output CSV; defaults to 2_interim/master_data_with_stock_prices_{N}day.csv
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Trading days before the announcement
    #[arg(long, value_name = "DAYS")]
    pub days_before: Option<u32>,

    /// Trading days after the announcement
    #[arg(long, value_name = "DAYS")]
    pub days_after: Option<u32>,

    /// Rows fetched concurrently
    #[arg(long, value_name = "NUM")]
    pub workers: Option<usize>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SalesArgs {
    /// Deal table with `Acquirer Ticker` and `Deal Announce Date`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MetricsArgs {
    /// Deal table with `Ticker`, `Acquirer Name` and `Announce Date`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MergeArgs {
    /// M&A deals with tickers
    #[arg(long, value_name = "FILE")]
    pub deals: Option<PathBuf>,

    /// GHG emissions by ticker and period end
    #[arg(long, value_name = "FILE")]
    pub ghg: Option<PathBuf>,

    /// Annual sales by ticker and year
    #[arg(long, value_name = "FILE")]
    pub sales: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MergeMetricsArgs {
    /// Deal table with the price window; defaults to the prices output
    #[arg(long, value_name = "FILE")]
    pub deals: Option<PathBuf>,

    /// Output of the metrics step
    #[arg(long, value_name = "FILE")]
    pub metrics: Option<PathBuf>,

    /// GHG emissions by ticker and period end
    #[arg(long, value_name = "FILE")]
    pub ghg: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ClassifyArgs {
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Intensity quantile separating green from brown acquirers (0-1)
    #[arg(long, value_name = "Q")]
    pub percentile: Option<f64>,

    /// Carbon intensity denominator
    #[arg(long, value_name = "BASIS")]
    pub basis: Option<IntensityBasis>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct StandardizeArgs {
    /// Price table; the `{N}day` part of the name sets the window
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output CSV; defaults to 3_processed/standardized_stock_data_{N}day.csv
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CleanArgs {
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Columns that must be present for a row to be kept (comma-separated)
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub require: Option<Vec<String>>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct EventStudyArgs {
    /// Standardized stock table
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Benchmark daily returns CSV
    #[arg(long, value_name = "FILE")]
    pub benchmark: Option<PathBuf>,

    /// Fraction clipped from each tail when winsorizing
    #[arg(long, value_name = "LIMIT")]
    pub winsorize: Option<f64>,

    /// Significance level
    #[arg(long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Exit with code 2 if any group's mean abnormal return is significant
    #[arg(long)]
    pub fail_on_significant: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct HeteroArgs {
    /// Comprehensive analysis JSON or a directory to search for the newest one
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Significance level
    #[arg(long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Exit with code 2 if heteroskedasticity is detected in any group
    #[arg(long)]
    pub fail_on_significant: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Prices(a) => {
                if a.days_before == Some(0) || a.days_after == Some(0) {
                    return Err("Event window must be at least 1 day".to_string());
                }
                if a.workers == Some(0) {
                    return Err("Workers must be at least 1".to_string());
                }
            }
            Command::Classify(a) => {
                if let Some(p) = a.percentile {
                    if !(0.0..=1.0).contains(&p) {
                        return Err("Percentile must be between 0.0 and 1.0".to_string());
                    }
                }
            }
            Command::Clean(a) => {
                if let Some(ref cols) = a.require {
                    if cols.iter().all(|c| c.trim().is_empty()) {
                        return Err("--require needs at least one column".to_string());
                    }
                }
            }
            Command::EventStudy(a) => {
                if let Some(limit) = a.winsorize {
                    if !(0.0..0.5).contains(&limit) {
                        return Err("Winsorize limit must be in [0.0, 0.5)".to_string());
                    }
                }
                validate_alpha(a.alpha)?;
            }
            Command::Hetero(a) => {
                validate_alpha(a.alpha)?;
                if let Some(ref path) = a.input {
                    if !path.exists() {
                        return Err(format!("Input path does not exist: {}", path.display()));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_alpha(alpha: Option<f64>) -> Result<(), String> {
    match alpha {
        Some(a) if !(a > 0.0 && a < 1.0) => Err("Alpha must be between 0.0 and 1.0".to_string()),
        _ => Ok(()),
    }
}
