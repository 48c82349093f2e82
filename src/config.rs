//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.dealscope.toml` files.

use crate::cli::{Args, Command};
use crate::models::IntensityBasis;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".dealscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Market data fetching.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Acquirer and target classification.
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Event study and heteroskedasticity analysis.
    #[serde(default)]
    pub study: StudyConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the `1_raw` / `2_interim` / `3_processed` tree.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where event-study and heteroskedasticity runs are written.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

/// Market data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Chart API host.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Search and fundamentals API host.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per request before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Random pause before every request, lower bound.
    #[serde(default = "default_pace_min_ms")]
    pub pace_min_ms: u64,

    /// Random pause before every request, upper bound.
    #[serde(default = "default_pace_max_ms")]
    pub pace_max_ms: u64,

    /// Rows fetched concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Windows tried when walking to the nearest trading day.
    #[serde(default = "default_trading_day_attempts")]
    pub trading_day_attempts: usize,

    /// Width of each trading-day window.
    #[serde(default = "default_lookaround_days")]
    pub lookaround_days: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_url: default_search_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ms: default_jitter_ms(),
            pace_min_ms: default_pace_min_ms(),
            pace_max_ms: default_pace_max_ms(),
            workers: default_workers(),
            trading_day_attempts: default_trading_day_attempts(),
            lookaround_days: default_lookaround_days(),
        }
    }
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_search_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_pace_min_ms() -> u64 {
    1000
}

fn default_pace_max_ms() -> u64 {
    2000
}

fn default_workers() -> usize {
    2
}

fn default_trading_day_attempts() -> usize {
    10
}

fn default_lookaround_days() -> i64 {
    5
}

/// Classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Acquirers at or below this intensity quantile are green.
    #[serde(default = "default_percentile")]
    pub percentile: f64,

    /// Denominator of carbon intensity.
    #[serde(default)]
    pub intensity_basis: IntensityBasis,

    #[serde(default = "default_green_keywords")]
    pub green_keywords: Vec<String>,

    #[serde(default = "default_brown_keywords")]
    pub brown_keywords: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            intensity_basis: IntensityBasis::default(),
            green_keywords: default_green_keywords(),
            brown_keywords: default_brown_keywords(),
        }
    }
}

fn default_percentile() -> f64 {
    0.25
}

fn default_green_keywords() -> Vec<String> {
    vec![
        "solar",
        "wind",
        "renewable",
        "sustainable",
        "geothermal",
        "biomass",
        "hydro",
        "clean",
        "energy storage",
        "battery",
        "recycling",
        "water treatment",
        "waste management",
        "carbon capture",
        "electric vehicle",
        "ev",
        "green",
        "circular economy",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_brown_keywords() -> Vec<String> {
    vec![
        "coal",
        "oil",
        "gas",
        "fossil",
        "petroleum",
        "nuclear",
        "traditional",
        "mining",
        "drilling",
        "fracking",
        "combustion",
        "refinery",
        "pipeline",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Event study settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Event window half-width in trading days.
    #[serde(default = "default_days")]
    pub days: u32,

    /// Fraction clipped from each tail when winsorizing returns.
    #[serde(default = "default_winsorize_limit")]
    pub winsorize_limit: f64,

    /// Benchmark daily returns, relative to the data directory.
    #[serde(default = "default_benchmark_file")]
    pub benchmark_file: PathBuf,

    /// Significance level for tests and `--fail-on-significant`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_trading_days_per_year")]
    pub trading_days_per_year: u32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            winsorize_limit: default_winsorize_limit(),
            benchmark_file: default_benchmark_file(),
            alpha: default_alpha(),
            trading_days_per_year: default_trading_days_per_year(),
        }
    }
}

fn default_days() -> u32 {
    10
}

fn default_winsorize_limit() -> f64 {
    0.01
}

fn default_benchmark_file() -> PathBuf {
    PathBuf::from("1_raw/xle_benchmark_data_returns.csv")
}

fn default_alpha() -> f64 {
    0.05
}

fn default_trading_days_per_year() -> u32 {
    252
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.data_dir {
            self.general.data_dir = dir.clone();
        }
        if let Some(ref dir) = args.results_dir {
            self.general.results_dir = dir.clone();
        }

        match &args.command {
            Command::Prices(a) => {
                if let Some(workers) = a.workers {
                    self.fetch.workers = workers;
                }
            }
            Command::Classify(a) => {
                if let Some(p) = a.percentile {
                    self.classify.percentile = p;
                }
                if let Some(basis) = a.basis {
                    self.classify.intensity_basis = basis;
                }
            }
            Command::EventStudy(a) => {
                if let Some(limit) = a.winsorize {
                    self.study.winsorize_limit = limit;
                }
                if let Some(ref benchmark) = a.benchmark {
                    self.study.benchmark_file = benchmark.clone();
                }
                if let Some(alpha) = a.alpha {
                    self.study.alpha = alpha;
                }
            }
            Command::Hetero(a) => {
                if let Some(alpha) = a.alpha {
                    self.study.alpha = alpha;
                }
            }
            _ => {}
        }
    }

    /// Resolve a path under the data directory. Absolute paths pass through.
    pub fn data_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.general.data_dir.join(relative)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ClassifyArgs, EventStudyArgs};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.data_dir, PathBuf::from("data"));
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff_multiplier, 2.0);
        assert_eq!(config.classify.percentile, 0.25);
        assert_eq!(config.classify.intensity_basis, IntensityBasis::Sales);
        assert!(config.classify.green_keywords.contains(&"solar".to_string()));
        assert!(config.classify.brown_keywords.contains(&"pipeline".to_string()));
        assert_eq!(config.study.days, 10);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
data_dir = "/srv/deals"

[fetch]
workers = 4
pace_min_ms = 0
pace_max_ms = 0

[classify]
percentile = 0.3
intensity_basis = "market_cap"
green_keywords = ["solar"]

[study]
winsorize_limit = 0.05
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.data_dir, PathBuf::from("/srv/deals"));
        assert_eq!(config.general.results_dir, PathBuf::from("results"));
        assert_eq!(config.fetch.workers, 4);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.classify.percentile, 0.3);
        assert_eq!(config.classify.intensity_basis, IntensityBasis::MarketCap);
        assert_eq!(config.classify.green_keywords, vec!["solar"]);
        assert_eq!(config.classify.brown_keywords.len(), 13);
        assert_eq!(config.study.winsorize_limit, 0.05);
        assert_eq!(config.study.alpha, 0.05);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[fetch]"));
        assert!(toml_str.contains("[classify]"));
        assert!(toml_str.contains("[study]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.fetch.base_url, default_base_url());
    }

    #[test]
    fn test_merge_only_explicit_values() {
        let mut config = Config::default();
        config.classify.percentile = 0.4;

        let mut args = crate::cli::tests::make_args(Command::Classify(ClassifyArgs::default()));
        config.merge_with_args(&args);
        assert_eq!(config.classify.percentile, 0.4);

        args.command = Command::Classify(ClassifyArgs {
            percentile: Some(0.1),
            basis: Some(IntensityBasis::MarketCap),
            ..ClassifyArgs::default()
        });
        args.data_dir = Some(PathBuf::from("elsewhere"));
        config.merge_with_args(&args);
        assert_eq!(config.classify.percentile, 0.1);
        assert_eq!(config.classify.intensity_basis, IntensityBasis::MarketCap);
        assert_eq!(config.general.data_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_merge_event_study_overrides() {
        let mut config = Config::default();
        let args = crate::cli::tests::make_args(Command::EventStudy(EventStudyArgs {
            winsorize: Some(0.02),
            alpha: Some(0.1),
            ..EventStudyArgs::default()
        }));
        config.merge_with_args(&args);
        assert_eq!(config.study.winsorize_limit, 0.02);
        assert_eq!(config.study.alpha, 0.1);
        assert_eq!(config.study.benchmark_file, default_benchmark_file());
    }
}
