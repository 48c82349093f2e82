//! DealScope - M&A carbon-intensity event study pipeline
//!
//! A CLI tool that collects market data for M&A deals, classifies acquirers
//! and targets by carbon intensity and measures announcement returns.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, bad config, network failure, etc.)
//!   2 - Significant result found with --fail-on-significant

mod cli;
mod collect;
mod config;
mod market;
mod models;
mod prep;
mod report;
mod stats;
mod study;
mod table;

use anyhow::{Context, Result};
use chrono::Local;
use cli::{Args, Command};
use collect::prices::PriceWindow;
use collect::Fetcher;
use config::{Config, CONFIG_FILE};
use market::YahooClient;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write a config file
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("DealScope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle `init-config`: generate a default .dealscope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize data paths, API settings, keywords, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Explicit path, or a default under the data directory.
fn resolve(config: &Config, explicit: &Option<PathBuf>, default: &str) -> PathBuf {
    explicit.clone().unwrap_or_else(|| config.data_path(default))
}

fn require_input(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(())
}

/// Run the selected pipeline step. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    let show_progress = !args.quiet;

    let code = match &args.command {
        Command::InitConfig => 0,

        Command::Tickers(a) => {
            let input = resolve(&config, &a.input, "1_raw/bloomberg_ma_data.csv");
            let output = resolve(&config, &a.output, "2_interim/company_tickers.csv");
            require_input(&input)?;

            let client = YahooClient::new(&config.fetch)?;
            let fetcher = Fetcher::new(&client, &config.fetch, show_progress);
            println!("🔎 Resolving tickers from {}", input.display());
            let summary = collect::tickers::fetch_tickers(&fetcher, &input, &output).await?;

            println!("\n📊 Ticker Lookup:");
            println!("   ✅ Resolved:  {}", summary.resolved);
            println!("   ❔ Not found: {}", summary.not_found);
            println!("   ❌ Failed:    {}", summary.failed);
            println!("   ⏭️  Skipped:   {}", summary.skipped);
            println!("\n📄 Saved to: {}", output.display());
            0
        }

        Command::Prices(a) => {
            let input = resolve(&config, &a.input, "2_interim/master_data_classified.csv");
            require_input(&input)?;
            let window = PriceWindow {
                days_before: a.days_before.unwrap_or(config.study.days),
                days_after: a.days_after.unwrap_or(config.study.days),
            };
            let output = a
                .output
                .clone()
                .unwrap_or_else(|| window.default_output(&config.general.data_dir));

            let client = YahooClient::new(&config.fetch)?;
            let fetcher = Fetcher::new(&client, &config.fetch, show_progress);
            println!(
                "📈 Fetching T-{}/T+{} prices with {} workers",
                window.days_before, window.days_after, fetcher.workers
            );
            let today = Local::now().date_naive();
            let summary =
                collect::prices::fetch_prices(&fetcher, &input, &output, window, today).await?;

            println!("\n📊 Price Fetch:");
            println!("   Processed: {}", summary.processed);
            println!("   ✅ Succeeded: {}", summary.succeeded);
            println!("\n📄 Saved to: {}", output.display());
            0
        }

        Command::Sales(a) => {
            let input = resolve(&config, &a.input, "2_interim/master_data_formatted.csv");
            let output = resolve(&config, &a.output, "2_interim/sales_data.csv");
            require_input(&input)?;

            let client = YahooClient::new(&config.fetch)?;
            let fetcher = Fetcher::new(&client, &config.fetch, show_progress);
            let (rows, found) = collect::sales::fetch_sales(&fetcher, &input, &output).await?;

            println!("\n📊 Annual Sales: {} of {} rows found", found, rows);
            println!("📄 Saved to: {}", output.display());
            0
        }

        Command::Metrics(a) => {
            let input = resolve(&config, &a.input, "2_interim/master_data_formatted.csv");
            let output = resolve(&config, &a.output, "2_interim/financial_metrics.csv");
            require_input(&input)?;

            let client = YahooClient::new(&config.fetch)?;
            let fetcher = Fetcher::new(&client, &config.fetch, show_progress);
            let (succeeded, failed) =
                collect::metrics::fetch_metrics(&fetcher, &input, &output).await?;

            println!("\n📊 Financial Metrics:");
            println!("   ✅ Succeeded: {}", succeeded);
            println!("   ❌ Failed:    {}", failed);
            println!("📄 Saved to: {}", output.display());
            0
        }

        Command::Merge(a) => {
            let deals = resolve(&config, &a.deals, "1_raw/bloomberg_ma_with_tickers.csv");
            let ghg = resolve(&config, &a.ghg, "1_raw/ghg.csv");
            let sales = resolve(&config, &a.sales, "1_raw/sales_data_bbg.csv");
            let output = resolve(&config, &a.output, "2_interim/master_data_merged.csv");
            for path in [&deals, &ghg, &sales] {
                require_input(path)?;
            }

            let summary = prep::merge::run(&deals, &ghg, &sales, &output)?;
            println!("\n📊 Merge: {} of {} deals kept", summary.merged, summary.deals);
            println!("📄 Saved to: {}", output.display());
            0
        }

        Command::MergeMetrics(a) => {
            let default_deals = format!(
                "2_interim/master_data_with_stock_prices_{}day.csv",
                config.study.days
            );
            let deals = resolve(&config, &a.deals, &default_deals);
            let metrics = resolve(&config, &a.metrics, "2_interim/financial_metrics.csv");
            let ghg = resolve(&config, &a.ghg, "1_raw/ghg.csv");
            let output = resolve(&config, &a.output, "2_interim/master_data.csv");
            for path in [&deals, &metrics, &ghg] {
                require_input(path)?;
            }

            let summary = prep::master::run(&deals, &metrics, &ghg, &output)?;
            println!(
                "\n📊 Master table: {} deals, {} with announce-date metrics",
                summary.deals, summary.with_metrics
            );
            println!("📄 Saved to: {}", output.display());
            0
        }

        Command::Classify(a) => {
            let input = resolve(&config, &a.input, "2_interim/master_data_merged.csv");
            let output = resolve(&config, &a.output, "2_interim/master_data_classified.csv");
            require_input(&input)?;

            let summary = prep::classify::run(&input, &output, &config.classify)?;
            print_classify_summary(&summary, &config);
            println!("\n📄 Saved to: {}", output.display());
            0
        }

        Command::Standardize(a) => {
            let default_input = format!(
                "2_interim/master_data_with_stock_prices_{}day.csv",
                config.study.days
            );
            let input = resolve(&config, &a.input, &default_input);
            require_input(&input)?;

            let (output, rows) =
                prep::standardize::run(&input, a.output.as_deref(), &config.general.data_dir)?;
            println!("\n✅ Standardized {} rows", rows);
            println!("📄 Saved to: {}", output.display());
            0
        }

        Command::Clean(a) => {
            let input = resolve(&config, &a.input, "2_interim/master_data.csv");
            let output = resolve(&config, &a.output, "3_processed/master_data_cleaned.csv");
            require_input(&input)?;

            let required: Vec<String> = match &a.require {
                Some(cols) => cols
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
                None => prep::clean::DEFAULT_REQUIRED
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            };
            let report = prep::clean::run(&input, &output, &required)?;
            print_clean_report(&report);
            println!("\n📄 Saved to: {}", output.display());
            0
        }

        Command::EventStudy(a) => {
            let default_input = format!(
                "3_processed/standardized_stock_data_{}day.csv",
                config.study.days
            );
            let input = resolve(&config, &a.input, &default_input);
            let benchmark = a
                .benchmark
                .clone()
                .unwrap_or_else(|| config.data_path(&config.study.benchmark_file));
            require_input(&input)?;
            require_input(&benchmark)?;

            let run = study::run_event_study(
                &input,
                &benchmark,
                &config.general.results_dir,
                &config.study,
            )?;
            print_event_study(&run);

            if a.fail_on_significant && run.any_significant(config.study.alpha) {
                println!(
                    "\n⚠️  Significant abnormal returns at alpha = {}",
                    config.study.alpha
                );
                2
            } else {
                0
            }
        }

        Command::Hetero(a) => {
            let input = a
                .input
                .clone()
                .unwrap_or_else(|| config.general.results_dir.clone());

            let run = study::run_hetero(&input, &config.general.results_dir, config.study.alpha)?;
            println!("\n🔬 Heteroskedasticity ({})", run.analysis_file.display());
            for (group, result) in &run.results {
                let marker = if result.is_heteroskedastic(config.study.alpha) {
                    "⚠️ "
                } else {
                    "✅"
                };
                println!(
                    "   {} {}: BP p = {:.4}, White p = {:.4}",
                    marker, group, result.breusch_pagan.p_value, result.white.p_value
                );
            }
            println!("\n📁 Results saved to: {}", run.output_dir.display());

            if a.fail_on_significant && run.any_heteroskedastic(config.study.alpha) {
                2
            } else {
                0
            }
        }
    };

    info!("Finished in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(code)
}

fn print_classify_summary(summary: &prep::classify::ClassifySummary, config: &Config) {
    println!("\n📊 Classification ({} deals):", summary.rows);
    match summary.threshold {
        Some(t) => println!(
            "   Green threshold ({:.0}th percentile, per {}): {:.4}",
            config.classify.percentile * 100.0,
            config.classify.intensity_basis,
            t
        ),
        None => println!("   No usable carbon intensities"),
    }
    println!("   Acquirers:");
    for (label, count) in &summary.acquirers {
        let emoji = models::Classification::from_label(label)
            .map(|c| c.emoji())
            .unwrap_or("•");
        println!("      {} {}: {}", emoji, label, count);
    }
    println!("   Targets:");
    for (label, count) in &summary.targets {
        let emoji = models::Classification::from_label(label)
            .map(|c| c.emoji())
            .unwrap_or("•");
        println!("      {} {}: {}", emoji, label, count);
    }
}

fn print_clean_report(report: &prep::clean::CleanReport) {
    println!("\n🧹 Cleaning:");
    println!("   Initial rows:        {}", report.initial_rows);
    println!("   Duplicates removed:  {}", report.duplicates_removed);
    for (column, missing) in &report.missing_before {
        if *missing > 0 {
            println!("   Missing {}: {}", column, missing);
        }
    }
    println!("   Incomplete removed:  {}", report.incomplete_removed);
    println!("   Final rows:          {}", report.final_rows);

    println!("\n   Data completeness:");
    for c in &report.completeness {
        println!("      {}: {} ({:.2}%)", c.column, c.non_null, c.percent);
    }
}

fn print_event_study(run: &study::EventStudyRun) {
    println!("\n📊 Event Study ({}-day window):", run.day_range);
    for (group, analysis) in &run.analyses {
        let p = analysis
            .returns
            .p_value
            .map(|p| format!("{:.4}", p))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "   {}: N = {}, mean AR = {:.4}%, p = {}",
            group, analysis.sample.sample_size, analysis.returns.mean, p
        );
    }
    for returns in &run.groups {
        if !run.analyses.iter().any(|(g, _)| *g == returns.group) {
            println!("   {}: no valid abnormal returns", returns.group);
        }
    }
    println!("\n📁 Results saved to: {}", run.output_dir.display());
}
