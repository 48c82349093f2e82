//! Event study and heteroskedasticity runs.
//!
//! Each run writes into its own timestamped directory under the results
//! directory so earlier runs are never overwritten.

pub mod event;
pub mod hetero;
pub mod summary;

use crate::config::StudyConfig;
use crate::models::{AnalysisGroup, GroupAnalysis, GroupHetero};
use crate::report::generator::{generate_event_study_report, generate_hetero_summary};
use crate::table::Table;
use anyhow::{Context, Result};
use chrono::Local;
use event::{group_file_name, group_returns, Benchmark, EventWindow, GroupReturns};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_json(path: &Path, map: Map<String, Value>) -> Result<()> {
    let text = serde_json::to_string_pretty(&Value::Object(map))?;
    write_file(path, &text)
}

/// File-name form of a group name as stored in the analysis JSON.
fn group_slug(name: &str) -> String {
    AnalysisGroup::from_name(name)
        .map(|g| g.slug())
        .unwrap_or_else(|| name.replace(' ', "_").to_lowercase())
}

/// Outputs of an event-study run.
#[derive(Debug)]
pub struct EventStudyRun {
    pub output_dir: PathBuf,
    pub day_range: u32,
    pub groups: Vec<GroupReturns>,
    pub analyses: Vec<(AnalysisGroup, GroupAnalysis)>,
}

impl EventStudyRun {
    /// Whether any group's mean abnormal return is significant at `alpha`.
    pub fn any_significant(&self, alpha: f64) -> bool {
        self.analyses
            .iter()
            .any(|(_, a)| a.returns.p_value.is_some_and(|p| p < alpha))
    }
}

/// Compute abnormal returns for every group and write the group tables,
/// the comprehensive analysis JSON and the Markdown report.
pub fn run_event_study(
    input: &Path,
    benchmark_path: &Path,
    results_dir: &Path,
    config: &StudyConfig,
) -> Result<EventStudyRun> {
    let deals = Table::read_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let window = EventWindow::detect(input, &deals)?;
    deals.require_column("Percent_Return")?;
    info!("Loaded {} deals with a {}-day window", deals.len(), window.days);

    let limit = config.winsorize_limit;
    let benchmark = Benchmark::load(benchmark_path, limit)?;
    if benchmark.is_empty() {
        warn!("Benchmark {} has no usable returns", benchmark_path.display());
    }
    debug!("Benchmark has {} trading days", benchmark.len());

    let output_dir = results_dir.join(format!("event_study_{}day_{}", window.days, timestamp()));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut groups = Vec::new();
    for group in AnalysisGroup::ALL {
        info!("Calculating abnormal returns for: {}", group);
        let returns = group_returns(&deals, group, &window, &benchmark, limit);
        let path = output_dir.join(group_file_name(group, window.days));
        returns
            .table
            .write_csv(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        groups.push(returns);
    }

    let analyses: Vec<(AnalysisGroup, GroupAnalysis)> = groups
        .iter()
        .filter_map(|g| {
            summary::analyze_group(g, window.days, config.trading_days_per_year).map(|a| (g.group, a))
        })
        .collect();

    let mut json = Map::new();
    for (group, analysis) in &analyses {
        json.insert(group.name().to_string(), serde_json::to_value(analysis)?);
    }
    write_json(
        &output_dir.join(format!("comprehensive_analysis_{}day.json", window.days)),
        json,
    )?;

    let run = EventStudyRun {
        output_dir,
        day_range: window.days,
        groups,
        analyses,
    };
    let report = generate_event_study_report(&run);
    write_file(
        &run.output_dir.join(format!("event_study_report_{}day.md", run.day_range)),
        &report,
    )?;
    Ok(run)
}

/// Outputs of a heteroskedasticity run.
#[derive(Debug)]
pub struct HeteroRun {
    pub analysis_file: PathBuf,
    pub output_dir: PathBuf,
    pub results: Vec<(String, GroupHetero)>,
}

impl HeteroRun {
    pub fn any_heteroskedastic(&self, alpha: f64) -> bool {
        self.results.iter().any(|(_, r)| r.is_heteroskedastic(alpha))
    }
}

/// Test every group of an event-study run for heteroskedastic residuals.
pub fn run_hetero(input: &Path, results_dir: &Path, alpha: f64) -> Result<HeteroRun> {
    let analysis_file = hetero::find_analysis_file(input)?;
    let (group_names, day_range) = hetero::read_analysis(&analysis_file)?;
    let data_dir = analysis_file.parent().unwrap_or(Path::new("."));
    info!("Using {} ({}-day window)", analysis_file.display(), day_range);

    let output_dir = results_dir.join(format!("heteroskedasticity_analysis_{}", timestamp()));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut results = Vec::new();
    for name in group_names {
        let slug = group_slug(&name);
        let data_file = data_dir.join(format!("{}_{}day_results.csv", slug, day_range));
        if !data_file.exists() {
            warn!("Data file not found for {}", name);
            continue;
        }

        let table = Table::read_csv(&data_file)
            .with_context(|| format!("Failed to read {}", data_file.display()))?;
        match hetero::diagnose(&table) {
            Ok(Some(diag)) => {
                let path = output_dir.join(format!("{}_residuals.csv", slug));
                diag.residuals
                    .write_csv(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                results.push((name, diag.results));
            }
            Ok(None) => debug!("{} has no Log_Carbon_Intensity column", name),
            Err(e) => warn!("Skipping {}: {}", name, e),
        }
    }

    let mut json = Map::new();
    for (name, result) in &results {
        json.insert(name.clone(), serde_json::to_value(result)?);
    }
    write_json(&output_dir.join("heteroskedasticity_analysis.json"), json)?;
    write_file(
        &output_dir.join("heteroskedasticity_summary.txt"),
        &generate_hetero_summary(&results, alpha),
    )?;

    Ok(HeteroRun {
        analysis_file,
        output_dir,
        results,
    })
}
