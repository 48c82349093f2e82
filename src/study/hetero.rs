//! Heteroskedasticity checks on the carbon-intensity regression of each group.

use crate::models::{AnalysisGroup, GroupHetero, HeteroTestResult, RobustRegression};
use crate::stats::hetero::{breusch_pagan, white, LmTest};
use crate::stats::ols::{add_constant, OlsFit};
use crate::stats::StatsError;
use crate::table::{fmt_f64, Table};
use anyhow::{Context, Result};
use ndarray::Array1;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

const ANALYSIS_PREFIX: &str = "comprehensive_analysis_";

/// Resolve the analysis JSON: a file is used as is, a directory is searched
/// for the most recently modified `comprehensive_analysis_*.json`.
pub fn find_analysis_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        anyhow::bail!("{} does not exist", path.display());
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file()
            || !name.starts_with(ANALYSIS_PREFIX)
            || !name.ends_with(".json")
        {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        debug!("Found analysis file {}", entry.path().display());
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path().to_path_buf()));
        }
    }

    newest
        .map(|(_, p)| p)
        .with_context(|| format!("No {}*.json found under {}", ANALYSIS_PREFIX, path.display()))
}

fn day_range_of(entry: &Value) -> Option<u32> {
    match entry.get("Day Range")? {
        Value::Number(n) => n.as_u64().and_then(|d| u32::try_from(d).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Group names in file order and the event window of an analysis JSON.
pub fn read_analysis(path: &Path) -> Result<(Vec<String>, u32)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let groups = json
        .as_object()
        .with_context(|| format!("{} is not a JSON object", path.display()))?;

    let day_range = groups
        .get(AnalysisGroup::AllDeals.name())
        .or_else(|| groups.values().next())
        .and_then(day_range_of)
        .with_context(|| format!("No Day Range in {}", path.display()))?;

    Ok((groups.keys().cloned().collect(), day_range))
}

impl From<LmTest> for HeteroTestResult {
    fn from(t: LmTest) -> Self {
        Self {
            lm: t.lm,
            p_value: t.lm_p_value,
            f: t.f,
            f_p_value: t.f_p_value,
        }
    }
}

/// Test results and the residual table of one group.
#[derive(Debug, Clone)]
pub struct GroupDiagnostics {
    pub results: GroupHetero,
    /// Fitted values, residuals and log intensity, row by row.
    pub residuals: Table,
}

/// Run BP, White and an HC3 regression of abnormal return on log intensity.
///
/// `None` when the table has no `Log_Carbon_Intensity` column.
pub fn diagnose(table: &Table) -> Result<Option<GroupDiagnostics>, StatsError> {
    if !table.has_column("Log_Carbon_Intensity") {
        return Ok(None);
    }
    let log_ci: Vec<f64> = table
        .column_f64("Log_Carbon_Intensity")
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();
    let y: Array1<f64> = table
        .column_f64("Abnormal_Return")
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    let x = add_constant(&log_ci);
    let fit = OlsFit::fit(&y, &x)?;
    let bp = breusch_pagan(&fit.residuals, &x)?;
    let w = white(&fit.residuals, &x)?;

    let mut residuals = Table::new(["Log_Carbon_Intensity", "Fitted", "Residual"]);
    for ((ci, fitted), resid) in log_ci.iter().zip(&fit.fitted).zip(&fit.residuals) {
        residuals.push_row(vec![fmt_f64(*ci, 6), fmt_f64(*fitted, 6), fmt_f64(*resid, 6)]);
    }

    Ok(Some(GroupDiagnostics {
        results: GroupHetero {
            breusch_pagan: bp.into(),
            white: w.into(),
            robust: RobustRegression {
                coefficient: fit.params[1],
                std_error: fit.hc3_bse[1],
                p_value: fit.hc3_p_values[1],
                r_squared: fit.r_squared,
            },
        },
        residuals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_analysis_day_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("comprehensive_analysis_10day.json");
        std::fs::write(
            &path,
            r#"{"All Deals": {"Day Range": 10}, "Green Target": {"Day Range": 10}}"#,
        )
        .unwrap();
        let (groups, days) = read_analysis(&path).unwrap();
        assert_eq!(groups, vec!["All Deals", "Green Target"]);
        assert_eq!(days, 10);

        std::fs::write(&path, r#"{"Green Target": {"Day Range": "5"}}"#).unwrap();
        assert_eq!(read_analysis(&path).unwrap().1, 5);
    }

    #[test]
    fn test_find_analysis_file() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("event_study_10day_20240101_000000");
        std::fs::create_dir_all(&run).unwrap();
        let json = run.join("comprehensive_analysis_10day.json");
        std::fs::write(&json, "{}").unwrap();
        std::fs::write(run.join("all_deals_10day_results.csv"), "a\n").unwrap();

        assert_eq!(find_analysis_file(dir.path()).unwrap(), json);
        assert_eq!(find_analysis_file(&json).unwrap(), json);
        assert!(find_analysis_file(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_diagnose_group() {
        let mut csv = String::from("Abnormal_Return,Log_Carbon_Intensity\n");
        for i in 1..=30 {
            let x = i as f64 / 10.0;
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            csv.push_str(&format!("{},{}\n", 0.5 + x + sign * x * x * 3.0, x));
        }
        csv.push_str(",1.0\n");
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        let diag = diagnose(&table).unwrap().unwrap();
        assert_eq!(diag.residuals.len(), 31);
        assert!(diag.results.is_heteroskedastic(0.05));
        assert!(diag.results.robust.std_error > 0.0);
        assert!(diag.results.robust.r_squared >= 0.0);
    }

    #[test]
    fn test_diagnose_without_intensity() {
        let table = Table::from_reader("Abnormal_Return\n1\n2\n".as_bytes()).unwrap();
        assert!(diagnose(&table).unwrap().is_none());
    }
}
