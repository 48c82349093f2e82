//! Report generation.
//!
//! This module renders the Markdown event-study report and the plain-text
//! heteroskedasticity summary from computed results.

use super::charts::{binned_means, histogram, horizontal_bars};
use crate::models::{AnalysisGroup, GroupAnalysis, GroupHetero, HeteroTestResult};
use crate::study::event::GroupReturns;
use crate::study::EventStudyRun;
use chrono::Local;

const HISTOGRAM_BINS: usize = 10;
const CHART_WIDTH: usize = 40;
const SCATTER_BINS: usize = 5;

fn fmt_num(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => "n/a".to_string(),
    }
}

/// GitHub-style heading anchor.
fn anchor(group: AnalysisGroup) -> String {
    group.name().replace(' ', "-").to_lowercase()
}

/// Generate the complete Markdown report of an event-study run.
pub fn generate_event_study_report(run: &EventStudyRun) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Event Study Report ({}-day window)\n\n",
        run.day_range
    ));
    output.push_str(&generate_metadata_section(run));
    output.push_str(&generate_table_of_contents(run));
    output.push_str(&generate_summary_section(&run.analyses));

    for returns in &run.groups {
        let analysis = run
            .analyses
            .iter()
            .find(|(g, _)| *g == returns.group)
            .map(|(_, a)| a);
        output.push_str(&generate_group_section(returns, analysis));
    }

    output.push_str(&generate_comparison_section(&run.analyses, run.day_range));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(run: &EventStudyRun) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    section.push_str(&format!("- **Event Window:** T-{0} to T+{0}\n", run.day_range));
    section.push_str(&format!(
        "- **Output Directory:** `{}`\n",
        run.output_dir.display()
    ));
    let deals = run.groups.first().map(|g| g.table.len()).unwrap_or(0);
    section.push_str(&format!("- **Deals:** {}\n", deals));
    section.push_str(&format!(
        "- **Groups Analysed:** {} of {}\n\n",
        run.analyses.len(),
        run.groups.len()
    ));

    section
}

fn generate_table_of_contents(run: &EventStudyRun) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    for returns in &run.groups {
        toc.push_str(&format!(
            "  - [{}](#{})\n",
            returns.group.name(),
            anchor(returns.group)
        ));
    }
    toc.push_str("- [Group Comparison](#group-comparison)\n\n");

    toc
}

fn generate_summary_section(analyses: &[(AnalysisGroup, GroupAnalysis)]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    if analyses.is_empty() {
        section.push_str("No group has valid abnormal returns.\n\n");
        return section;
    }

    section.push_str("| Group | N | Mean AR (%) | Median AR (%) | t (HC3) | p-value | Win Ratio |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    for (group, a) in analyses {
        section.push_str(&format!(
            "| {} | {} | {:.4} | {:.4} | {} | {} | {:.2} |\n",
            group.name(),
            a.sample.sample_size,
            a.returns.mean,
            a.returns.median,
            fmt_num(a.returns.t_statistic, 3),
            fmt_num(a.returns.p_value, 4),
            a.sample.win_ratio
        ));
    }
    section.push('\n');

    section
}

fn generate_group_section(returns: &GroupReturns, analysis: Option<&GroupAnalysis>) -> String {
    let mut section = String::new();
    let group = returns.group;

    section.push_str(&format!("## {}\n\n", group.name()));

    let Some(a) = analysis else {
        section.push_str(&format!(
            "*{} deals, no valid abnormal returns.*\n\n",
            returns.table.len()
        ));
        return section;
    };

    section.push_str("### Return Statistics\n\n");
    section.push_str(&format!(
        "- **Sample:** {} ({} positive, {} negative)\n",
        a.sample.sample_size, a.sample.positive, a.sample.negative
    ));
    section.push_str(&format!("- **Mean:** {:.4}%\n", a.returns.mean));
    section.push_str(&format!("- **Median:** {:.4}%\n", a.returns.median));
    section.push_str(&format!(
        "- **Standard Deviation:** {}\n",
        fmt_num(a.returns.std_dev, 4)
    ));
    section.push_str(&format!(
        "- **Robust t / p:** {} / {}\n",
        fmt_num(a.returns.t_statistic, 4),
        fmt_num(a.returns.p_value, 4)
    ));
    section.push_str(&format!(
        "- **Weighted Abnormal Return:** {}\n",
        fmt_num(a.returns.weighted, 4)
    ));
    if let Some(vol) = &a.volatility {
        section.push_str(&format!(
            "- **Volatility:** {:.4} daily, {:.4} annualized\n",
            vol.daily, vol.annualized
        ));
    }
    section.push('\n');

    let ars: Vec<f64> = returns.abnormal.iter().flatten().copied().collect();
    section.push_str("### Abnormal Return Distribution\n\n```\n");
    section.push_str(&histogram(&ars, HISTOGRAM_BINS, CHART_WIDTH));
    section.push_str("```\n\n");

    if let Some(log_ci) = &returns.log_intensity {
        section.push_str("### Log Carbon Intensity vs Abnormal Return\n\n");
        section.push_str(&format!(
            "Correlation: {} (p = {})\n\n",
            fmt_num(a.carbon.correlation, 4),
            fmt_num(a.carbon.correlation_p_value, 4)
        ));
        if let Some(reg) = &a.carbon.regression {
            section.push_str(&format!(
                "Regression slope: {:.4} (robust SE {:.4}, p = {:.4}, R² = {:.4})\n\n",
                reg.coefficient, reg.robust_se, reg.p_value, reg.r_squared
            ));
        }

        let (x, y): (Vec<f64>, Vec<f64>) = log_ci
            .iter()
            .zip(&returns.abnormal)
            .filter_map(|(ci, ar)| ar.map(|ar| (*ci, ar)))
            .unzip();
        let bars: Vec<(String, f64)> = binned_means(&x, &y, SCATTER_BINS)
            .into_iter()
            .filter_map(|b| {
                b.mean
                    .map(|m| (format!("{:.2}-{:.2} (n={})", b.lower, b.upper, b.count), m))
            })
            .collect();
        section.push_str("Mean abnormal return by log carbon intensity bin:\n\n```\n");
        section.push_str(&horizontal_bars(&bars, CHART_WIDTH));
        section.push_str("```\n\n");
    }

    if !a.size.returns_by_size.is_empty() {
        section.push_str("### Returns by Size\n\n");
        section.push_str("| Size | Mean AR (%) | Count |\n");
        section.push_str("|:---|:---:|:---:|\n");
        for bucket in &a.size.returns_by_size {
            section.push_str(&format!(
                "| {} | {:.4} | {} |\n",
                bucket.label, bucket.mean, bucket.count
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_comparison_section(analyses: &[(AnalysisGroup, GroupAnalysis)], day_range: u32) -> String {
    let mut section = String::new();

    section.push_str("## Group Comparison\n\n");
    section.push_str(&format!(
        "Mean winsorized abnormal returns across groups ({}-day):\n\n```\n",
        day_range
    ));
    let bars: Vec<(String, f64)> = analyses
        .iter()
        .map(|(g, a)| (g.name().to_string(), a.returns.mean))
        .collect();
    section.push_str(&horizontal_bars(&bars, CHART_WIDTH));
    section.push_str("```\n\n");

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by dealscope*\n");

    footer
}

fn push_test(report: &mut Vec<String>, title: &str, test: &HeteroTestResult) {
    report.push(format!("\n{}:", title));
    report.push(format!("LM Statistic: {:.4}", test.lm));
    report.push(format!("P-value: {:.4}", test.p_value));
    report.push(format!("F-statistic: {:.4}", test.f));
    report.push(format!("F-test P-value: {:.4}", test.f_p_value));
}

/// Plain-text summary of heteroskedasticity results, one block per group.
pub fn generate_hetero_summary(results: &[(String, GroupHetero)], alpha: f64) -> String {
    let mut report = vec![
        "Heteroskedasticity Analysis Summary".to_string(),
        "=".repeat(50),
    ];

    for (group, r) in results {
        report.push(format!("\n{}", group));
        report.push("-".repeat(30));

        push_test(&mut report, "Breusch-Pagan Test", &r.breusch_pagan);
        push_test(&mut report, "White Test", &r.white);

        report.push("\nRobust Standard Errors:".to_string());
        report.push(format!("Coefficient: {:.4}", r.robust.coefficient));
        report.push(format!("Standard Error: {:.4}", r.robust.std_error));
        report.push(format!("P-value: {:.4}", r.robust.p_value));
        report.push(format!("R-squared: {:.4}", r.robust.r_squared));

        report.push("\nInterpretation:".to_string());
        if r.is_heteroskedastic(alpha) {
            report.push(
                "Evidence of heteroskedasticity detected. Using robust standard errors is recommended."
                    .to_string(),
            );
        } else {
            report.push(
                "No significant evidence of heteroskedasticity. Standard errors are reliable."
                    .to_string(),
            );
        }
    }

    report.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CarbonIntensityAnalysis, ReturnStatistics, RobustRegression, SampleCharacteristics,
        SizeBucket, SizeEffectAnalysis,
    };
    use crate::table::Table;
    use std::path::PathBuf;

    fn analysis() -> GroupAnalysis {
        GroupAnalysis {
            day_range: 10,
            sample: SampleCharacteristics {
                sample_size: 3,
                positive: 2,
                negative: 1,
                win_ratio: 2.0 / 3.0,
            },
            returns: ReturnStatistics {
                mean: 1.25,
                median: 1.0,
                std_dev: Some(2.0),
                t_statistic: Some(1.5),
                p_value: Some(0.1336),
                weighted: None,
            },
            carbon: CarbonIntensityAnalysis {
                correlation: Some(0.5),
                correlation_p_value: Some(0.2),
                regression: None,
            },
            size: SizeEffectAnalysis {
                returns_by_size: vec![SizeBucket {
                    label: "Small".to_string(),
                    mean: 0.5,
                    count: 1,
                }],
            },
            volatility: None,
        }
    }

    fn run() -> EventStudyRun {
        let returns = |group| GroupReturns {
            group,
            table: Table::new(["Ticker"]),
            abnormal: vec![Some(1.0), Some(-0.5), Some(3.25)],
            weighted: None,
            sales: None,
            log_intensity: Some(vec![0.1, 0.2, 0.3]),
        };
        EventStudyRun {
            output_dir: PathBuf::from("results/event_study_10day_x"),
            day_range: 10,
            groups: vec![returns(AnalysisGroup::AllDeals), returns(AnalysisGroup::GreenTarget)],
            analyses: vec![(AnalysisGroup::AllDeals, analysis())],
        }
    }

    #[test]
    fn test_generate_event_study_report() {
        let markdown = generate_event_study_report(&run());

        assert!(markdown.contains("# Event Study Report (10-day window)"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("| All Deals | 3 | 1.2500 | 1.0000 | 1.500 | 0.1336 | 0.67 |"));
        assert!(markdown.contains("  - [Green Target](#green-target)"));
        assert!(markdown.contains("## Green Target\n"));
        assert!(markdown.contains("no valid abnormal returns"));
        assert!(markdown.contains("### Abnormal Return Distribution"));
        assert!(markdown.contains("| Small | 0.5000 | 1 |"));
        assert!(markdown.contains("## Group Comparison"));
    }

    #[test]
    fn test_generate_hetero_summary() {
        let test = |p| HeteroTestResult {
            lm: 4.0,
            p_value: p,
            f: 4.5,
            f_p_value: p,
        };
        let results = vec![
            (
                "All Deals".to_string(),
                GroupHetero {
                    breusch_pagan: test(0.01),
                    white: test(0.2),
                    robust: RobustRegression {
                        coefficient: -0.123456,
                        std_error: 0.5,
                        p_value: 0.8,
                        r_squared: 0.01,
                    },
                },
            ),
            (
                "Green Target".to_string(),
                GroupHetero {
                    breusch_pagan: test(0.3),
                    white: test(0.4),
                    robust: RobustRegression {
                        coefficient: 1.0,
                        std_error: 0.5,
                        p_value: 0.05,
                        r_squared: 0.2,
                    },
                },
            ),
        ];

        let text = generate_hetero_summary(&results, 0.05);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Heteroskedasticity Analysis Summary");
        assert_eq!(lines[1], "=".repeat(50));
        assert_eq!(lines[3], "All Deals");
        assert!(text.contains("\nBreusch-Pagan Test:\nLM Statistic: 4.0000\nP-value: 0.0100"));
        assert!(text.contains("Coefficient: -0.1235"));
        assert!(text.contains(
            "Evidence of heteroskedasticity detected. Using robust standard errors is recommended."
        ));
        assert!(text.ends_with("No significant evidence of heteroskedasticity. Standard errors are reliable."));
    }
}
