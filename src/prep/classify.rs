//! Green/brown labels for acquirers (carbon intensity percentile) and
//! targets (name keywords).

use super::{read_table, require_columns, write_table};
use crate::config::ClassifyConfig;
use crate::models::Classification;
use crate::stats::descriptive::quantile;
use crate::table::{fmt_plain, round_to, Table};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const OUTPUT_COLUMNS: &[&str] = &[
    "Announce Date",
    "Reference_Year",
    "Ticker",
    "Acquirer Name",
    "Annual_Sales",
    "Acquirer_GHG_Emissions",
    "Carbon_Intensity",
    "Acquirer_Classification",
    "Target Name",
    "Target_Classification",
    "Seller Name",
    "Announced Total Value (mil.)",
    "TV/EBITDA",
    "Deal Status",
];

/// Label a target by the first keyword list that matches its name.
pub fn classify_target(name: Option<&str>, config: &ClassifyConfig) -> Classification {
    let Some(name) = name else {
        return Classification::Unknown;
    };
    let lower = name.to_lowercase();
    let matches = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

    if matches(&config.green_keywords) {
        Classification::Green
    } else if matches(&config.brown_keywords) {
        Classification::Brown
    } else {
        Classification::Neutral
    }
}

/// Outcome of a classification run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifySummary {
    /// Intensity at the green percentile; `None` without usable rows.
    pub threshold: Option<f64>,
    pub acquirers: Vec<(String, usize)>,
    pub targets: Vec<(String, usize)>,
    pub rows: usize,
}

fn label_counts(table: &Table, column: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in table.column_str(column).into_iter().flatten() {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort();
    counts
}

/// Label every deal. Acquirer labels and intensities are keyed by ticker.
pub fn classify(
    table: &Table,
    config: &ClassifyConfig,
) -> Result<(Table, ClassifySummary)> {
    let denominator = config.intensity_basis.column();
    require_columns(
        table,
        &[
            "Target Name",
            "Ticker",
            "Acquirer Name",
            "Acquirer_GHG_Emissions",
            denominator,
        ],
        "deal data",
    )?;

    let mut out = table.clone();
    let targets: Vec<String> = table
        .column_str("Target Name")
        .into_iter()
        .map(|name| classify_target(name, config).to_string())
        .collect();
    out.put_column("Target_Classification", targets);

    // (ticker, intensity) of rows usable in the acquirer ranking.
    let usable: Vec<(Option<&str>, f64)> = table
        .rows()
        .filter_map(|row| {
            let emissions = row.get_f64("Acquirer_GHG_Emissions")?;
            let denom = row.get_f64(denominator).filter(|d| *d > 0.0)?;
            Some((row.get("Ticker"), round_to(emissions / denom, 4)))
        })
        .collect();

    let intensities: Vec<f64> = usable.iter().map(|(_, ci)| *ci).collect();
    let threshold = quantile(&intensities, config.percentile);

    if let Some(threshold) = threshold {
        let mut by_ticker: HashMap<&str, (Classification, f64)> = HashMap::new();
        for (ticker, ci) in &usable {
            let label = if *ci <= threshold {
                Classification::Green
            } else {
                Classification::Brown
            };
            if let Some(ticker) = ticker {
                by_ticker.insert(*ticker, (label, *ci));
            }
        }

        let (labels, cis): (Vec<String>, Vec<String>) = table
            .column_str("Ticker")
            .into_iter()
            .map(|ticker| match ticker.and_then(|t| by_ticker.get(t)) {
                Some((label, ci)) => (label.to_string(), fmt_plain(Some(*ci))),
                None => (String::new(), String::new()),
            })
            .unzip();
        out.put_column("Acquirer_Classification", labels);
        out.put_column("Carbon_Intensity", cis);
    } else {
        warn!(
            "No deals with emissions and positive {} to rank acquirers",
            config.intensity_basis
        );
    }

    let out = out.select(OUTPUT_COLUMNS);
    let summary = ClassifySummary {
        threshold,
        acquirers: label_counts(&out, "Acquirer_Classification"),
        targets: label_counts(&out, "Target_Classification"),
        rows: out.len(),
    };
    Ok((out, summary))
}

pub fn run(input: &Path, output: &Path, config: &ClassifyConfig) -> Result<ClassifySummary> {
    let table = read_table(input)?;
    info!("Classifying {} deals by {}", table.len(), config.intensity_basis);
    let (classified, summary) = classify(&table, config)?;
    write_table(&classified, output)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntensityBasis;

    fn deals() -> Table {
        Table::from_reader(
            "Ticker,Acquirer Name,Target Name,Acquirer_GHG_Emissions,Annual_Sales,Carbon_Intensity,Market_Cap_AD_mil\n\
             AAA,Alpha,Sunny Solar Farms,10,100,0.1,50\n\
             BBB,Beta,Gulf Oil Services,40,100,0.4,10\n\
             CCC,Gamma,Acme Widgets,30,100,0.3,300\n\
             DDD,Delta,,20,100,0.2,40\n\
             EEE,Epsilon,Coal Mining Ltd,5,0,,\n\
             AAA,Alpha,Greenfield Partners,10,100,0.1,50\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_target_keywords() {
        let config = ClassifyConfig::default();
        assert_eq!(classify_target(Some("Windy Hill"), &config), Classification::Green);
        assert_eq!(classify_target(Some("North Sea GAS"), &config), Classification::Brown);
        // Green keywords win over brown ones.
        assert_eq!(
            classify_target(Some("Clean Coal Corp"), &config),
            Classification::Green
        );
        assert_eq!(classify_target(Some("Acme"), &config), Classification::Neutral);
        assert_eq!(classify_target(None, &config), Classification::Unknown);
    }

    #[test]
    fn test_classify_by_sales() {
        let config = ClassifyConfig::default();
        let (out, summary) = classify(&deals(), &config).unwrap();

        // Intensities 0.1, 0.4, 0.3, 0.2, 0.1 -> 25th percentile 0.1.
        assert_eq!(summary.threshold, Some(0.1));
        assert_eq!(out.get(0, "Acquirer_Classification"), Some("Green"));
        assert_eq!(out.get(1, "Acquirer_Classification"), Some("Brown"));
        assert_eq!(out.get(3, "Acquirer_Classification"), Some("Brown"));
        assert_eq!(out.get(4, "Acquirer_Classification"), None);
        assert_eq!(out.get(4, "Carbon_Intensity"), None);

        assert_eq!(out.get(0, "Target_Classification"), Some("Green"));
        assert_eq!(out.get(1, "Target_Classification"), Some("Brown"));
        assert_eq!(out.get(2, "Target_Classification"), Some("Neutral"));
        assert_eq!(out.get(3, "Target_Classification"), Some("Unknown"));

        assert_eq!(
            summary.acquirers,
            vec![("Brown".to_string(), 3), ("Green".to_string(), 2)]
        );
        assert!(!out.has_column("Market_Cap_AD_mil"));
        assert_eq!(out.headers()[5], "Acquirer_Classification");
    }

    #[test]
    fn test_classify_by_market_cap() {
        let config = ClassifyConfig {
            intensity_basis: IntensityBasis::MarketCap,
            percentile: 0.5,
            ..ClassifyConfig::default()
        };
        let (out, summary) = classify(&deals(), &config).unwrap();

        // 0.2, 4.0, 0.1, 0.5, 0.2 -> median 0.2.
        assert_eq!(summary.threshold, Some(0.2));
        assert_eq!(out.get(1, "Carbon_Intensity"), Some("4"));
        assert_eq!(out.get(1, "Acquirer_Classification"), Some("Brown"));
        assert_eq!(out.get(2, "Acquirer_Classification"), Some("Green"));
    }

    #[test]
    fn test_missing_denominator_is_an_error() {
        let table = Table::from_reader(
            "Ticker,Acquirer Name,Target Name,Acquirer_GHG_Emissions\nA,B,C,1\n".as_bytes(),
        )
        .unwrap();
        let err = classify(&table, &ClassifyConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Annual_Sales"));
    }
}
