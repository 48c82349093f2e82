//! Join deals with prior-year emissions and sales.

use super::{read_table, require_columns, write_table};
use crate::table::dates::{parse_date, previous_year};
use crate::table::{fmt_plain, parse_f64, Table};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const OUTPUT_COLUMNS: &[&str] = &[
    "Announce Date",
    "Reference_Year",
    "Ticker",
    "Acquirer Name",
    "Annual_Sales",
    "Acquirer_GHG_Emissions",
    "Carbon_Intensity",
    "Target Name",
    "Seller Name",
    "Announced Total Value (mil.)",
    "TV/EBITDA",
    "Deal Status",
];

/// Running sum and count for averaging duplicate records.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    pub(super) fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    pub(super) fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Mean emissions per (ticker, period end).
pub fn emissions_by_period(ghg: &Table) -> Result<HashMap<(String, NaiveDate), f64>> {
    require_columns(ghg, &["Ticker", "periodenddate", "GHG_Emissions"], "GHG data")?;

    let mut acc: HashMap<(String, NaiveDate), MeanAcc> = HashMap::new();
    for row in ghg.rows() {
        let Some(ticker) = row.get("Ticker") else {
            continue;
        };
        let Some(period) = row.get("periodenddate").and_then(parse_date) else {
            debug!("Skipping GHG row {} with unreadable period", row.index() + 1);
            continue;
        };
        acc.entry((ticker.to_string(), period))
            .or_default()
            .add(row.get_f64("GHG_Emissions"));
    }

    Ok(acc
        .into_iter()
        .filter_map(|(key, a)| a.mean().map(|m| (key, m)))
        .collect())
}

/// Mean annual sales per (ticker, year).
pub fn sales_by_year(sales: &Table) -> Result<HashMap<(String, i32), f64>> {
    let mut sales = sales.clone();
    sales.rename_columns(&[
        ("List of Tickers", "Ticker"),
        ("Sales in Mn. Dollars", "Annual_Sales"),
    ]);
    require_columns(&sales, &["Ticker", "Year", "Annual_Sales"], "sales data")?;

    let mut acc: HashMap<(String, i32), MeanAcc> = HashMap::new();
    for row in sales.rows() {
        let (Some(ticker), Some(year)) = (row.get("Ticker"), row.get_f64("Year")) else {
            continue;
        };
        acc.entry((ticker.to_string(), year as i32))
            .or_default()
            .add(row.get_f64("Annual_Sales"));
    }

    Ok(acc
        .into_iter()
        .filter_map(|(key, a)| a.mean().map(|m| (key, m)))
        .collect())
}

/// Attach prior-year emissions and sales to every deal, keeping deals with both.
pub fn merge_sources(deals: &Table, ghg: &Table, sales: &Table) -> Result<Table> {
    require_columns(deals, &["Announce Date", "Ticker"], "M&A data")?;
    let emissions = emissions_by_period(ghg)?;
    let sales = sales_by_year(sales)?;

    let mut merged = deals.clone();
    for row in 0..deals.len() {
        let ticker = deals.get(row, "Ticker").unwrap_or_default().to_string();
        let reference_year = deals
            .get(row, "Announce Date")
            .and_then(parse_date)
            .map(|d| previous_year(d).1);

        let Some(year) = reference_year else {
            continue;
        };
        merged.set(row, "Reference_Year", year.to_string());

        let ghg_date = NaiveDate::from_ymd_opt(year, 12, 31);
        let ghg = ghg_date.and_then(|d| emissions.get(&(ticker.clone(), d)).copied());
        let annual_sales = sales.get(&(ticker, year)).copied();

        let intensity = match (ghg, annual_sales) {
            (Some(e), Some(s)) if s > 0.0 => Some(e / s),
            _ => None,
        };
        merged.set(row, "Acquirer_GHG_Emissions", fmt_plain(ghg));
        merged.set(row, "Annual_Sales", fmt_plain(annual_sales));
        merged.set(row, "Carbon_Intensity", fmt_plain(intensity));
    }

    for column in ["Reference_Year", "Acquirer_GHG_Emissions", "Annual_Sales", "Carbon_Intensity"] {
        merged.ensure_column(column);
    }
    let dropped = merged.drop_missing(&["Acquirer_GHG_Emissions", "Annual_Sales"]);
    info!("Dropped {} deals without prior-year emissions or sales", dropped);

    Ok(merged.select(OUTPUT_COLUMNS))
}

/// Row counts reported after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub deals: usize,
    pub merged: usize,
}

pub fn run(deals: &Path, ghg: &Path, sales: &Path, output: &Path) -> Result<MergeSummary> {
    let deal_table = read_table(deals)?;
    let ghg_table = read_table(ghg)?;
    let sales_table = read_table(sales)?;
    info!(
        "Loaded {} deals, {} GHG rows, {} sales rows",
        deal_table.len(),
        ghg_table.len(),
        sales_table.len()
    );

    let merged = merge_sources(&deal_table, &ghg_table, &sales_table)?;
    write_table(&merged, output)?;

    Ok(MergeSummary {
        deals: deal_table.len(),
        merged: merged.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    fn deals() -> Table {
        table(
            "Announce Date,Ticker,Acquirer Name,Target Name,Deal Status,Internal\n\
             15-03-2022,SHEL LN,Shell,SolarCo,Completed,x\n\
             2021-06-01,BP/ LN,BP,OilCo,Pending,y\n\
             10-10-2022,XOM US,Exxon,WindCo,Completed,z\n\
             bad date,SHEL LN,Shell,Other,Completed,w\n",
        )
    }

    fn ghg() -> Table {
        table(
            "Ticker,periodenddate,GHG_Emissions\n\
             SHEL LN,31-12-2021,100\n\
             SHEL LN,2021-12-31,200\n\
             BP/ LN,31-12-2020,50\n\
             ,31-12-2021,999\n\
             XOM US,31-12-2021,80\n",
        )
    }

    fn sales() -> Table {
        table(
            "List of Tickers,Year,Sales in Mn. Dollars\n\
             SHEL LN,2021,300\n\
             SHEL LN,2021,100\n\
             BP/ LN,2020,0\n",
        )
    }

    #[test]
    fn test_group_means() {
        let emissions = emissions_by_period(&ghg()).unwrap();
        let key = ("SHEL LN".to_string(), NaiveDate::from_ymd_opt(2021, 12, 31).unwrap());
        assert_eq!(emissions.get(&key), Some(&150.0));
        assert_eq!(emissions.len(), 3);

        let sales = sales_by_year(&sales()).unwrap();
        assert_eq!(sales.get(&("SHEL LN".to_string(), 2021)), Some(&200.0));
    }

    #[test]
    fn test_merge_sources() {
        let merged = merge_sources(&deals(), &ghg(), &sales()).unwrap();

        assert_eq!(
            merged.headers(),
            &[
                "Announce Date",
                "Reference_Year",
                "Ticker",
                "Acquirer Name",
                "Annual_Sales",
                "Acquirer_GHG_Emissions",
                "Carbon_Intensity",
                "Target Name",
                "Deal Status"
            ]
        );
        // XOM has no sales and the last deal has no date.
        assert_eq!(merged.len(), 2);

        assert_eq!(merged.get(0, "Announce Date"), Some("15-03-2022"));
        assert_eq!(merged.get(0, "Reference_Year"), Some("2021"));
        assert_eq!(merged.get(0, "Acquirer_GHG_Emissions"), Some("150"));
        assert_eq!(merged.get(0, "Annual_Sales"), Some("200"));
        assert_eq!(merged.get(0, "Carbon_Intensity"), Some("0.75"));

        assert_eq!(merged.get(1, "Ticker"), Some("BP/ LN"));
        assert_eq!(merged.get(1, "Carbon_Intensity"), None);
    }

    #[test]
    fn test_missing_columns_are_named() {
        let bad = table("Ticker,Year\nA,2021\n");
        let err = merge_sources(&deals(), &ghg(), &bad).unwrap_err();
        assert!(err.to_string().contains("Annual_Sales"));
    }
}
