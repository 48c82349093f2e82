//! Yahoo Finance HTTP client.
//!
//! Uses the public chart, fundamentals time-series and search endpoints.

use super::{DailyBar, FinancialSnapshot, MarketDataSource, MarketError};
use crate::config::FetchConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Earliest period requested from the fundamentals endpoint (1985-08-23).
const FUNDAMENTALS_START: i64 = 493_590_046;

const REVENUE_TYPE: &str = "annualTotalRevenue";
const SNAPSHOT_TYPES: &[&str] = &[
    "quarterlyNetIncome",
    "quarterlyTotalAssets",
    "quarterlyTotalDebt",
    "quarterlyStockholdersEquity",
    "quarterlyOrdinarySharesNumber",
    "annualOrdinarySharesNumber",
];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
}

/// Yahoo Finance client.
pub struct YahooClient {
    base_url: String,
    search_url: String,
    http: reqwest::Client,
}

impl YahooClient {
    /// Build a client from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_url: config.search_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_body(
        &self,
        url: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<(u16, String), MarketError> {
        debug!("GET {} {:?}", url, query);
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status().as_u16();
        if status >= 500 || status == 429 {
            return Err(MarketError::Status {
                symbol: symbol.to_string(),
                status,
            });
        }
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn timeseries(
        &self,
        symbol: &str,
        types: &[&str],
    ) -> Result<HashMap<String, Vec<(NaiveDate, f64)>>, MarketError> {
        let url = format!(
            "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
            self.search_url, symbol
        );
        let query = [
            ("symbol", symbol.to_string()),
            ("type", types.join(",")),
            ("period1", FUNDAMENTALS_START.to_string()),
            ("period2", Utc::now().timestamp().to_string()),
        ];

        let (status, body) = self.get_body(&url, &query, symbol).await?;
        if !(200..300).contains(&status) {
            return Err(MarketError::Status {
                symbol: symbol.to_string(),
                status,
            });
        }
        parse_timeseries(&body)
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let query = [
            ("period1", midnight_timestamp(start).to_string()),
            ("period2", midnight_timestamp(end).to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];

        let (status, body) = self.get_body(&url, &query, symbol).await?;
        let bars = parse_chart(&body, symbol).map_err(|e| match e {
            MarketError::Decode(_) if !(200..300).contains(&status) => MarketError::Status {
                symbol: symbol.to_string(),
                status,
            },
            other => other,
        })?;

        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect())
    }

    async fn annual_revenue(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>, MarketError> {
        let mut series = self.timeseries(symbol, &[REVENUE_TYPE]).await?;
        let mut revenue = series.remove(REVENUE_TYPE).unwrap_or_default();
        if revenue.is_empty() {
            return Err(MarketError::NoData(symbol.to_string()));
        }
        revenue.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(revenue)
    }

    async fn financial_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, MarketError> {
        let series = self.timeseries(symbol, SNAPSHOT_TYPES).await?;
        Ok(snapshot_from_series(&series))
    }

    async fn lookup_symbol(&self, company_name: &str) -> Result<Option<String>, MarketError> {
        let url = format!("{}/v1/finance/search", self.search_url);
        let query = [
            ("q", company_name.to_string()),
            ("quotesCount", "1".to_string()),
            ("newsCount", "0".to_string()),
        ];

        let (status, body) = self.get_body(&url, &query, company_name).await?;
        if !(200..300).contains(&status) {
            return Err(MarketError::Status {
                symbol: company_name.to_string(),
                status,
            });
        }
        parse_search(&body)
    }
}

fn midnight_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Parse a chart response into daily bars, dropping bars without a close.
pub fn parse_chart(body: &str, symbol: &str) -> Result<Vec<DailyBar>, MarketError> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        return Err(MarketError::Api {
            code: error.code,
            description: error.description,
        });
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| MarketError::NoData(symbol.to_string()))?;

    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let offset = data.meta.gmtoffset;
    let bars = data
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = close?;
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(DailyBar { date, close })
        })
        .collect();

    Ok(bars)
}

/// Parse a fundamentals time-series response into `type -> [(as_of, value)]`.
pub fn parse_timeseries(
    body: &str,
) -> Result<HashMap<String, Vec<(NaiveDate, f64)>>, MarketError> {
    let json: Value = serde_json::from_str(body)?;
    let root = &json["timeseries"];

    if let Some(error) = root.get("error").filter(|e| !e.is_null()) {
        return Err(MarketError::Api {
            code: error["code"].as_str().unwrap_or("unknown").to_string(),
            description: error["description"].as_str().unwrap_or("").to_string(),
        });
    }

    let mut out = HashMap::new();
    for result in root["result"].as_array().into_iter().flatten() {
        let Some(kind) = result["meta"]["type"][0].as_str() else {
            continue;
        };
        let values: Vec<(NaiveDate, f64)> = result[kind]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let date = NaiveDate::parse_from_str(entry["asOfDate"].as_str()?, "%Y-%m-%d").ok()?;
                let value = entry["reportedValue"]["raw"].as_f64()?;
                Some((date, value))
            })
            .collect();
        out.insert(kind.to_string(), values);
    }

    Ok(out)
}

fn latest(series: &HashMap<String, Vec<(NaiveDate, f64)>>, kind: &str) -> Option<f64> {
    series
        .get(kind)?
        .iter()
        .max_by_key(|(date, _)| *date)
        .map(|(_, v)| *v)
}

fn snapshot_from_series(series: &HashMap<String, Vec<(NaiveDate, f64)>>) -> FinancialSnapshot {
    FinancialSnapshot {
        shares_outstanding: latest(series, "quarterlyOrdinarySharesNumber")
            .or_else(|| latest(series, "annualOrdinarySharesNumber")),
        total_debt: latest(series, "quarterlyTotalDebt"),
        stockholders_equity: latest(series, "quarterlyStockholdersEquity"),
        total_assets: latest(series, "quarterlyTotalAssets"),
        net_income: latest(series, "quarterlyNetIncome"),
    }
}

/// First quote symbol from a search response.
pub fn parse_search(body: &str) -> Result<Option<String>, MarketError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .quotes
        .into_iter()
        .find_map(|q| q.symbol.filter(|s| !s.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart() {
        let body = r#"{"chart":{"result":[{
            "meta":{"symbol":"XOM","gmtoffset":-14400},
            "timestamp":[1609770600,1609857000,1609943400],
            "indicators":{"quote":[{"close":[41.5,null,44.6]}]}
        }],"error":null}}"#;

        let bars = parse_chart(body, "XOM").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
        assert_eq!(bars[0].close, 41.5);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2021, 1, 6).unwrap());
    }

    #[test]
    fn test_parse_chart_without_timestamps() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(body, "XOM").unwrap().is_empty());
    }

    #[test]
    fn test_parse_chart_api_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body, "BAD") {
            Err(MarketError::Api { code, .. }) => assert_eq!(code, "Not Found"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_timeseries_and_snapshot() {
        let body = r#"{"timeseries":{"result":[
            {"meta":{"symbol":["XOM"],"type":["quarterlyTotalAssets"]},
             "quarterlyTotalAssets":[
                {"asOfDate":"2023-03-31","reportedValue":{"raw":100.0}},
                null,
                {"asOfDate":"2023-06-30","reportedValue":{"raw":120.0}}]},
            {"meta":{"symbol":["XOM"],"type":["quarterlyNetIncome"]},
             "quarterlyNetIncome":[{"asOfDate":"2023-06-30","reportedValue":{"raw":6.0}}]},
            {"meta":{"symbol":["XOM"],"type":["annualOrdinarySharesNumber"]},
             "annualOrdinarySharesNumber":[{"asOfDate":"2022-12-31","reportedValue":{"raw":4000.0}}]}
        ],"error":null}}"#;

        let series = parse_timeseries(body).unwrap();
        assert_eq!(series["quarterlyTotalAssets"].len(), 2);

        let snapshot = snapshot_from_series(&series);
        assert_eq!(snapshot.total_assets, Some(120.0));
        assert_eq!(snapshot.net_income, Some(6.0));
        assert_eq!(snapshot.shares_outstanding, Some(4000.0));
        assert_eq!(snapshot.total_debt, None);
    }

    #[test]
    fn test_parse_search() {
        let body = r#"{"quotes":[{"symbol":"SHEL","shortname":"Shell plc"}],"news":[]}"#;
        assert_eq!(parse_search(body).unwrap(), Some("SHEL".to_string()));
        assert_eq!(parse_search(r#"{"quotes":[]}"#).unwrap(), None);
    }
}
