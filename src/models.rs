//! Data models for the deal pipeline.
//!
//! This module contains the labels written into deal tables and the
//! result structures serialized by the event study and heteroskedasticity
//! analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Carbon label of an acquirer or a deal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Green,
    Brown,
    /// Target with no green or brown keyword.
    Neutral,
    /// Target without a name.
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Green => write!(f, "Green"),
            Classification::Brown => write!(f, "Brown"),
            Classification::Neutral => write!(f, "Neutral"),
            Classification::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Classification {
    /// Parse a label as written in a table cell.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "green" => Some(Classification::Green),
            "brown" => Some(Classification::Brown),
            "neutral" => Some(Classification::Neutral),
            "unknown" => Some(Classification::Unknown),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Classification::Green => "🟢",
            Classification::Brown => "🟤",
            Classification::Neutral => "⚪",
            Classification::Unknown => "❔",
        }
    }
}

/// Denominator used for acquirer carbon intensity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBasis {
    /// Emissions per million dollars of annual sales
    #[default]
    Sales,
    /// Emissions per million dollars of market capitalization
    MarketCap,
}

impl IntensityBasis {
    /// Column holding the denominator.
    pub fn column(&self) -> &'static str {
        match self {
            IntensityBasis::Sales => "Annual_Sales",
            IntensityBasis::MarketCap => "Market_Cap_AD_mil",
        }
    }
}

impl fmt::Display for IntensityBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntensityBasis::Sales => write!(f, "sales"),
            IntensityBasis::MarketCap => write!(f, "market cap"),
        }
    }
}

/// Outcome of the price lookup for one deal row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceStatus {
    Success,
    InvalidTicker,
    MissingDate,
    InvalidDate,
    NoTradingDays,
    NoPriceData,
    Error(String),
}

impl fmt::Display for PriceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceStatus::Success => write!(f, "Success"),
            PriceStatus::InvalidTicker => write!(f, "Invalid ticker"),
            PriceStatus::MissingDate => write!(f, "Missing announcement date"),
            PriceStatus::InvalidDate => write!(f, "Invalid date format"),
            PriceStatus::NoTradingDays => write!(f, "No valid trading days found"),
            PriceStatus::NoPriceData => write!(f, "Could not get price data"),
            PriceStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Deal subsets analysed by the event study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisGroup {
    AllDeals,
    GreenTarget,
    BrownAcquirerGreenTarget,
}

impl AnalysisGroup {
    pub const ALL: [AnalysisGroup; 3] = [
        AnalysisGroup::AllDeals,
        AnalysisGroup::GreenTarget,
        AnalysisGroup::BrownAcquirerGreenTarget,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisGroup::AllDeals => "All Deals",
            AnalysisGroup::GreenTarget => "Green Target",
            AnalysisGroup::BrownAcquirerGreenTarget => "Brown Acquirer - Green Target",
        }
    }

    /// File-name form of the group name: spaces to underscores, lower case.
    pub fn slug(&self) -> String {
        self.name().replace(' ', "_").to_lowercase()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    /// Whether a deal with these labels belongs to the group.
    pub fn contains(
        &self,
        acquirer: Option<Classification>,
        target: Option<Classification>,
    ) -> bool {
        match self {
            AnalysisGroup::AllDeals => true,
            AnalysisGroup::GreenTarget => target == Some(Classification::Green),
            AnalysisGroup::BrownAcquirerGreenTarget => {
                acquirer == Some(Classification::Brown) && target == Some(Classification::Green)
            }
        }
    }
}

impl fmt::Display for AnalysisGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event-study statistics of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAnalysis {
    #[serde(rename = "Day Range")]
    pub day_range: u32,

    #[serde(rename = "Sample Characteristics")]
    pub sample: SampleCharacteristics,

    #[serde(rename = "Return Statistics")]
    pub returns: ReturnStatistics,

    #[serde(rename = "Carbon Intensity Analysis")]
    pub carbon: CarbonIntensityAnalysis,

    #[serde(rename = "Size Effect Analysis")]
    pub size: SizeEffectAnalysis,

    #[serde(
        rename = "Volatility Analysis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub volatility: Option<VolatilityAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCharacteristics {
    #[serde(rename = "Sample Size")]
    pub sample_size: usize,
    #[serde(rename = "Positive Returns Count")]
    pub positive: usize,
    #[serde(rename = "Negative Returns Count")]
    pub negative: usize,
    #[serde(rename = "Win Ratio")]
    pub win_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    #[serde(rename = "Mean Abnormal Return")]
    pub mean: f64,
    #[serde(rename = "Median Abnormal Return")]
    pub median: f64,
    #[serde(rename = "Standard Deviation")]
    pub std_dev: Option<f64>,
    #[serde(rename = "T-statistic")]
    pub t_statistic: Option<f64>,
    #[serde(rename = "P-value")]
    pub p_value: Option<f64>,
    #[serde(rename = "Weighted Abnormal Return")]
    pub weighted: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonIntensityAnalysis {
    #[serde(rename = "Correlation")]
    pub correlation: Option<f64>,
    #[serde(rename = "Correlation P-value")]
    pub correlation_p_value: Option<f64>,
    #[serde(rename = "Regression")]
    pub regression: Option<RegressionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    #[serde(rename = "Coefficient")]
    pub coefficient: f64,
    #[serde(rename = "P-value")]
    pub p_value: f64,
    #[serde(rename = "R-squared")]
    pub r_squared: f64,
    #[serde(rename = "Robust Standard Error")]
    pub robust_se: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEffectAnalysis {
    #[serde(rename = "Returns by Size")]
    pub returns_by_size: Vec<SizeBucket>,
}

/// Mean abnormal return within one size quartile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBucket {
    #[serde(rename = "Size")]
    pub label: String,
    #[serde(rename = "Mean")]
    pub mean: f64,
    #[serde(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityAnalysis {
    #[serde(rename = "Daily Volatility")]
    pub daily: f64,
    #[serde(rename = "Annualized Volatility")]
    pub annualized: f64,
}

/// One heteroskedasticity test in the analysis JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeteroTestResult {
    #[serde(rename = "LM_statistic")]
    pub lm: f64,
    pub p_value: f64,
    #[serde(rename = "F_statistic")]
    pub f: f64,
    #[serde(rename = "F_p_value")]
    pub f_p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustRegression {
    #[serde(rename = "Coefficient")]
    pub coefficient: f64,
    #[serde(rename = "Std_Error")]
    pub std_error: f64,
    #[serde(rename = "P_value")]
    pub p_value: f64,
    #[serde(rename = "R_squared")]
    pub r_squared: f64,
}

/// Heteroskedasticity results of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupHetero {
    #[serde(rename = "Breusch_Pagan")]
    pub breusch_pagan: HeteroTestResult,
    #[serde(rename = "White")]
    pub white: HeteroTestResult,
    #[serde(rename = "Robust_Standard_Errors")]
    pub robust: RobustRegression,
}

impl GroupHetero {
    /// Either test rejects homoskedasticity at `alpha`.
    pub fn is_heteroskedastic(&self, alpha: f64) -> bool {
        self.breusch_pagan.p_value < alpha || self.white.p_value < alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_labels() {
        assert_eq!(Classification::Green.to_string(), "Green");
        assert_eq!(Classification::from_label(" brown "), Some(Classification::Brown));
        assert_eq!(Classification::from_label(""), None);
    }

    #[test]
    fn test_price_status_strings() {
        assert_eq!(PriceStatus::NoTradingDays.to_string(), "No valid trading days found");
        assert_eq!(PriceStatus::NoPriceData.to_string(), "Could not get price data");
        assert_eq!(
            PriceStatus::Error("timeout".into()).to_string(),
            "Error: timeout"
        );
    }

    #[test]
    fn test_group_slugs_and_membership() {
        assert_eq!(AnalysisGroup::AllDeals.slug(), "all_deals");
        assert_eq!(
            AnalysisGroup::BrownAcquirerGreenTarget.slug(),
            "brown_acquirer_-_green_target"
        );
        assert_eq!(
            AnalysisGroup::from_name("Green Target"),
            Some(AnalysisGroup::GreenTarget)
        );

        let brown_green = (Some(Classification::Brown), Some(Classification::Green));
        let green_green = (Some(Classification::Green), Some(Classification::Green));
        assert!(AnalysisGroup::BrownAcquirerGreenTarget.contains(brown_green.0, brown_green.1));
        assert!(!AnalysisGroup::BrownAcquirerGreenTarget.contains(green_green.0, green_green.1));
        assert!(AnalysisGroup::GreenTarget.contains(green_green.0, green_green.1));
        assert!(AnalysisGroup::AllDeals.contains(None, None));
    }

    #[test]
    fn test_group_analysis_json_keys() {
        let analysis = GroupAnalysis {
            day_range: 10,
            sample: SampleCharacteristics {
                sample_size: 2,
                positive: 1,
                negative: 1,
                win_ratio: 0.5,
            },
            returns: ReturnStatistics {
                mean: 0.0,
                median: 0.0,
                std_dev: Some(1.0),
                t_statistic: None,
                p_value: None,
                weighted: Some(0.0),
            },
            carbon: CarbonIntensityAnalysis {
                correlation: None,
                correlation_p_value: None,
                regression: None,
            },
            size: SizeEffectAnalysis {
                returns_by_size: vec![],
            },
            volatility: None,
        };

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["Day Range"], 10);
        assert_eq!(json["Sample Characteristics"]["Win Ratio"], 0.5);
        assert!(json.get("Volatility Analysis").is_none());

        let back: GroupAnalysis = serde_json::from_value(json).unwrap();
        assert_eq!(back, analysis);
    }
}
