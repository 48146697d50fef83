use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// The fixed pipeline stages, declared in execution order.
///
/// Ordering of the variants is the canonical pipeline order; a workflow type may use a
/// subset of the stages but never reorders them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingestion,
    Indicators,
    FinancialData,
    WeeklyAggregation,
    GrowthMetrics,
    Signals,
}

impl StageName {
    pub const ALL: [StageName; 6] = [
        StageName::Ingestion,
        StageName::Indicators,
        StageName::FinancialData,
        StageName::WeeklyAggregation,
        StageName::GrowthMetrics,
        StageName::Signals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Ingestion => "ingestion",
            StageName::Indicators => "indicators",
            StageName::FinancialData => "financial_data",
            StageName::WeeklyAggregation => "weekly_aggregation",
            StageName::GrowthMetrics => "growth_metrics",
            StageName::Signals => "signals",
        }
    }

    /// Position in the canonical pipeline order.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("stage", s))
    }
}
