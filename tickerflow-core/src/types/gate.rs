use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Data-sufficiency checks known to the engine.
///
/// Each gate reads one numeric field of the context snapshot unless a custom check is
/// registered for it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    MinDailyBars,
    MinWeeklyBars,
    MinFiscalPeriods,
    MinIndicatorRows,
}

impl GateId {
    pub const ALL: [GateId; 4] = [
        GateId::MinDailyBars,
        GateId::MinWeeklyBars,
        GateId::MinFiscalPeriods,
        GateId::MinIndicatorRows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GateId::MinDailyBars => "min_daily_bars",
            GateId::MinWeeklyBars => "min_weekly_bars",
            GateId::MinFiscalPeriods => "min_fiscal_periods",
            GateId::MinIndicatorRows => "min_indicator_rows",
        }
    }

    /// Context snapshot field the built-in check compares against `GateSpec::min`.
    pub fn snapshot_field(&self) -> &'static str {
        match self {
            GateId::MinDailyBars => "daily_bars",
            GateId::MinWeeklyBars => "weekly_bars",
            GateId::MinFiscalPeriods => "fiscal_periods",
            GateId::MinIndicatorRows => "indicator_rows",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GateId::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("gate", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientAction {
    #[default]
    Skip,
    Defer,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GateSpec {
    pub gate: GateId,

    #[serde(default)]
    pub min: u64,

    #[serde(default)]
    pub on_insufficient: InsufficientAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    Pass,
    Skip,
    Defer,
}

impl GateAction {
    /// Audit vocabulary: the action the engine took for the unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateAction::Pass => "proceed",
            GateAction::Skip => "skip",
            GateAction::Defer => "defer",
        }
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GateDecision {
    pub action: GateAction,
    pub reason: String,
}

impl GateDecision {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            action: GateAction::Pass,
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: GateAction::Skip,
            reason: reason.into(),
        }
    }

    pub fn defer(reason: impl Into<String>) -> Self {
        Self {
            action: GateAction::Defer,
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.action == GateAction::Pass
    }
}
