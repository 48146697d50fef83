use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl FromStr for WorkflowStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkflowStatus::Pending),
            "running" => Ok(WorkflowStatus::Running),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "paused" => Ok(WorkflowStatus::Paused),
            "cancelled" => Ok(WorkflowStatus::Cancelled),
            other => Err(ParseEnumError::new("workflow status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
    }
}

impl FromStr for StageStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StageStatus::Pending),
            "running" => Ok(StageStatus::Running),
            "completed" => Ok(StageStatus::Completed),
            "failed" => Ok(StageStatus::Failed),
            "skipped" => Ok(StageStatus::Skipped),
            other => Err(ParseEnumError::new("stage status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Retrying,
}

impl SymbolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolStatus::Pending => "pending",
            SymbolStatus::Running => "running",
            SymbolStatus::Completed => "completed",
            SymbolStatus::Failed => "failed",
            SymbolStatus::Skipped => "skipped",
            SymbolStatus::Retrying => "retrying",
        }
    }

    /// `failed` is only ever written after a dead-letter decision, so it is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SymbolStatus::Completed | SymbolStatus::Failed | SymbolStatus::Skipped
        )
    }
}

impl FromStr for SymbolStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SymbolStatus::Pending),
            "running" => Ok(SymbolStatus::Running),
            "completed" => Ok(SymbolStatus::Completed),
            "failed" => Ok(SymbolStatus::Failed),
            "skipped" => Ok(SymbolStatus::Skipped),
            "retrying" => Ok(SymbolStatus::Retrying),
            other => Err(ParseEnumError::new("symbol status", other)),
        }
    }
}

/// Operator request observed by a running engine at its next dispatch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRequest {
    Pause,
    Cancel,
}

impl ControlRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlRequest::Pause => "pause",
            ControlRequest::Cancel => "cancel",
        }
    }
}

impl FromStr for ControlRequest {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(ControlRequest::Pause),
            "cancel" => Ok(ControlRequest::Cancel),
            other => Err(ParseEnumError::new("control request", other)),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(WorkflowStatus, StageStatus, SymbolStatus, ControlRequest);
