use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code: "invalid_input".to_string(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        self.code == "invalid_input"
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

/// Which weight table an issue was found in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum WeightScope {
    #[serde(rename_all = "camelCase")]
    Categories { period_id: String },
    Periods,
}

/// A grading configuration problem. Reported beside a best-effort result,
/// never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum ConfigIssue {
    /// Configured weights do not total 100 within tolerance.
    #[serde(rename_all = "camelCase")]
    WeightSum { scope: WeightScope, total: f64 },
    /// An average was supplied for an item the weight table does not know.
    #[serde(rename_all = "camelCase")]
    UnweightedItem { scope: WeightScope, item_id: String },
    /// Only zero-weight items carried data, so nothing could be weighted.
    #[serde(rename_all = "camelCase")]
    ZeroWeightWithData {
        scope: WeightScope,
        item_ids: Vec<String>,
    },
    /// A task points at a category or period that is not configured, or a
    /// score points at a task that does not exist.
    #[serde(rename_all = "camelCase")]
    UnknownReference {
        task_id: String,
        field: String,
        target_id: String,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateId { kind: String, id: String },
}

impl ConfigIssue {
    pub fn code(&self) -> &'static str {
        match self {
            Self::WeightSum { .. } => "weightSum",
            Self::UnweightedItem { .. } => "unweightedItem",
            Self::ZeroWeightWithData { .. } => "zeroWeightWithData",
            Self::UnknownReference { .. } => "unknownReference",
            Self::DuplicateId { .. } => "duplicateId",
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightSum { scope, total } => {
                write!(f, "weights in {} total {} instead of 100", scope_label(scope), total)
            }
            Self::UnweightedItem { scope, item_id } => {
                write!(f, "{} has no weight in {}", item_id, scope_label(scope))
            }
            Self::ZeroWeightWithData { scope, item_ids } => write!(
                f,
                "only zero-weight items have data in {}: {}",
                scope_label(scope),
                item_ids.join(", ")
            ),
            Self::UnknownReference {
                task_id,
                field,
                target_id,
            } => write!(f, "task {} references unknown {} {}", task_id, field, target_id),
            Self::DuplicateId { kind, id } => write!(f, "duplicate {} id {}", kind, id),
        }
    }
}

fn scope_label(scope: &WeightScope) -> String {
    match scope {
        WeightScope::Categories { period_id } => format!("categories of period {}", period_id),
        WeightScope::Periods => "periods".to_string(),
    }
}
