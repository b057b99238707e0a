use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Overall result of one order import
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Success,
    Failure,
}

impl Display for ImportStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImportStatus::Success => write!(f, "success"),
            ImportStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Result of one {ensure asset -> transfer} chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetOutcome {
    /// Source file id
    pub file_id: String,
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Destination key once the file is stored
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AssetOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.destination.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportReport {
    pub order_id: String,
    pub status: ImportStatus,
    pub assets: Vec<AssetOutcome>,
}

impl ImportReport {
    /// Status is success only when every chain stored its file
    pub fn from_outcomes(order_id: impl Into<String>, assets: Vec<AssetOutcome>) -> Self {
        let status = if assets.iter().all(AssetOutcome::is_success) {
            ImportStatus::Success
        } else {
            ImportStatus::Failure
        };
        Self {
            order_id: order_id.into(),
            status,
            assets,
        }
    }

    pub fn destinations(&self) -> Vec<&str> {
        self.assets
            .iter()
            .filter_map(|a| a.destination.as_deref())
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.assets.iter().filter(|a| !a.is_success()).count()
    }
}
