use serde::{Deserialize, Serialize};

/// What a reset removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub removed: u64,
}
