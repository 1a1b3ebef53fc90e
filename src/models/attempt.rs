use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of the best recorded attempt for a category, used for
/// the "to beat" comparison on the results screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BestEntry {
    pub score: u32,
    pub total: u32,
    pub duration_seconds: u32,
}

/// One persisted quiz result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    pub first_name: String,
    pub email: String,
    pub category: String,
    pub score: u32,
    pub total_questions: u32,
    pub duration_seconds: u32,
    pub created_at: DateTime<Utc>,
}
