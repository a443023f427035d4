// src/models/performance.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

fn default_kind() -> String {
    "practice".to_string()
}

/// Result of one practice session, exam or challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub score: f64,
    pub total_questions: u32,
    pub date: DateTime<Utc>,
    /// 'practice', 'exam', 'challenge'
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

impl Document for PerformanceRecord {
    const COLLECTION: Collection = Collection::Performance;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPerformanceRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(range(min = 0.0))]
    pub score: f64,
    pub total_questions: u32,
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
