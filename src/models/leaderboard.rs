// src/models/leaderboard.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{Collection, Document};

fn default_subject() -> String {
    "UTME Challenge".to_string()
}

/// One score on the public leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub total_questions: u32,
    #[serde(default = "default_subject")]
    pub subject: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Document for LeaderboardEntry {
    const COLLECTION: Collection = Collection::Leaderboard;

    fn id(&self) -> &str {
        &self.id
    }
}

/// DTO for posting a score.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddScoreRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub total_questions: Option<u32>,
    /// Question id -> chosen option letter. When present the score is recomputed.
    #[serde(default)]
    pub answers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}
