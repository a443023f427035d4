// src/models/progress.rs

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Day-based activity streak.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
    pub last_date: Option<NaiveDate>,
    /// `YYYY-MM-DD` strings, append-only.
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Quiz,
    Guide,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Completed,
    InProgress,
    Abandoned,
}

/// One entry of a user's recent activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Opaque client state used to resume the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub state: Option<Value>,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_count: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Partial activity sent by the client; only `id` is mandatory.
///
/// `score` and `maxScore` also accept numeric strings, and `score` accepts a
/// `"8/10"` fraction whose denominator fills in a missing `maxScore`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", from = "RawActivityUpdate")]
pub struct ActivityUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<ActivityKind>,
    pub title: Option<String>,
    pub path: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub state: Option<Value>,
    pub status: Option<ActivityStatus>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub progress: Option<f64>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub engagement_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreInput {
    Number(f64),
    Text(String),
}

impl ScoreInput {
    /// `(score, out_of)`. Text that is not a number or fraction yields neither.
    fn into_parts(self) -> (Option<f64>, Option<f64>) {
        let finite = |text: &str| text.trim().parse::<f64>().ok().filter(|n| n.is_finite());
        match self {
            ScoreInput::Number(n) => (Some(n), None),
            ScoreInput::Text(text) => match text.split_once('/') {
                Some((score, out_of)) => match finite(score) {
                    Some(score) => (Some(score), finite(out_of)),
                    None => (None, None),
                },
                None => (finite(&text), None),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivityUpdate {
    id: String,
    #[serde(rename = "type")]
    kind: Option<ActivityKind>,
    title: Option<String>,
    path: Option<String>,
    state: Option<Value>,
    status: Option<ActivityStatus>,
    score: Option<ScoreInput>,
    max_score: Option<ScoreInput>,
    progress: Option<f64>,
    dismissed_at: Option<DateTime<Utc>>,
    engagement_count: Option<u32>,
}

impl From<RawActivityUpdate> for ActivityUpdate {
    fn from(raw: RawActivityUpdate) -> Self {
        let (score, out_of) = raw.score.map(ScoreInput::into_parts).unwrap_or_default();
        let max_score = raw.max_score.and_then(|m| m.into_parts().0).or(out_of);

        Self {
            id: raw.id,
            kind: raw.kind,
            title: raw.title,
            path: raw.path,
            state: raw.state,
            status: raw.status,
            score,
            max_score,
            progress: raw.progress,
            dismissed_at: raw.dismissed_at,
            engagement_count: raw.engagement_count,
        }
    }
}

/// Nudges the user has dismissed or unlocked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Engagement {
    pub dismissed_nudges: BTreeSet<String>,
    pub unlocked_nudges: BTreeSet<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    #[serde(default)]
    pub recent_activity: Option<Vec<ActivityUpdate>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub streak: u32,
    pub longest_streak: u32,
    pub streak_history: Vec<String>,
    pub recent_activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissNudgeRequest {
    pub nudge_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scores(body: Value) -> (Option<f64>, Option<f64>) {
        let update: ActivityUpdate = serde_json::from_value(body).unwrap();
        (update.score, update.max_score)
    }

    #[test]
    fn score_accepts_numbers_and_numeric_text() {
        assert_eq!(scores(json!({ "id": "q", "score": 8, "maxScore": 10 })), (Some(8.0), Some(10.0)));
        assert_eq!(scores(json!({ "id": "q", "score": "7.5", "maxScore": "10" })), (Some(7.5), Some(10.0)));
    }

    #[test]
    fn fraction_fills_missing_max_score() {
        assert_eq!(scores(json!({ "id": "q", "score": "8/10" })), (Some(8.0), Some(10.0)));
        // An explicit maxScore wins over the denominator
        assert_eq!(scores(json!({ "id": "q", "score": "8/10", "maxScore": 20 })), (Some(8.0), Some(20.0)));
    }

    #[test]
    fn unreadable_score_text_is_dropped() {
        assert_eq!(scores(json!({ "id": "q", "score": "great" })), (None, None));
        assert_eq!(scores(json!({ "id": "q", "score": "NaN" })), (None, None));
        assert_eq!(scores(json!({ "id": "q" })), (None, None));
    }

    #[test]
    fn update_still_requires_id() {
        let result = serde_json::from_value::<ActivityUpdate>(json!({ "score": 1 }));
        assert!(result.is_err());
    }
}
