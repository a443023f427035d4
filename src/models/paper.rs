// src/models/paper.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    models::question::Question,
    store::{Collection, Document},
    utils::subjects::{display_name, subject_key},
};

fn default_exam_type() -> String {
    "UTME".to_string()
}

/// A past exam paper: all questions of one subject and year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: String,
    /// Display name, canonicalized on write.
    pub subject: String,
    /// Normalized subject used for filtering and uniqueness.
    pub subject_key: String,
    pub year: i32,
    /// 'UTME', 'WASSCE', etc.
    #[serde(rename = "type", default = "default_exam_type")]
    pub exam_type: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl Paper {
    pub fn new(subject: &str, year: i32, exam_type: Option<String>, questions: Vec<Question>) -> Self {
        let mut paper = Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: String::new(),
            subject_key: String::new(),
            year,
            exam_type: exam_type.unwrap_or_else(default_exam_type),
            questions,
            created_at: Utc::now(),
        };
        paper.set_subject(subject);
        paper
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = display_name(subject);
        self.subject_key = subject_key(subject);
    }
}

impl Document for Paper {
    const COLLECTION: Collection = Collection::Papers;

    fn id(&self) -> &str {
        &self.id
    }

    /// At most one paper per (subject, year).
    fn unique_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.subject_key, self.year))
    }
}

/// Paper as listed to clients; free viewers get a truncated question list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperView {
    #[serde(flatten)]
    pub paper: Paper,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_limited: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaperListParams {
    pub subject: Option<String>,
    pub year: Option<i32>,
}

/// DTO for creating a new paper.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaperRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    #[serde(rename = "type")]
    pub exam_type: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<Question>,
}

/// DTO for updating a paper. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaperRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[serde(rename = "type")]
    pub exam_type: Option<String>,
    #[validate(nested)]
    pub questions: Option<Vec<Question>>,
}
