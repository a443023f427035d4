// src/models/guide.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    store::{Collection, Document},
    utils::html::clean_html,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Content,
    Question,
    Summary,
}

/// One slide of an interactive guide. Question slides carry options and an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(rename = "type")]
    pub kind: SlideKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Markdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Slide {
    fn sanitized(mut self) -> Self {
        self.content = self.content.as_deref().map(clean_html);
        self.explanation = self.explanation.as_deref().map(clean_html);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGuide {
    pub id: String,
    pub title: String,
    pub subject: String,
    /// General description or fallback body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(default = "default_version")]
    pub version: String,
    pub created_at: DateTime<Utc>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Document for StudyGuide {
    const COLLECTION: Collection = Collection::Guides;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
pub struct GuideListParams {
    pub subject: Option<String>,
}

/// DTO for creating a guide. Legacy ids (e.g. `sg1-interactive`) may be supplied.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGuideRequest {
    #[validate(length(min = 1, max = 100))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    pub content: Option<String>,
    #[serde(default)]
    pub slides: Vec<Slide>,
    pub version: Option<String>,
}

impl CreateGuideRequest {
    pub fn into_guide(self) -> StudyGuide {
        StudyGuide {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: self.title,
            subject: crate::utils::subjects::display_name(&self.subject),
            content: self.content.as_deref().map(clean_html),
            slides: self.slides.into_iter().map(Slide::sanitized).collect(),
            version: self.version.unwrap_or_else(default_version),
            created_at: Utc::now(),
        }
    }
}

/// DTO for updating a guide. Fields are optional.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateGuideRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    pub content: Option<String>,
    pub slides: Option<Vec<Slide>>,
    pub version: Option<String>,
}

impl UpdateGuideRequest {
    pub fn apply(self, guide: &mut StudyGuide) {
        if let Some(title) = self.title {
            guide.title = title;
        }
        if let Some(subject) = self.subject {
            guide.subject = crate::utils::subjects::display_name(&subject);
        }
        if let Some(content) = self.content {
            guide.content = Some(clean_html(&content));
        }
        if let Some(slides) = self.slides {
            guide.slides = slides.into_iter().map(Slide::sanitized).collect();
        }
        if let Some(version) = self.version {
            guide.version = version;
        }
    }
}
