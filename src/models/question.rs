// src/models/question.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Option letter of a multiple-choice answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    /// Parses a submitted answer ("a", " B ") into a letter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            "C" => Some(Choice::C),
            "D" => Some(Choice::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionOption {
    #[serde(default)]
    pub text: Option<String>,
    /// URL or path of an image shown with the option.
    #[serde(default)]
    pub diagram: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionOptions {
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    pub a: Option<QuestionOption>,
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub b: Option<QuestionOption>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub c: Option<QuestionOption>,
    #[serde(rename = "D", default, skip_serializing_if = "Option::is_none")]
    pub d: Option<QuestionOption>,
}

impl QuestionOptions {
    /// Texts of all present options, in letter order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        [&self.a, &self.b, &self.c, &self.d]
            .into_iter()
            .flatten()
            .filter_map(|option| option.text.as_deref())
    }
}

/// One exam question, embedded in a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[validate(length(min = 1, max = 100))]
    pub id: String,

    /// The question text.
    #[serde(rename = "question", alias = "text")]
    #[validate(length(min = 1, max = 5000))]
    pub text: String,

    #[serde(default)]
    pub options: QuestionOptions,

    pub answer: Choice,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_diagram: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}
