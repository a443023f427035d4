// src/providers/gemini.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiProvider, ProviderError};
use crate::models::chat::{ChatMessage, ChatRole};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the Generative Language `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    }
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn generate_content(&self, request: GenerateRequest<'_>) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("Gemini API key"))?;

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Malformed("no text in first candidate".to_string()));
        }
        Ok(text)
    }
}

fn instruction(system_instruction: Option<&str>) -> Option<Content<'_>> {
    system_instruction.map(|text| Content {
        role: None,
        parts: vec![Part { text }],
    })
}

#[async_trait]
impl AiProvider for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.generate_content(GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: instruction(system_instruction),
        })
        .await
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|m| Content {
                role: Some(role_name(m.role)),
                parts: vec![Part { text: &m.text }],
            })
            .collect();
        contents.push(Content {
            role: Some("user"),
            parts: vec![Part { text: message }],
        });

        self.generate_content(GenerateRequest {
            contents,
            system_instruction: instruction(system_instruction),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let client = GeminiClient::new(None, "gemini-2.5-flash".to_string());
        assert!(!client.is_configured());
        let err = client.generate("hi", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let client = GeminiClient::new(Some("key".to_string()), "gemini-2.5-flash".to_string());
        assert!(client.is_configured());
    }

    #[test]
    fn request_shape_matches_api() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: "hello" }],
            }],
            system_instruction: instruction(Some("be nice")),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be nice");
        assert!(value["systemInstruction"].get("role").is_none());
    }
}
