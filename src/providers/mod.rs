// src/providers/mod.rs

//! Outbound services: generative AI and transactional email.

pub mod brevo;
pub mod gemini;

use async_trait::async_trait;

use crate::{error::AppError, models::chat::ChatMessage};

pub use brevo::BrevoMailer;
pub use gemini::GeminiClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Converts to the client-facing error; `public` is the message shown for
    /// anything but a missing configuration.
    pub fn into_app_error(self, public: &str) -> AppError {
        match self {
            ProviderError::NotConfigured(_) => {
                AppError::Upstream("The AI service is not configured on the server.".to_string())
            }
            other => {
                tracing::error!("Provider error: {}", other);
                AppError::Upstream(public.to_string())
            }
        }
    }
}

/// Text generation backend.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// False when requests cannot succeed at all (no API key).
    fn is_configured(&self) -> bool;

    /// One-shot completion.
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Multi-turn completion: `history` precedes the new `message`.
    async fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, ProviderError>;
}

/// Transactional email backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ProviderError>;
}
