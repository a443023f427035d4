// src/providers/brevo.rs

use async_trait::async_trait;
use serde::Serialize;

use super::{Mailer, ProviderError};

const SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";
const SENDER_NAME: &str = "ExamRedi";

/// Brevo (formerly Sendinblue) transactional email client.
#[derive(Clone)]
pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from_email: String,
}

#[derive(Serialize)]
struct Address<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

impl BrevoMailer {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("Brevo API key"))?;

        let request = SendRequest {
            sender: Address {
                name: Some(SENDER_NAME),
                email: &self.from_email,
            },
            to: vec![Address { name: None, email: to }],
            subject,
            html_content: html,
        };

        tracing::info!("Sending email '{}' to {}", subject, to);

        let response = self
            .http
            .post(SEND_URL)
            .header("api-key", key)
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

        Ok(())
    }
}
