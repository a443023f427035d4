// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Questions shown per paper to guests and free users.
pub const FREE_PAPER_QUESTION_LIMIT: usize = 10;

/// Chat messages a free user may send per calendar day.
pub const FREE_TIER_DAILY_MESSAGES: u32 = 5;

/// AI credits granted when a user is upgraded to pro.
pub const PRO_AI_CREDITS: u32 = 10;

/// Entries kept on the public leaderboard.
pub const LEADERBOARD_SIZE: usize = 20;

/// Messages kept per conversation (oldest dropped first).
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// Conversations idle for longer than this are purged.
pub const CHAT_IDLE_DAYS: i64 = 30;

/// Password reset links expire after this many minutes.
pub const RESET_TOKEN_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub brevo_api_key: Option<String>,
    pub from_email: String,
    pub frontend_url: String,
    /// Per-IP throttling of login and registration.
    pub rate_limit: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15 * 60);

        let refresh_expiration = env::var("REFRESH_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30 * 24 * 60 * 60);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let gemini_api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
        let brevo_api_key = non_empty("BREVO_API_KEY").or_else(|| non_empty("SENDINBLUE_API_KEY"));

        let rate_limit = env::var("RATE_LIMIT")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off"))
            .unwrap_or(true);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            refresh_expiration,
            rust_log,
            port,
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            brevo_api_key,
            from_email: env::var("FROM_EMAIL").unwrap_or_else(|_| "support@examredi.com".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            rate_limit,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
