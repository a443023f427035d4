// src/models/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::CHAT_HISTORY_LIMIT,
    store::{Collection, Document},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// A stored tutor conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatHistory {
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            messages: Vec::new(),
            last_accessed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message, dropping the oldest beyond the history limit.
    pub fn add_message(&mut self, role: ChatRole, text: &str, now: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            role,
            text: text.to_string(),
            timestamp: now.timestamp_millis(),
        });
        if self.messages.len() > CHAT_HISTORY_LIMIT {
            let excess = self.messages.len() - CHAT_HISTORY_LIMIT;
            self.messages.drain(..excess);
        }
        self.last_accessed_at = now;
        self.updated_at = now;
    }

    pub fn preview(&self) -> ConversationPreview {
        let preview = match self.messages.last() {
            Some(last) => last.text.chars().take(100).collect(),
            None => "New conversation".to_string(),
        };
        ConversationPreview {
            conversation_id: self.conversation_id.clone(),
            preview,
            last_accessed_at: self.last_accessed_at,
            message_count: self.messages.len(),
            created_at: self.created_at,
        }
    }
}

impl Document for ChatHistory {
    const COLLECTION: Collection = Collection::Chats;

    fn id(&self) -> &str {
        &self.conversation_id
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPreview {
    pub conversation_id: String,
    pub preview: String,
    pub last_accessed_at: DateTime<Utc>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be between 1 and 4000 characters."))]
    pub message: String,
    /// Client-held history, used when no conversation id is given.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}
