// src/models/content.rs

//! Smaller documents: topic keyword cache, flashcard decks, literature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    store::{Collection, Document},
    utils::subjects::subject_key,
};

/// AI-generated search keywords for a (topic, subject) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCache {
    pub id: String,
    pub topic: String,
    pub subject: String,
    pub keywords: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl TopicCache {
    /// Cache id; the pair is unique by construction.
    pub fn cache_id(topic: &str, subject: &str) -> String {
        format!("{}:{}", subject_key(subject), topic.trim().to_lowercase())
    }

    pub fn new(topic: &str, subject: &str, keywords: Vec<String>) -> Self {
        Self {
            id: Self::cache_id(topic, subject),
            topic: topic.trim().to_lowercase(),
            subject: subject_key(subject),
            keywords,
            last_updated: Utc::now(),
        }
    }
}

impl Document for TopicCache {
    const COLLECTION: Collection = Collection::TopicCache;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A flashcard deck as the client shaped it; only `id` and `name` are interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Storage wrapper: decks are keyed per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDocument {
    pub key: String,
    pub user_id: String,
    pub deck: Deck,
}

impl DeckDocument {
    pub fn key_for(user_id: &str, deck_id: &str) -> String {
        format!("{user_id}:{deck_id}")
    }

    pub fn new(user_id: &str, deck: Deck) -> Self {
        Self {
            key: Self::key_for(user_id, &deck.id),
            user_id: user_id.to_string(),
            deck,
        }
    }
}

impl Document for DeckDocument {
    const COLLECTION: Collection = Collection::Flashcards;

    fn id(&self) -> &str {
        &self.key
    }
}

/// A literature set-text entry, returned as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureEntry {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Document for LiteratureEntry {
    const COLLECTION: Collection = Collection::Literature;

    fn id(&self) -> &str {
        &self.id
    }
}
