// src/store/mod.rs

//! Versioned JSON document storage.
//!
//! Every document lives in a [`Collection`] under a string id and carries a
//! version number that grows by one on each successful write. Writes through
//! [`DocumentStore::replace`] are conditional on the version the caller read,
//! which is what [`modify`] and [`retry_on_conflict`] build on.

pub mod memory;
pub mod postgres;
pub mod retry;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::{RetryPolicy, Txn, retry_on_conflict};

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Papers,
    Guides,
    Leaderboard,
    Performance,
    Chats,
    TopicCache,
    Flashcards,
    Literature,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Papers => "papers",
            Collection::Guides => "guides",
            Collection::Leaderboard => "leaderboard",
            Collection::Performance => "performance",
            Collection::Chats => "chats",
            Collection::TopicCache => "topic_cache",
            Collection::Flashcards => "flashcards",
            Collection::Literature => "literature",
        }
    }

    /// Human-readable name of one document, used in error messages.
    pub fn singular(self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Papers => "paper",
            Collection::Guides => "guide",
            Collection::Leaderboard => "leaderboard entry",
            Collection::Performance => "performance record",
            Collection::Chats => "conversation",
            Collection::TopicCache => "topic",
            Collection::Flashcards => "deck",
            Collection::Literature => "literature entry",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {collection} document {id}")]
    Duplicate { collection: Collection, id: String },

    #[error("{collection} document {id} changed since it was read")]
    VersionConflict { collection: Collection, id: String },

    #[error("{collection} document {id} does not exist")]
    NotFound { collection: Collection, id: String },

    #[error("document backend error: {0}")]
    Backend(String),

    #[error("malformed {collection} document {id}: {source}")]
    Corrupt {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// A document body together with its id and the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub id: String,
    pub version: i64,
    pub doc: T,
}

/// Storage backend contract.
///
/// `filter` arguments are JSON objects matched by containment: a document
/// matches when every field in the filter is present with an equal value.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str)
    -> Result<Option<Versioned<Value>>, StoreError>;

    /// Returns matching documents in insertion order.
    async fn find(&self, collection: Collection, filter: &Value)
    -> Result<Vec<Versioned<Value>>, StoreError>;

    /// Fails with `Duplicate` when the id or the unique key is taken.
    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<(), StoreError>;

    /// Overwrites the document if it is still at `expected_version` and
    /// returns the new version.
    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: i64,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<i64, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn count(&self, collection: Collection) -> Result<u64, StoreError>;
}

/// A model stored as one document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Secondary key that must be unique within the collection.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

fn decode<T: Document>(raw: Versioned<Value>) -> Result<Versioned<T>, StoreError> {
    let doc = serde_json::from_value(raw.doc).map_err(|source| StoreError::Corrupt {
        collection: T::COLLECTION,
        id: raw.id.clone(),
        source,
    })?;
    Ok(Versioned {
        id: raw.id,
        version: raw.version,
        doc,
    })
}

fn encode<T: Document>(doc: &T) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|source| StoreError::Corrupt {
        collection: T::COLLECTION,
        id: doc.id().to_string(),
        source,
    })
}

pub async fn load<T: Document>(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Option<Versioned<T>>, StoreError> {
    store
        .get(T::COLLECTION, id)
        .await?
        .map(decode::<T>)
        .transpose()
}

pub async fn find_all<T: Document>(
    store: &dyn DocumentStore,
    filter: &Value,
) -> Result<Vec<Versioned<T>>, StoreError> {
    store
        .find(T::COLLECTION, filter)
        .await?
        .into_iter()
        .map(decode::<T>)
        .collect()
}

pub async fn find_one<T: Document>(
    store: &dyn DocumentStore,
    filter: &Value,
) -> Result<Option<Versioned<T>>, StoreError> {
    Ok(find_all::<T>(store, filter).await?.into_iter().next())
}

pub async fn create<T: Document>(store: &dyn DocumentStore, doc: &T) -> Result<(), StoreError> {
    let body = encode(doc)?;
    let unique_key = doc.unique_key();
    store
        .insert(T::COLLECTION, doc.id(), unique_key.as_deref(), &body)
        .await
}

/// Conditional write of a previously loaded document.
pub async fn save<T: Document>(
    store: &dyn DocumentStore,
    current: &Versioned<T>,
) -> Result<i64, StoreError> {
    let body = encode(&current.doc)?;
    let unique_key = current.doc.unique_key();
    store
        .replace(
            T::COLLECTION,
            &current.id,
            current.version,
            unique_key.as_deref(),
            &body,
        )
        .await
}

pub async fn remove<T: Document>(store: &dyn DocumentStore, id: &str) -> Result<bool, StoreError> {
    store.delete(T::COLLECTION, id).await
}

/// Read-modify-write of one document under optimistic concurrency.
///
/// `mutate` may run more than once: it is re-applied to a fresh copy after
/// every version conflict, up to the default [`RetryPolicy`].
pub async fn modify<T, R, F>(store: &dyn DocumentStore, id: &str, mutate: F) -> Result<(T, R), AppError>
where
    T: Document,
    R: Send,
    F: Fn(&mut T) -> Result<R, AppError> + Sync,
{
    let mutate = &mutate;
    retry_on_conflict(RetryPolicy::default(), move |_attempt| async move {
        let mut current = load::<T>(store, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: T::COLLECTION,
                id: id.to_string(),
            })?;
        let outcome = mutate(&mut current.doc).map_err(Txn::Abort)?;
        save(store, &current).await?;
        Ok::<_, Txn<AppError>>((current.doc, outcome))
    })
    .await
}
