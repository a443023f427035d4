// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, DocumentStore, StoreError, Versioned};

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    version: i64,
    unique_key: Option<String>,
    body: Value,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    docs: HashMap<(Collection, String), Entry>,
}

/// In-process store with the same semantics as [`super::PgStore`].
/// Selected with `DATABASE_URL=memory://`; also backs the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// JSON containment, mirroring Postgres `@>` for the shapes we filter on.
fn contains(doc: &Value, pattern: &Value) -> bool {
    match (doc, pattern) {
        (Value::Object(doc), Value::Object(pattern)) => pattern
            .iter()
            .all(|(key, want)| doc.get(key).is_some_and(|have| contains(have, want))),
        (Value::Array(doc), Value::Array(pattern)) => pattern
            .iter()
            .all(|want| doc.iter().any(|have| contains(have, want))),
        (doc, pattern) => doc == pattern,
    }
}

fn key_taken(inner: &Inner, collection: Collection, id: &str, unique_key: Option<&str>) -> bool {
    let Some(unique_key) = unique_key else {
        return false;
    };
    inner.docs.iter().any(|((c, other_id), entry)| {
        *c == collection && other_id != id && entry.unique_key.as_deref() == Some(unique_key)
    })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .get(&(collection, id.to_string()))
            .map(|entry| Versioned {
                id: id.to_string(),
                version: entry.version,
                doc: entry.body.clone(),
            }))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Versioned<Value>>, StoreError> {
        let inner = self.inner.read().await;
        let mut hits: Vec<(u64, Versioned<Value>)> = inner
            .docs
            .iter()
            .filter(|((c, _), entry)| *c == collection && contains(&entry.body, filter))
            .map(|((_, id), entry)| {
                (
                    entry.seq,
                    Versioned {
                        id: id.clone(),
                        version: entry.version,
                        doc: entry.body.clone(),
                    },
                )
            })
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        Ok(hits.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (collection, id.to_string());
        if inner.docs.contains_key(&key) || key_taken(&inner, collection, id, unique_key) {
            return Err(StoreError::Duplicate {
                collection,
                id: id.to_string(),
            });
        }
        inner.next_seq += 1;
        let entry = Entry {
            seq: inner.next_seq,
            version: 1,
            unique_key: unique_key.map(str::to_string),
            body: body.clone(),
        };
        inner.docs.insert(key, entry);
        Ok(())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: i64,
        unique_key: Option<&str>,
        body: &Value,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        if key_taken(&inner, collection, id, unique_key) {
            return Err(StoreError::Duplicate {
                collection,
                id: id.to_string(),
            });
        }
        let entry = inner
            .docs
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                collection,
                id: id.to_string(),
            });
        }
        entry.version += 1;
        entry.unique_key = unique_key.map(str::to_string);
        entry.body = body.clone();
        Ok(entry.version)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.docs.remove(&(collection, id.to_string())).is_some())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.docs.keys().filter(|(c, _)| *c == collection).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replace_requires_the_version_that_was_read() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Users, "u1", None, &json!({"name": "Ada"}))
            .await
            .unwrap();

        let read = store.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(read.version, 1);

        let v2 = store
            .replace(Collection::Users, "u1", read.version, None, &json!({"name": "Ada L"}))
            .await
            .unwrap();
        assert_eq!(v2, 2);

        // A second writer still holding version 1 loses.
        let stale = store
            .replace(Collection::Users, "u1", read.version, None, &json!({"name": "Other"}))
            .await;
        assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn unique_keys_are_enforced_per_collection() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Users, "u1", Some("a@x.io"), &json!({}))
            .await
            .unwrap();

        let dup = store
            .insert(Collection::Users, "u2", Some("a@x.io"), &json!({}))
            .await;
        assert!(matches!(dup, Err(StoreError::Duplicate { .. })));

        // Same key in another collection is fine.
        store
            .insert(Collection::Papers, "p1", Some("a@x.io"), &json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn find_matches_by_containment_in_insertion_order() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Chats, "c2", None, &json!({"userId": "u1", "n": 2}))
            .await
            .unwrap();
        store
            .insert(Collection::Chats, "c1", None, &json!({"userId": "u2", "n": 1}))
            .await
            .unwrap();
        store
            .insert(Collection::Chats, "c3", None, &json!({"userId": "u1", "n": 3}))
            .await
            .unwrap();

        let hits = store
            .find(Collection::Chats, &json!({"userId": "u1"}))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["c2", "c3"]);

        assert_eq!(store.count(Collection::Chats).await.unwrap(), 3);
        assert!(store.delete(Collection::Chats, "c1").await.unwrap());
        assert!(!store.delete(Collection::Chats, "c1").await.unwrap());
    }
}
