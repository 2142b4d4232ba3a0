//! # In-Memory Document Store
//!
//! Thread-safe, cloneable in-memory backend for tests, development, and
//! single-node deployments.
//!
//! All lock operations are synchronous (the locks are `parking_lot`, not
//! `tokio::sync`) because no lock is ever held across an `.await` point.
//! `parking_lot` locks are non-poisonable — a panicking writer does not
//! permanently corrupt the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use tokreg_core::StoreError;

use crate::document::{Document, DocumentStore, Query, UpdateFn};

/// In-memory [`DocumentStore`] backend.
///
/// Keyed documents live in per-collection `BTreeMap`s (deterministic
/// iteration helps test reproducibility); append-only collections are plain
/// vectors in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, BTreeMap<String, Document>>>>,
    appended: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection. Test helper.
    pub fn len(&self, collection: &str) -> usize {
        self.documents
            .read()
            .get(collection)
            .map_or(0, |c| c.len())
    }

    /// Whether a collection holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            appended: Arc::clone(&self.appended),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        self.documents
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        apply: UpdateFn,
    ) -> Result<Option<Document>, StoreError> {
        let mut guard = self.documents.write();
        let Some(doc) = guard.get_mut(collection).and_then(|c| c.get_mut(id)) else {
            return Ok(None);
        };
        // Apply against a scratch copy so a failing closure leaves the
        // stored document untouched.
        let mut scratch = doc.clone();
        apply(&mut scratch)?;
        *doc = scratch.clone();
        Ok(Some(scratch))
    }

    async fn find(&self, query: Query) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .get(&query.collection)
            .map(|c| {
                c.values()
                    .filter(|doc| query.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        self.appended
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn list_appended(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .appended
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokreg_core::StoreError;

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("identities", "0xaa", json!({"status": "PENDING"}))
            .await
            .unwrap();

        let doc = store.get("identities", "0xaa").await.unwrap().unwrap();
        assert_eq!(doc["status"], "PENDING");
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("identities", "0xaa").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = MemoryStore::new();
        store.put("c", "k", json!({"v": 1})).await.unwrap();
        store.put("c", "k", json!({"v": 2})).await.unwrap();
        assert_eq!(store.get("c", "k").await.unwrap().unwrap()["v"], 2);
        assert_eq!(store.len("c"), 1);
    }

    #[tokio::test]
    async fn update_applies_mutation() {
        let store = MemoryStore::new();
        store.put("c", "k", json!({"n": 1})).await.unwrap();

        let updated = store
            .update(
                "c",
                "k",
                Box::new(|doc| {
                    doc["n"] = json!(2);
                    Ok(())
                }),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated["n"], 2);
        assert_eq!(store.get("c", "k").await.unwrap().unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn update_missing_returns_none() {
        let store = MemoryStore::new();
        let result = store
            .update("c", "missing", Box::new(|_| Ok(())))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let store = MemoryStore::new();
        store.put("c", "k", json!({"n": 1})).await.unwrap();

        let result = store
            .update(
                "c",
                "k",
                Box::new(|doc| {
                    doc["n"] = json!(99);
                    Err(StoreError::Backend("validation failed".into()))
                }),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.get("c", "k").await.unwrap().unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn find_filters_by_fields() {
        let store = MemoryStore::new();
        store
            .put("claims", "1", json!({"topic": "KYC_APPROVED", "status": "ACTIVE"}))
            .await
            .unwrap();
        store
            .put("claims", "2", json!({"topic": "KYC_APPROVED", "status": "REVOKED"}))
            .await
            .unwrap();
        store
            .put("claims", "3", json!({"topic": "AML_CLEARED", "status": "ACTIVE"}))
            .await
            .unwrap();

        let active_kyc = store
            .find(
                Query::collection("claims")
                    .filter("topic", "KYC_APPROVED")
                    .filter("status", "ACTIVE"),
            )
            .await
            .unwrap();
        assert_eq!(active_kyc.len(), 1);

        let by_field = store
            .query_by_field("claims", "status", json!("ACTIVE"))
            .await
            .unwrap();
        assert_eq!(by_field.len(), 2);
    }

    #[tokio::test]
    async fn append_preserves_insertion_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append("audit_log", json!({"seq": i})).await.unwrap();
        }
        let entries = store.list_appended("audit_log").await.unwrap();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry["seq"], i);
        }
    }

    #[tokio::test]
    async fn clone_shares_underlying_data() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.put("c", "k", json!(1)).await.unwrap();
        assert!(store.get("c", "k").await.unwrap().is_some());
    }
}
