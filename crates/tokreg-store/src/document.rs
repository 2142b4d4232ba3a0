//! # Document Store Abstraction
//!
//! The persistent store is a document database: flat JSON records keyed by
//! `(collection, id)`, plus append-only collections for the audit trail.
//! Engines normalize adapter results to found/not-found and
//! success/failure; they never see backend-specific errors.

use async_trait::async_trait;

use tokreg_core::StoreError;

/// A stored document. Everything crossing the store boundary is a flat,
/// JSON-serializable record (ISO-8601 dates, enums as strings).
pub type Document = serde_json::Value;

/// Mutation applied under the store's single-document lock.
///
/// The closure may inspect the current document, validate preconditions,
/// and mutate in place; returning `Err` aborts the update without writing.
pub type UpdateFn = Box<dyn FnOnce(&mut Document) -> Result<(), StoreError> + Send>;

/// A simple conjunctive field-equality query.
///
/// This is the whole query surface the registry needs: claims by identity,
/// by topic, by issuer, by status. Backends may push the filters down
/// (Postgres) or scan client-side (memory).
#[derive(Debug, Clone)]
pub struct Query {
    /// Collection to search.
    pub collection: String,
    /// Field-equality filters, all of which must match.
    pub filters: Vec<(String, Document)>,
}

impl Query {
    /// Start a query over the given collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
        }
    }

    /// Add a field-equality filter.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Document>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Whether a document satisfies every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Durable document storage.
///
/// ## Atomicity contract
///
/// [`update`][DocumentStore::update] applies its closure atomically with
/// respect to other operations on the same `(collection, id)`. Nothing is
/// guaranteed across documents — callers own any multi-document
/// consistency (see the identity projection reconcile path).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert or replace a document.
    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    /// Atomically read-modify-write a document.
    ///
    /// Returns the updated document, `Ok(None)` if the key does not exist,
    /// or the closure's error (in which case nothing was written).
    async fn update(
        &self,
        collection: &str,
        id: &str,
        apply: UpdateFn,
    ) -> Result<Option<Document>, StoreError>;

    /// Run a conjunctive field-equality query.
    async fn find(&self, query: Query) -> Result<Vec<Document>, StoreError>;

    /// Convenience: query a single field for equality.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: Document,
    ) -> Result<Vec<Document>, StoreError> {
        self.find(Query::collection(collection).filter(field, value))
            .await
    }

    /// Append a document to an append-only collection.
    async fn append(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Read an append-only collection in insertion order.
    async fn list_appended(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_matches_all_filters() {
        let q = Query::collection("claims")
            .filter("topic", "KYC_APPROVED")
            .filter("status", "ACTIVE");

        assert!(q.matches(&json!({"topic": "KYC_APPROVED", "status": "ACTIVE", "x": 1})));
        assert!(!q.matches(&json!({"topic": "KYC_APPROVED", "status": "REVOKED"})));
        assert!(!q.matches(&json!({"status": "ACTIVE"})));
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = Query::collection("claims");
        assert!(q.matches(&json!({"anything": true})));
    }
}
