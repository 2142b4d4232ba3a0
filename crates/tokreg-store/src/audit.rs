//! # Audit Trail — Immutable Hash Chain
//!
//! Every registry mutation (identity registration, status update, claim
//! issue/revoke/renew, issuer addition) appends an audit entry whose
//! SHA-256 hash chains to the previous entry, forming a tamper-evident log.
//!
//! Audit writes are the one fire-and-forget path in the system: a failed
//! append is logged and swallowed, never failing or masking the primary
//! operation. Engines call [`AuditTrail::record_or_log`] for exactly that
//! behavior.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tokreg_core::{sha256_hex, AuditLogEntry, AuditOperation, OperatorId, StoreError};

use crate::collections;
use crate::document::DocumentStore;

/// Zero hash seeding the chain before any entry exists.
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Append-only, hash-chained audit log over a [`DocumentStore`].
///
/// Appends are serialized through an internal lock (shared by clones):
/// reading the head hash and appending the chained entry must be one
/// critical section, or two concurrent writers chain to the same head
/// and the log reports a broken link forever after.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn DocumentStore>,
    append_lock: Arc<Mutex<()>>,
}

impl AuditTrail {
    /// Create an audit trail writing to the store's audit collection.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append an audit entry, chaining its hash to the previous entry.
    pub async fn record(
        &self,
        operation: AuditOperation,
        identity_id: &str,
        operator_id: Option<OperatorId>,
        changes: serde_json::Value,
    ) -> Result<AuditLogEntry, StoreError> {
        let _head_guard = self.append_lock.lock().await;
        let previous_hash = self.head_hash().await?;
        let timestamp = Utc::now();

        let hash_input = format!(
            "{}{}{}{}{}",
            previous_hash.as_deref().unwrap_or(GENESIS_HASH),
            operation,
            identity_id,
            timestamp.to_rfc3339(),
            changes,
        );
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp,
            operation,
            identity_id: identity_id.to_string(),
            operator_id,
            changes,
            previous_hash,
            entry_hash: sha256_hex(hash_input.as_bytes()),
        };

        let doc = serde_json::to_value(&entry)
            .map_err(|e| StoreError::Backend(format!("audit entry serialization: {e}")))?;
        self.store.append(collections::AUDIT_LOG, doc).await?;
        Ok(entry)
    }

    /// Append an audit entry, logging and swallowing any failure.
    pub async fn record_or_log(
        &self,
        operation: AuditOperation,
        identity_id: &str,
        operator_id: Option<OperatorId>,
        changes: serde_json::Value,
    ) {
        if let Err(e) = self
            .record(operation, identity_id, operator_id, changes)
            .await
        {
            tracing::warn!(
                operation = %operation,
                identity_id,
                error = %e,
                "audit append failed; primary operation unaffected"
            );
        }
    }

    /// All entries concerning one identity, in chain order.
    pub async fn entries_for_identity(
        &self,
        identity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let entries = self.load_all().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.identity_id == identity_id)
            .collect())
    }

    /// Verify hash continuity over the whole chain.
    pub async fn verify_chain(&self) -> Result<ChainIntegrity, StoreError> {
        let entries = self.load_all().await?;
        let total_entries = entries.len();
        let mut broken_links = 0;
        let mut last_hash: Option<&str> = None;

        for entry in &entries {
            if let Some(expected_prev) = last_hash {
                if entry.previous_hash.as_deref() != Some(expected_prev) {
                    broken_links += 1;
                }
            }
            last_hash = Some(&entry.entry_hash);
        }

        Ok(ChainIntegrity {
            total_entries,
            broken_links,
            chain_valid: broken_links == 0,
        })
    }

    /// Hash of the most recent entry, if any.
    async fn head_hash(&self) -> Result<Option<String>, StoreError> {
        let entries = self.store.list_appended(collections::AUDIT_LOG).await?;
        Ok(entries
            .last()
            .and_then(|doc| doc.get("entry_hash"))
            .and_then(|h| h.as_str())
            .map(String::from))
    }

    async fn load_all(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        let docs = self.store.list_appended(collections::AUDIT_LOG).await?;
        docs.into_iter()
            .enumerate()
            .map(|(idx, doc)| {
                serde_json::from_value(doc).map_err(|e| StoreError::CorruptDocument {
                    collection: collections::AUDIT_LOG.to_string(),
                    id: idx.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChainIntegrity {
    /// Entries scanned.
    pub total_entries: usize,
    /// Entries whose `previous_hash` does not match the predecessor.
    pub broken_links: usize,
    /// Whether the chain is intact end to end.
    pub chain_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn trail() -> (AuditTrail, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (AuditTrail::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_entry_has_no_previous_hash() {
        let (trail, _) = trail();
        let entry = trail
            .record(AuditOperation::IdentityRegister, "0xaa", None, json!({}))
            .await
            .unwrap();
        assert!(entry.previous_hash.is_none());
        assert_eq!(entry.entry_hash.len(), 64);
    }

    #[tokio::test]
    async fn entries_chain_to_predecessor() {
        let (trail, _) = trail();
        let first = trail
            .record(AuditOperation::ClaimIssue, "0xaa", None, json!({"claim": 1}))
            .await
            .unwrap();
        let second = trail
            .record(AuditOperation::ClaimRevoke, "0xaa", None, json!({"claim": 1}))
            .await
            .unwrap();

        assert_eq!(second.previous_hash.as_deref(), Some(first.entry_hash.as_str()));
    }

    #[tokio::test]
    async fn verify_chain_detects_intact_log() {
        let (trail, _) = trail();
        for i in 0..10 {
            trail
                .record(AuditOperation::ClaimIssue, "0xaa", None, json!({"i": i}))
                .await
                .unwrap();
        }
        let integrity = trail.verify_chain().await.unwrap();
        assert_eq!(integrity.total_entries, 10);
        assert!(integrity.chain_valid);
    }

    #[tokio::test]
    async fn verify_chain_detects_tampering() {
        let store = Arc::new(MemoryStore::new());
        let trail = AuditTrail::new(store.clone());
        trail
            .record(AuditOperation::ClaimIssue, "0xaa", None, json!({}))
            .await
            .unwrap();
        // Forge an entry that does not chain to the real head.
        let mut forged = serde_json::to_value(
            trail
                .record(AuditOperation::ClaimRevoke, "0xaa", None, json!({}))
                .await
                .unwrap(),
        )
        .unwrap();
        forged["previous_hash"] = json!("ff00ff00");
        store.append(collections::AUDIT_LOG, forged).await.unwrap();

        let integrity = trail.verify_chain().await.unwrap();
        assert!(!integrity.chain_valid);
        assert_eq!(integrity.broken_links, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_keep_the_chain_intact() {
        let (trail, _) = trail();
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let trail = trail.clone();
                tokio::spawn(async move {
                    trail
                        .record(AuditOperation::ClaimIssue, "0xaa", None, json!({"i": i}))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let integrity = trail.verify_chain().await.unwrap();
        assert_eq!(integrity.total_entries, 20);
        assert_eq!(integrity.broken_links, 0);
        assert!(integrity.chain_valid);
    }

    #[tokio::test]
    async fn entries_for_identity_filters() {
        let (trail, _) = trail();
        trail
            .record(AuditOperation::IdentityRegister, "0xaa", None, json!({}))
            .await
            .unwrap();
        trail
            .record(AuditOperation::IdentityRegister, "0xbb", None, json!({}))
            .await
            .unwrap();
        trail
            .record(
                AuditOperation::ClaimIssue,
                "0xaa",
                Some(OperatorId::new("ops-1")),
                json!({}),
            )
            .await
            .unwrap();

        let entries = trail.entries_for_identity("0xaa").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].operator_id.as_ref().unwrap().as_str(), "ops-1");
    }
}
