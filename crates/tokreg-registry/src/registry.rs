//! # Identity Registry
//!
//! One identity per wallet address, keyed by the normalized address.
//! Identities are never deleted; compliance standing is withdrawn by
//! revoking the status, which is terminal.
//!
//! The embedded claim projection is a read optimization. The claims
//! collection stays the source of truth; [`IdentityRegistry::reconcile`]
//! rebuilds the projection from it when the two-write attach path drifts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;

use tokreg_core::{
    claim_validity, AuditOperation, ClaimId, ClaimRecord, ClaimReference, ClaimTopic,
    IdentityRecord, IdentityStatus, InvalidClaimReason, OperatorId, RegistryError, StoreError,
    SubjectId, ValidationError, WalletAddress,
};
use tokreg_store::{collections, delete_or_log, get_or_miss, set_or_log};
use tokreg_store::{AuditTrail, Cache, DocumentStore};

/// Registrations per concurrent batch chunk. Bounds store fan-out during
/// bulk onboarding.
const BATCH_CHUNK: usize = 50;

/// Parameters for registering an identity.
#[derive(Debug, Clone)]
pub struct RegisterIdentityRequest {
    /// The wallet address to bind. Also the record key.
    pub address: WalletAddress,
    /// The platform subject behind the address. Must already exist.
    pub subject_id: SubjectId,
    /// Public identity key material.
    pub identity_key: String,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Value,
}

/// Diagnostic result of an identity verification check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityVerification {
    /// Whether the identity is `VERIFIED` and every required topic is
    /// covered by a currently-valid claim.
    pub is_verified: bool,
    /// Why the identity is not verified, when the failure is at the
    /// identity level (unregistered, or status not `VERIFIED`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The identity's stored status; `None` for an unregistered address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IdentityStatus>,
    /// Required topics with no usable claim attached (absent or revoked).
    pub missing_claims: Vec<ClaimTopic>,
    /// Required topics whose attached claim has expired.
    pub expired_claims: Vec<ClaimTopic>,
}

/// A per-address failure from batch registration.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRegistrationFailure {
    /// The address whose registration failed.
    pub address: WalletAddress,
    /// Failure detail.
    pub error: String,
}

/// Aggregate result of a batch registration: per-address outcomes in input
/// order, failures isolated, no rollback of prior successes.
#[derive(Debug, Default)]
pub struct BatchRegistrationOutcome {
    /// Identities registered.
    pub successes: Vec<IdentityRecord>,
    /// Failed registrations.
    pub failures: Vec<BatchRegistrationFailure>,
}

/// The identity registry.
#[derive(Clone)]
pub struct IdentityRegistry {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    audit: AuditTrail,
    cache_ttl: Duration,
}

fn cache_key(address: &WalletAddress) -> String {
    format!("identity:{address}")
}

fn decode_identity(doc: serde_json::Value) -> Result<IdentityRecord, RegistryError> {
    Ok(serde_json::from_value(doc)?)
}

impl IdentityRegistry {
    /// Create an identity registry over the given adapters.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        audit: AuditTrail,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            audit,
            cache_ttl,
        }
    }

    /// Register an identity for a wallet address. The record starts
    /// `PENDING` unconditionally; verification is always a separate,
    /// explicit step.
    ///
    /// # Errors
    ///
    /// `Validation` for empty key material; `NotFound` when the subject
    /// does not exist; `BadRequest` when the subject record binds a
    /// different wallet address; `Conflict` when the address is already
    /// registered.
    pub async fn register_identity(
        &self,
        request: RegisterIdentityRequest,
        operator: Option<OperatorId>,
    ) -> Result<IdentityRecord, RegistryError> {
        if request.identity_key.trim().is_empty() {
            return Err(ValidationError::InvalidIdentityKey.into());
        }

        let subject = self
            .store
            .get(collections::SUBJECTS, request.subject_id.as_str())
            .await?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("subject {}", request.subject_id))
            })?;
        if let Some(bound) = subject.get("wallet_address").and_then(|a| a.as_str()) {
            let bound = WalletAddress::new(bound)?;
            if bound != request.address {
                return Err(RegistryError::BadRequest(format!(
                    "address {} does not match the subject's bound address",
                    request.address
                )));
            }
        }

        if self
            .store
            .get(collections::IDENTITIES, request.address.as_str())
            .await?
            .is_some()
        {
            return Err(RegistryError::Conflict(format!(
                "identity already registered for {}",
                request.address
            )));
        }

        let now = Utc::now();
        let record = IdentityRecord {
            address: request.address,
            subject_id: request.subject_id,
            identity_key: request.identity_key,
            status: IdentityStatus::Pending,
            claims: Vec::new(),
            created_at: now,
            last_updated_at: now,
            verified_at: None,
            metadata: request.metadata,
        };

        let doc = serde_json::to_value(&record)?;
        self.store
            .put(collections::IDENTITIES, record.address.as_str(), doc.clone())
            .await?;
        set_or_log(&*self.cache, &cache_key(&record.address), doc, self.cache_ttl).await;

        self.audit
            .record_or_log(
                AuditOperation::IdentityRegister,
                record.address.as_str(),
                operator,
                serde_json::json!({"subject_id": record.subject_id}),
            )
            .await;

        tracing::info!(address = %record.address, subject = %record.subject_id, "identity registered");
        Ok(record)
    }

    /// Fetch an identity by address, cache-first.
    pub async fn get_identity(
        &self,
        address: &WalletAddress,
    ) -> Result<Option<IdentityRecord>, RegistryError> {
        let key = cache_key(address);
        if let Some(doc) = get_or_miss(&*self.cache, &key).await {
            return Ok(Some(decode_identity(doc)?));
        }

        let Some(doc) = self
            .store
            .get(collections::IDENTITIES, address.as_str())
            .await?
        else {
            return Ok(None);
        };
        set_or_log(&*self.cache, &key, doc.clone(), self.cache_ttl).await;
        decode_identity(doc).map(Some)
    }

    /// Diagnostic verification: status plus per-topic claim coverage.
    ///
    /// An unregistered address is a diagnostic, not an error — callers ask
    /// this question about arbitrary counterparties. A required topic with
    /// no reference, or whose reference is revoked, lands in
    /// `missing_claims`; one whose reference has lapsed lands in
    /// `expired_claims`. Validity comes from the reference's own
    /// `(status, expires_at)` — no claim lookups.
    pub async fn verify_identity(
        &self,
        address: &WalletAddress,
        required_topics: &[ClaimTopic],
    ) -> Result<IdentityVerification, RegistryError> {
        let Some(record) = self.get_identity(address).await? else {
            return Ok(IdentityVerification {
                is_verified: false,
                reason: Some("Identity not found".to_string()),
                status: None,
                missing_claims: Vec::new(),
                expired_claims: Vec::new(),
            });
        };

        let now = Utc::now();
        let mut missing = Vec::new();
        let mut expired = Vec::new();
        for &topic in required_topics {
            match record.claim_for_topic(topic) {
                None => missing.push(topic),
                Some(reference) => {
                    match claim_validity(reference.status, reference.expires_at, now) {
                        tokreg_core::ClaimValidity::Valid { .. } => {}
                        tokreg_core::ClaimValidity::Invalid { reason } => match reason {
                            InvalidClaimReason::Expired => expired.push(topic),
                            InvalidClaimReason::Revoked => missing.push(topic),
                        },
                    }
                }
            }
        }

        let reason = (record.status != IdentityStatus::Verified)
            .then(|| format!("Identity status is {}", record.status));
        Ok(IdentityVerification {
            is_verified: reason.is_none() && missing.is_empty() && expired.is_empty(),
            reason,
            status: Some(record.status),
            missing_claims: missing,
            expired_claims: expired,
        })
    }

    /// Transition an identity's status.
    ///
    /// `VERIFIED → PENDING` is allowed (an operator sending a verified
    /// identity back for review); `REVOKED` is terminal. The first entry
    /// into `VERIFIED` stamps `verified_at`; the stamp survives later
    /// transitions.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unregistered address; `Conflict` for any
    /// transition out of `REVOKED`.
    pub async fn update_identity_status(
        &self,
        address: &WalletAddress,
        new_status: IdentityStatus,
        operator: Option<OperatorId>,
    ) -> Result<IdentityRecord, RegistryError> {
        let now = Utc::now();
        let updated = self
            .store
            .update(
                collections::IDENTITIES,
                address.as_str(),
                Box::new(move |doc| {
                    if doc.get("status").and_then(|s| s.as_str()) == Some("REVOKED") {
                        return Err(StoreError::Precondition(
                            "identity is revoked; revocation is terminal".to_string(),
                        ));
                    }
                    doc["status"] = serde_json::json!(new_status);
                    doc["last_updated_at"] = serde_json::json!(now);
                    if new_status == IdentityStatus::Verified
                        && doc.get("verified_at").map_or(true, |v| v.is_null())
                    {
                        doc["verified_at"] = serde_json::json!(now);
                    }
                    Ok(())
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::Precondition(msg) => RegistryError::Conflict(msg),
                other => RegistryError::Store(other),
            })?
            .ok_or_else(|| RegistryError::NotFound(format!("identity {address}")))?;

        set_or_log(&*self.cache, &cache_key(address), updated.clone(), self.cache_ttl).await;

        let record = decode_identity(updated)?;
        self.audit
            .record_or_log(
                AuditOperation::IdentityStatusUpdate,
                address.as_str(),
                operator,
                serde_json::json!({"status": new_status}),
            )
            .await;

        tracing::info!(address = %address, status = %new_status, "identity status updated");
        Ok(record)
    }

    /// Attach a claim to an identity, replacing any prior reference for the
    /// same topic in the projection. The claim record itself is untouched —
    /// a superseded claim stays individually queryable.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unregistered address.
    pub async fn add_claim_to_identity(
        &self,
        address: &WalletAddress,
        claim: &ClaimRecord,
        operator: Option<OperatorId>,
    ) -> Result<IdentityRecord, RegistryError> {
        let reference = claim.to_reference();
        let record = self
            .mutate_projection(address, move |record| {
                record.attach_claim(reference);
            })
            .await?;

        self.audit
            .record_or_log(
                AuditOperation::IdentityClaimAttach,
                address.as_str(),
                operator,
                serde_json::json!({"claim_id": claim.id, "topic": claim.topic}),
            )
            .await;

        tracing::info!(address = %address, claim = %claim.id, topic = %claim.topic, "claim attached");
        Ok(record)
    }

    /// Detach a claim reference from an identity's projection.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unregistered address or a claim not attached to it.
    pub async fn remove_claim_from_identity(
        &self,
        address: &WalletAddress,
        claim_id: ClaimId,
        operator: Option<OperatorId>,
    ) -> Result<IdentityRecord, RegistryError> {
        let now = Utc::now();
        let updated = self
            .store
            .update(
                collections::IDENTITIES,
                address.as_str(),
                Box::new(move |doc| {
                    let mut record: IdentityRecord = serde_json::from_value(doc.clone())
                        .map_err(|e| StoreError::CorruptDocument {
                            collection: collections::IDENTITIES.to_string(),
                            id: doc
                                .get("address")
                                .and_then(|a| a.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            reason: e.to_string(),
                        })?;
                    if record.detach_claim(claim_id).is_none() {
                        return Err(StoreError::Precondition(format!(
                            "claim {claim_id} is not attached to this identity"
                        )));
                    }
                    record.last_updated_at = now;
                    *doc = serde_json::to_value(&record)
                        .map_err(|e| StoreError::Backend(e.to_string()))?;
                    Ok(())
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::Precondition(msg) => RegistryError::NotFound(msg),
                other => RegistryError::Store(other),
            })?
            .ok_or_else(|| RegistryError::NotFound(format!("identity {address}")))?;

        set_or_log(&*self.cache, &cache_key(address), updated.clone(), self.cache_ttl).await;

        self.audit
            .record_or_log(
                AuditOperation::IdentityClaimDetach,
                address.as_str(),
                operator,
                serde_json::json!({"claim_id": claim_id}),
            )
            .await;

        decode_identity(updated)
    }

    /// Register a batch of identities: chunks of [`BATCH_CHUNK`] run
    /// concurrently, failures are isolated per address, and outcomes keep
    /// input order. Nothing is rolled back on partial failure.
    pub async fn batch_register_identities(
        &self,
        requests: Vec<RegisterIdentityRequest>,
        operator: Option<OperatorId>,
    ) -> BatchRegistrationOutcome {
        let mut outcome = BatchRegistrationOutcome::default();
        let mut pending = requests.into_iter();
        loop {
            let chunk: Vec<_> = pending.by_ref().take(BATCH_CHUNK).collect();
            if chunk.is_empty() {
                break;
            }
            let results = join_all(chunk.into_iter().map(|request| {
                let operator = operator.clone();
                async move {
                    let address = request.address.clone();
                    (address, self.register_identity(request, operator).await)
                }
            }))
            .await;

            for (address, result) in results {
                match result {
                    Ok(record) => outcome.successes.push(record),
                    Err(e) => outcome.failures.push(BatchRegistrationFailure {
                        address,
                        error: e.to_string(),
                    }),
                }
            }
        }
        outcome
    }

    /// Rebuild an identity's claim projection from the claims collection.
    ///
    /// For each topic, the most recently issued claim wins; topics with no
    /// claims drop out of the projection. This is the repair path for the
    /// two-write issue-then-attach sequence.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unregistered address.
    pub async fn reconcile(
        &self,
        address: &WalletAddress,
        operator: Option<OperatorId>,
    ) -> Result<IdentityRecord, RegistryError> {
        let docs = self
            .store
            .query_by_field(
                collections::CLAIMS,
                "identity_id",
                serde_json::json!(address.as_str()),
            )
            .await?;

        let mut latest: Vec<ClaimReference> = Vec::new();
        for doc in docs {
            let claim: ClaimRecord = serde_json::from_value(doc)?;
            match latest.iter_mut().find(|r| r.topic == claim.topic) {
                Some(existing) if existing.issued_at >= claim.issued_at => {}
                Some(existing) => *existing = claim.to_reference(),
                None => latest.push(claim.to_reference()),
            }
        }

        let rebuilt = latest.clone();
        let record = self
            .mutate_projection(address, move |record| {
                record.claims = rebuilt;
            })
            .await?;

        self.audit
            .record_or_log(
                AuditOperation::IdentityReconcile,
                address.as_str(),
                operator,
                serde_json::json!({"claim_count": latest.len()}),
            )
            .await;

        tracing::info!(address = %address, claims = latest.len(), "claim projection reconciled");
        Ok(record)
    }

    /// Single decode-mutate-encode path for projection updates.
    async fn mutate_projection(
        &self,
        address: &WalletAddress,
        mutate: impl FnOnce(&mut IdentityRecord) + Send + 'static,
    ) -> Result<IdentityRecord, RegistryError> {
        let now = Utc::now();
        let updated = self
            .store
            .update(
                collections::IDENTITIES,
                address.as_str(),
                Box::new(move |doc| {
                    let mut record: IdentityRecord = serde_json::from_value(doc.clone())
                        .map_err(|e| StoreError::CorruptDocument {
                            collection: collections::IDENTITIES.to_string(),
                            id: doc
                                .get("address")
                                .and_then(|a| a.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            reason: e.to_string(),
                        })?;
                    mutate(&mut record);
                    record.last_updated_at = now;
                    *doc = serde_json::to_value(&record)
                        .map_err(|e| StoreError::Backend(e.to_string()))?;
                    Ok(())
                }),
            )
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("identity {address}")))?;

        set_or_log(&*self.cache, &cache_key(address), updated.clone(), self.cache_ttl).await;
        decode_identity(updated)
    }

    /// Drop a cached identity entry. Used by tests exercising cache
    /// coherence.
    pub async fn invalidate(&self, address: &WalletAddress) {
        delete_or_log(&*self.cache, &cache_key(address)).await;
    }
}
