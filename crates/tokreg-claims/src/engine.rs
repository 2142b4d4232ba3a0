//! # Claims Engine
//!
//! Issue, verify, revoke, renew, and bulk-update claims. Issuance is gated
//! by the issuer authority before any write. Verification is a pure
//! function of `(status, expires_at, now)`; the `EXPIRED` status write-back
//! is a best-effort hint so two readers racing to expire the same claim
//! cannot disagree.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokreg_core::{
    claim_validity, verification_hash, AuditOperation, ClaimId, ClaimRecord, ClaimStatus,
    ClaimTopic, ClaimValidity, InvalidClaimReason, IssuerId, OperatorId, RegistryError,
    StoreError, ValidationError, WalletAddress,
};
use tokreg_store::{collections, delete_or_log, get_or_miss, set_or_log};
use tokreg_store::{AuditTrail, Cache, DocumentStore};

use crate::issuers::IssuerAuthority;

/// Outcome of a claim verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerification {
    /// Whether the claim currently counts toward compliance checks.
    pub is_valid: bool,
    /// Denial reason when invalid ("Claim not found", "Claim has expired",
    /// "Claim status is REVOKED").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Days until expiry (ceiling) for valid, time-bounded claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_days: Option<i64>,
}

impl ClaimVerification {
    fn valid(expires_in_days: Option<i64>) -> Self {
        Self {
            is_valid: true,
            reason: None,
            expires_in_days,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            expires_in_days: None,
        }
    }
}

/// One item of a bulk claim update.
#[derive(Debug, Clone)]
pub enum ClaimUpdate {
    /// Revoke the claim with a reason.
    Revoke {
        /// Claim to revoke.
        claim_id: ClaimId,
        /// Reason recorded on the claim and in the audit trail.
        reason: String,
    },
    /// Renew the claim with a new expiry.
    Renew {
        /// Claim to renew.
        claim_id: ClaimId,
        /// New expiry; `None` makes the claim unbounded.
        new_expiry: Option<DateTime<Utc>>,
    },
}

impl ClaimUpdate {
    fn claim_id(&self) -> ClaimId {
        match self {
            Self::Revoke { claim_id, .. } | Self::Renew { claim_id, .. } => *claim_id,
        }
    }
}

/// A per-item failure from a bulk update.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimUpdateFailure {
    /// The claim whose update failed.
    pub claim_id: ClaimId,
    /// Failure detail.
    pub error: String,
}

/// Aggregate result of a bulk update: a fold into successes and failures,
/// never short-circuiting, with no rollback of prior successes.
#[derive(Debug, Default)]
pub struct BulkUpdateOutcome {
    /// Claims updated, in input order.
    pub successes: Vec<ClaimRecord>,
    /// Failed items, in input order.
    pub failures: Vec<ClaimUpdateFailure>,
}

/// The claims engine.
#[derive(Clone)]
pub struct ClaimsEngine {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    audit: AuditTrail,
    issuers: Arc<IssuerAuthority>,
    cache_ttl: Duration,
}

fn cache_key(id: &ClaimId) -> String {
    format!("claim:{id}")
}

fn decode_claim(doc: serde_json::Value) -> Result<ClaimRecord, RegistryError> {
    Ok(serde_json::from_value(doc)?)
}

impl ClaimsEngine {
    /// Create a claims engine over the given adapters and issuer authority.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        audit: AuditTrail,
        issuers: Arc<IssuerAuthority>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            audit,
            issuers,
            cache_ttl,
        }
    }

    /// Issue a claim about an identity.
    ///
    /// The issuer must be trusted and authorized for the topic; otherwise
    /// nothing is persisted. Re-issuing a topic creates a new, independent
    /// claim record — only the identity registry's reference projection is
    /// replaced, so identity-level reads see the latest.
    ///
    /// # Errors
    ///
    /// `Forbidden` for an unknown issuer or an issuer/topic pair outside
    /// the issuer's grant.
    pub async fn issue_claim(
        &self,
        identity_id: WalletAddress,
        topic: ClaimTopic,
        issuer: IssuerId,
        data: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
        operator: Option<OperatorId>,
    ) -> Result<ClaimRecord, RegistryError> {
        // Authorization precedes the write, unconditionally.
        let trusted = self
            .issuers
            .get_issuer(&issuer)
            .await?
            .ok_or_else(|| RegistryError::Forbidden(format!("issuer {issuer} is not trusted")))?;
        if !trusted.is_authorized_for(topic) {
            return Err(RegistryError::Forbidden(format!(
                "issuer {issuer} unauthorized for topic {topic}"
            )));
        }

        let now = Utc::now();
        let id = ClaimId::new();
        let claim = ClaimRecord {
            id,
            verification_hash: verification_hash(&identity_id, topic, &issuer, now, &data),
            identity_id,
            topic,
            issuer,
            data,
            issued_at: now,
            expires_at,
            status: ClaimStatus::Active,
            revocation_reason: None,
            updated_at: now,
        };

        let doc = serde_json::to_value(&claim)?;
        self.store
            .put(collections::CLAIMS, &id.to_string(), doc.clone())
            .await?;
        set_or_log(&*self.cache, &cache_key(&id), doc, self.cache_ttl).await;

        self.audit
            .record_or_log(
                AuditOperation::ClaimIssue,
                claim.identity_id.as_str(),
                operator,
                serde_json::json!({
                    "claim_id": id,
                    "topic": topic,
                    "issuer": issuer,
                    "expires_at": expires_at,
                }),
            )
            .await;

        tracing::info!(claim = %id, topic = %topic, issuer = %issuer, "claim issued");
        Ok(claim)
    }

    /// Fetch a claim by id, cache-first.
    pub async fn get_claim(&self, id: &ClaimId) -> Result<Option<ClaimRecord>, RegistryError> {
        let key = cache_key(id);
        if let Some(doc) = get_or_miss(&*self.cache, &key).await {
            return Ok(Some(decode_claim(doc)?));
        }

        let Some(doc) = self.store.get(collections::CLAIMS, &id.to_string()).await? else {
            return Ok(None);
        };
        set_or_log(&*self.cache, &key, doc.clone(), self.cache_ttl).await;
        decode_claim(doc).map(Some)
    }

    /// Verify a claim.
    ///
    /// Not found and non-active claims are invalid with the reason named.
    /// A stored-`ACTIVE` claim past its expiry is invalid immediately; its
    /// status is corrected to `EXPIRED` as a best-effort write-back that
    /// never fails the verification.
    pub async fn verify_claim(&self, id: &ClaimId) -> Result<ClaimVerification, RegistryError> {
        let Some(claim) = self.get_claim(id).await? else {
            return Ok(ClaimVerification::invalid("Claim not found"));
        };

        match claim_validity(claim.status, claim.expires_at, Utc::now()) {
            ClaimValidity::Valid { expires_in_days } => {
                Ok(ClaimVerification::valid(expires_in_days))
            }
            ClaimValidity::Invalid { reason } => {
                if reason == InvalidClaimReason::Expired && claim.status == ClaimStatus::Active {
                    self.write_back_expiry(id).await;
                }
                Ok(ClaimVerification::invalid(reason.message()))
            }
        }
    }

    /// Lazily converge the stored status of an expired claim.
    async fn write_back_expiry(&self, id: &ClaimId) {
        let now = Utc::now();
        let id_string = id.to_string();
        let result = self
            .store
            .update(
                collections::CLAIMS,
                &id_string,
                Box::new(move |doc| {
                    // Only correct a still-ACTIVE claim; a concurrent
                    // revoke or renew wins.
                    if doc.get("status").and_then(|s| s.as_str()) == Some("ACTIVE") {
                        doc["status"] = serde_json::json!(ClaimStatus::Expired);
                        doc["updated_at"] = serde_json::json!(now);
                    }
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(Some(doc)) => {
                set_or_log(&*self.cache, &cache_key(id), doc, self.cache_ttl).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(claim = %id, error = %e, "expiry write-back failed; validity unaffected");
            }
        }
    }

    /// Revoke a claim. Terminal and not idempotent.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown claim; `Conflict` if already revoked.
    pub async fn revoke_claim(
        &self,
        id: &ClaimId,
        reason: String,
        operator: Option<OperatorId>,
    ) -> Result<ClaimRecord, RegistryError> {
        let now = Utc::now();
        let id_string = id.to_string();
        let reason_for_update = reason.clone();
        let updated = self
            .store
            .update(
                collections::CLAIMS,
                &id_string,
                Box::new(move |doc| {
                    if doc.get("status").and_then(|s| s.as_str()) == Some("REVOKED") {
                        return Err(StoreError::Precondition(
                            "claim is already revoked".to_string(),
                        ));
                    }
                    doc["status"] = serde_json::json!(ClaimStatus::Revoked);
                    doc["revocation_reason"] = serde_json::json!(reason_for_update);
                    doc["updated_at"] = serde_json::json!(now);
                    Ok(())
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::Precondition(msg) => RegistryError::Conflict(msg),
                other => RegistryError::Store(other),
            })?
            .ok_or_else(|| RegistryError::NotFound(format!("claim {id}")))?;

        delete_or_log(&*self.cache, &cache_key(id)).await;

        let claim = decode_claim(updated)?;
        self.audit
            .record_or_log(
                AuditOperation::ClaimRevoke,
                claim.identity_id.as_str(),
                operator,
                serde_json::json!({"claim_id": id, "reason": reason}),
            )
            .await;

        tracing::info!(claim = %id, "claim revoked");
        Ok(claim)
    }

    /// Renew a claim from `ACTIVE` or `EXPIRED`, resetting it to `ACTIVE`
    /// with a new expiry and clearing any revocation reason.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown claim; `BadRequest` when revoked
    /// (revocation is terminal) or when the new expiry is in the past.
    pub async fn renew_claim(
        &self,
        id: &ClaimId,
        new_expiry: Option<DateTime<Utc>>,
        operator: Option<OperatorId>,
    ) -> Result<ClaimRecord, RegistryError> {
        let now = Utc::now();
        if let Some(expiry) = new_expiry {
            if expiry <= now {
                return Err(ValidationError::ExpiryInPast(expiry.to_rfc3339()).into());
            }
        }

        let id_string = id.to_string();
        let updated = self
            .store
            .update(
                collections::CLAIMS,
                &id_string,
                Box::new(move |doc| {
                    if doc.get("status").and_then(|s| s.as_str()) == Some("REVOKED") {
                        return Err(StoreError::Precondition(
                            "cannot renew a revoked claim: revocation is terminal".to_string(),
                        ));
                    }
                    doc["status"] = serde_json::json!(ClaimStatus::Active);
                    doc["expires_at"] = serde_json::json!(new_expiry);
                    doc["revocation_reason"] = serde_json::Value::Null;
                    doc["updated_at"] = serde_json::json!(now);
                    Ok(())
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::Precondition(msg) => RegistryError::BadRequest(msg),
                other => RegistryError::Store(other),
            })?
            .ok_or_else(|| RegistryError::NotFound(format!("claim {id}")))?;

        set_or_log(&*self.cache, &cache_key(id), updated.clone(), self.cache_ttl).await;

        let claim = decode_claim(updated)?;
        self.audit
            .record_or_log(
                AuditOperation::ClaimRenew,
                claim.identity_id.as_str(),
                operator,
                serde_json::json!({"claim_id": id, "new_expiry": new_expiry}),
            )
            .await;

        tracing::info!(claim = %id, "claim renewed");
        Ok(claim)
    }

    /// Apply a batch of updates sequentially (deterministic audit order),
    /// isolating per-item failures. Prior successes are never rolled back —
    /// there is no cross-item transaction.
    pub async fn bulk_update_claims(
        &self,
        updates: Vec<ClaimUpdate>,
        operator: Option<OperatorId>,
    ) -> BulkUpdateOutcome {
        let mut outcome = BulkUpdateOutcome::default();
        for update in updates {
            let claim_id = update.claim_id();
            let result = match update {
                ClaimUpdate::Revoke { claim_id, reason } => {
                    self.revoke_claim(&claim_id, reason, operator.clone()).await
                }
                ClaimUpdate::Renew {
                    claim_id,
                    new_expiry,
                } => self.renew_claim(&claim_id, new_expiry, operator.clone()).await,
            };
            match result {
                Ok(claim) => outcome.successes.push(claim),
                Err(e) => outcome.failures.push(ClaimUpdateFailure {
                    claim_id,
                    error: e.to_string(),
                }),
            }
        }
        outcome
    }

    /// Whether the identity holds a currently-valid claim for every
    /// required topic. One failure fails the whole check.
    pub async fn verify_required_claims(
        &self,
        identity_id: &WalletAddress,
        topics: &[ClaimTopic],
    ) -> Result<bool, RegistryError> {
        let claims = self.claims_for_identity(identity_id).await?;
        let now = Utc::now();
        for topic in topics {
            let satisfied = claims.iter().any(|c| {
                c.topic == *topic && claim_validity(c.status, c.expires_at, now).is_valid()
            });
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// All claims about an identity, any status.
    pub async fn claims_for_identity(
        &self,
        identity_id: &WalletAddress,
    ) -> Result<Vec<ClaimRecord>, RegistryError> {
        let docs = self
            .store
            .query_by_field(
                collections::CLAIMS,
                "identity_id",
                serde_json::json!(identity_id.as_str()),
            )
            .await?;
        docs.into_iter().map(decode_claim).collect()
    }

    /// Stored-`ACTIVE` claims whose expiry has passed.
    ///
    /// Expiry correction is otherwise lazy (at read time); this sweep gives
    /// operational jobs a way to find claims awaiting convergence.
    pub async fn find_expired_claims(&self) -> Result<Vec<ClaimRecord>, RegistryError> {
        let docs = self
            .store
            .query_by_field(
                collections::CLAIMS,
                "status",
                serde_json::json!(ClaimStatus::Active),
            )
            .await?;
        let now = Utc::now();
        let mut expired = Vec::new();
        for doc in docs {
            let claim = decode_claim(doc)?;
            if matches!(claim.expires_at, Some(expiry) if expiry <= now) {
                expired.push(claim);
            }
        }
        Ok(expired)
    }
}
