//! # Trusted Issuer Authority
//!
//! Registry of issuers and the topics each may attest. This is the single
//! authorization choke point: the claims engine checks
//! [`IssuerAuthority::is_authorized`] synchronously before every claim
//! write, never after.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokreg_core::{
    AuditOperation, ClaimTopic, IssuerId, OperatorId, RegistryError, TrustedIssuer, WalletAddress,
};
use tokreg_store::{collections, delete_or_log, get_or_miss, set_or_log};
use tokreg_store::{AuditTrail, Cache, DocumentStore};

/// Parameters for registering a trusted issuer.
#[derive(Debug, Clone)]
pub struct IssuerSpec {
    /// Display name (KYC provider, accreditation agent, ...).
    pub name: String,
    /// The issuer's own wallet address.
    pub issuer_address: WalletAddress,
    /// Topics this issuer may attest.
    pub authorized_topics: BTreeSet<ClaimTopic>,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Value,
}

/// The trusted issuer registry.
#[derive(Clone)]
pub struct IssuerAuthority {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    audit: AuditTrail,
    cache_ttl: Duration,
}

fn cache_key(id: &IssuerId) -> String {
    format!("issuer:{id}")
}

impl IssuerAuthority {
    /// Create an issuer authority over the given adapters.
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

    /// Register a trusted issuer.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the name is empty or no topics are granted.
    pub async fn add_issuer(
        &self,
        spec: IssuerSpec,
        operator: Option<OperatorId>,
    ) -> Result<TrustedIssuer, RegistryError> {
        if spec.name.trim().is_empty() {
            return Err(RegistryError::BadRequest(
                "issuer name must not be empty".to_string(),
            ));
        }
        if spec.authorized_topics.is_empty() {
            return Err(RegistryError::BadRequest(
                "issuer must be granted at least one topic".to_string(),
            ));
        }

        let issuer = TrustedIssuer {
            id: IssuerId::new(),
            name: spec.name,
            issuer_address: spec.issuer_address,
            authorized_topics: spec.authorized_topics,
            metadata: spec.metadata,
        };

        let doc = serde_json::to_value(&issuer)?;
        self.store
            .put(collections::TRUSTED_ISSUERS, &issuer.id.to_string(), doc.clone())
            .await?;
        set_or_log(&*self.cache, &cache_key(&issuer.id), doc, self.cache_ttl).await;

        self.audit
            .record_or_log(
                AuditOperation::IssuerAdd,
                &issuer.id.to_string(),
                operator,
                serde_json::json!({
                    "name": issuer.name,
                    "topics": issuer.authorized_topics,
                }),
            )
            .await;

        tracing::info!(issuer = %issuer.id, name = %issuer.name, "trusted issuer added");
        Ok(issuer)
    }

    /// Fetch an issuer by id, cache-first.
    pub async fn get_issuer(&self, id: &IssuerId) -> Result<Option<TrustedIssuer>, RegistryError> {
        let key = cache_key(id);
        if let Some(doc) = get_or_miss(&*self.cache, &key).await {
            return Ok(Some(serde_json::from_value(doc)?));
        }

        let Some(doc) = self
            .store
            .get(collections::TRUSTED_ISSUERS, &id.to_string())
            .await?
        else {
            return Ok(None);
        };
        set_or_log(&*self.cache, &key, doc.clone(), self.cache_ttl).await;
        Ok(Some(serde_json::from_value(doc)?))
    }

    /// Whether the issuer may attest the given topic.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown issuer id.
    pub async fn is_authorized(
        &self,
        id: &IssuerId,
        topic: ClaimTopic,
    ) -> Result<bool, RegistryError> {
        let issuer = self
            .get_issuer(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("issuer {id}")))?;
        Ok(issuer.is_authorized_for(topic))
    }

    /// Drop a cached issuer entry. Used by tests exercising cache coherence.
    pub async fn invalidate(&self, id: &IssuerId) {
        delete_or_log(&*self.cache, &cache_key(id)).await;
    }
}
