//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Holds the three engines (identity registry,
//! claims, trusted issuers), the transfer eligibility verifier, and the
//! audit trail — all over one shared [`DocumentStore`] and [`Cache`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokreg_claims::{ClaimsEngine, IssuerAuthority};
use tokreg_core::{ClaimTopic, WalletAddress};
use tokreg_registry::{EligibilityVerifier, IdentityRegistry};
use tokreg_store::{AuditTrail, Cache, DocumentStore, MemoryCache, MemoryStore};

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage
/// in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// TTL for cached identity, claim, and issuer documents.
    pub cache_ttl: Duration,
    /// Claim topics both parties of a transfer must hold.
    pub required_topics: Vec<ClaimTopic>,
    /// Platform addresses (mint, burn, treasury) bypassing their side of
    /// the transfer check.
    pub privileged_addresses: BTreeSet<WalletAddress>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl", &self.cache_ttl)
            .field("required_topics", &self.required_topics)
            .field("privileged_addresses", &self.privileged_addresses)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            cache_ttl: Duration::from_secs(300),
            required_topics: vec![ClaimTopic::KycApproved],
            privileged_addresses: BTreeSet::new(),
        }
    }
}

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly: every component is `Arc`-backed internally.
#[derive(Clone)]
pub struct AppState {
    /// Identity lifecycle and claim projection.
    pub registry: IdentityRegistry,
    /// Claim issuance, verification, revocation, renewal.
    pub claims: ClaimsEngine,
    /// Trusted issuer registry.
    pub issuers: Arc<IssuerAuthority>,
    /// Two-party transfer eligibility gate.
    pub verifier: EligibilityVerifier,
    /// Hash-chained audit trail, shared by all engines.
    pub audit: AuditTrail,
    /// Application configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assemble the engines over the given store and cache backends.
    pub fn with_backends(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        let audit = AuditTrail::new(store.clone());
        let issuers = Arc::new(IssuerAuthority::new(
            store.clone(),
            cache.clone(),
            audit.clone(),
            config.cache_ttl,
        ));
        let claims = ClaimsEngine::new(
            store.clone(),
            cache.clone(),
            audit.clone(),
            issuers.clone(),
            config.cache_ttl,
        );
        let registry = IdentityRegistry::new(store, cache, audit.clone(), config.cache_ttl);
        let verifier = EligibilityVerifier::new(
            registry.clone(),
            config.required_topics.clone(),
            config.privileged_addresses.clone(),
        );

        Self {
            registry,
            claims,
            issuers,
            verifier,
            audit,
            config,
        }
    }

    /// In-memory state for development, tests, and single-node deployments.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
        )
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
