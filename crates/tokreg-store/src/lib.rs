#![deny(missing_docs)]

//! # tokreg-store — Storage Adapters for the Compliance Registry
//!
//! The registry engines speak two narrow interfaces:
//!
//! - [`DocumentStore`]: durable, keyed JSON documents plus append-only
//!   collections. Single-document atomic read-modify-write via
//!   [`DocumentStore::update`] is the only atomicity the system relies on;
//!   there is deliberately no cross-document transaction.
//! - [`Cache`]: read-through key/value cache with TTL and explicit
//!   invalidation. The cache is an optimization, never a correctness
//!   dependency — every implementation failure degrades to a store read.
//!
//! Two `DocumentStore` backends ship here: [`MemoryStore`] (tests,
//! development, single-node deployments) and [`PgStore`] (Postgres via
//! `sqlx`). [`AuditTrail`] layers a SHA-256 hash-chained, append-only
//! event log on top of any `DocumentStore`.

pub mod audit;
pub mod cache;
pub mod document;
pub mod memory;
pub mod postgres;

pub use audit::{AuditTrail, ChainIntegrity};
pub use cache::{delete_or_log, get_or_miss, set_or_log, Cache, MemoryCache};
pub use document::{Document, DocumentStore, Query, UpdateFn};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Collection names used by the registry.
///
/// Centralized so the engines and any operational tooling agree on the
/// document layout.
pub mod collections {
    /// Identity records, keyed by wallet address.
    pub const IDENTITIES: &str = "identities";
    /// Claim records, keyed by claim id.
    pub const CLAIMS: &str = "claims";
    /// Trusted issuers, keyed by issuer id.
    pub const TRUSTED_ISSUERS: &str = "trusted_issuers";
    /// Platform subjects (owned by onboarding; the registry only reads).
    pub const SUBJECTS: &str = "subjects";
    /// Append-only audit trail.
    pub const AUDIT_LOG: &str = "audit_log";
}
