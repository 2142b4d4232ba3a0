#![deny(missing_docs)]

//! # tokreg-core — Foundational Types for the Compliance Registry
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass an [`IssuerId`] where a
//!    [`WalletAddress`] is expected.
//!
//! 2. **Closed [`ClaimTopic`] enum.** One definition, exhaustive `match`
//!    everywhere. Unknown topic strings are rejected at the boundary, not
//!    stored as free text that can diverge.
//!
//! 3. **Claim validity is a pure function.** [`claim_validity`] evaluates
//!    `(status, expires_at, now)` with no I/O. The stored `EXPIRED` status
//!    is a lazily-written hint, never the source of truth.
//!
//! 4. **[`RegistryError`] hierarchy.** Structured errors with `thiserror` —
//!    no `Box<dyn Error>`, no `.unwrap()` outside tests. Every compliance
//!    denial carries a machine-distinguishable reason.

pub mod digest;
pub mod error;
pub mod identity;
pub mod record;
pub mod topic;
pub mod validity;

// Re-export primary types at crate root for ergonomic imports.
pub use digest::{sha256_hex, verification_hash};
pub use error::{CacheError, RegistryError, StoreError, ValidationError};
pub use identity::{ClaimId, IssuerId, OperatorId, SubjectId, WalletAddress};
pub use record::{
    AuditLogEntry, AuditOperation, ClaimRecord, ClaimReference, ClaimStatus, IdentityRecord,
    IdentityStatus, TrustedIssuer,
};
pub use topic::ClaimTopic;
pub use validity::{claim_validity, ClaimValidity, InvalidClaimReason};
