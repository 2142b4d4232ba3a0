#![deny(missing_docs)]

//! # tokreg-claims — Claims Engine & Trusted Issuer Authority
//!
//! Claim lifecycle for the compliance registry: issuance (gated by the
//! [`IssuerAuthority`]), verification with lazy expiry correction,
//! revocation (terminal), renewal, sequential bulk updates with isolated
//! per-item failures, and the required-claims check the transfer gate
//! builds on.
//!
//! ## Write discipline
//!
//! Every mutation writes through to the store first, then refreshes or
//! invalidates the cache entry, then appends an audit event. Audit appends
//! are fire-and-forget; cache failures degrade to store reads. Neither can
//! fail a primary operation.

pub mod engine;
pub mod issuers;

pub use engine::{
    BulkUpdateOutcome, ClaimUpdate, ClaimUpdateFailure, ClaimVerification, ClaimsEngine,
};
pub use issuers::{IssuerAuthority, IssuerSpec};
