#![deny(missing_docs)]

//! # tokreg-registry — Identity Registry & Transfer Eligibility
//!
//! The identity side of the compliance registry: one [`IdentityRecord`]
//! per wallet address, keyed by the address itself, carrying a
//! denormalized projection of the claims attached to it.
//!
//! [`IdentityRegistry`] owns the identity lifecycle
//! (`PENDING → VERIFIED → REVOKED`, revocation terminal), the claim
//! projection (at most one reference per topic), batch onboarding, and
//! [`IdentityRegistry::reconcile`], which rebuilds a drifted projection
//! from the claims collection.
//!
//! [`EligibilityVerifier`] is the two-party transfer gate: both sides must
//! be `VERIFIED` and hold every required claim, except for privileged
//! platform addresses (mint, burn, treasury), which bypass their own side
//! of the check. Its decisions are diagnostics, not errors — an ineligible
//! transfer is a normal answer, not a failure.
//!
//! [`IdentityRecord`]: tokreg_core::IdentityRecord

pub mod registry;
pub mod verifier;

pub use registry::{
    BatchRegistrationFailure, BatchRegistrationOutcome, IdentityRegistry, IdentityVerification,
    RegisterIdentityRequest,
};
pub use verifier::{EligibilityVerifier, TransferDecision, TransferSide};
