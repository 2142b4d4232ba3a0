//! # Record Model
//!
//! The stored entities of the compliance registry. Every record serializes
//! to a flat JSON document (ISO-8601 UTC timestamps, SCREAMING_SNAKE_CASE
//! status strings) because it crosses the store boundary as a document.
//!
//! ## Lifecycle
//!
//! - [`IdentityRecord`]: created once per address, transitions
//!   `PENDING → VERIFIED → REVOKED` (or straight to `REVOKED`); never
//!   deleted.
//! - [`ClaimRecord`]: created on issuance, mutated on renew or revoke;
//!   never physically deleted.
//! - [`AuditLogEntry`]: immutable, append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::identity::{ClaimId, IssuerId, OperatorId, SubjectId, WalletAddress};
use crate::topic::ClaimTopic;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Identity verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityStatus {
    /// Registered, verification not yet performed. The initial state.
    Pending,
    /// Verification completed; the address may pass compliance gates.
    Verified,
    /// Compliance standing withdrawn. Terminal.
    Revoked,
}

impl IdentityStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Revoked => "REVOKED",
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim lifecycle status as stored.
///
/// `Expired` is a derived state applied lazily: a claim past its
/// `expires_at` is treated as invalid at verification time even before the
/// stored status catches up. See [`crate::validity::claim_validity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Claim is current and counts toward compliance checks.
    Active,
    /// Claim was explicitly withdrawn by an operator. Terminal.
    Revoked,
    /// Claim passed its expiry; eligible for renewal.
    Expired,
}

impl ClaimStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// An issued claim: a time-bounded, issuer-attested assertion about an
/// identity, identified by topic.
///
/// Claims are independent entities queryable by topic, issuer, and status.
/// Re-issuing a topic creates a new record; the superseded one stays
/// individually queryable and auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Unique claim identifier.
    pub id: ClaimId,
    /// The identity (wallet address) this claim is about.
    pub identity_id: WalletAddress,
    /// What is being attested.
    pub topic: ClaimTopic,
    /// The trusted issuer that attested it.
    pub issuer: IssuerId,
    /// Issuer-provided attestation payload (provider references, levels).
    pub data: serde_json::Value,
    /// When the claim was issued.
    pub issued_at: DateTime<Utc>,
    /// When the claim lapses. `None` means unbounded.
    pub expires_at: Option<DateTime<Utc>>,
    /// Stored lifecycle status.
    pub status: ClaimStatus,
    /// SHA-256 hash binding identity, topic, issuer, issuance time and data.
    pub verification_hash: String,
    /// Reason recorded at revocation; cleared on renewal.
    pub revocation_reason: Option<String>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Project this claim into the denormalized reference embedded in the
    /// owning identity.
    pub fn to_reference(&self) -> ClaimReference {
        ClaimReference {
            claim_id: self.id,
            topic: self.topic,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            status: self.status,
        }
    }
}

/// Denormalized pointer to a claim, embedded in an [`IdentityRecord`] for
/// fast identity-level reads.
///
/// Kept in sync by the identity registry: one reference per topic, the most
/// recently attached one. The claims collection remains the source of truth;
/// `reconcile` rebuilds this projection from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReference {
    /// The referenced claim.
    pub claim_id: ClaimId,
    /// Topic of the referenced claim.
    pub topic: ClaimTopic,
    /// Issuance instant, copied for expiry checks without a claim lookup.
    pub issued_at: DateTime<Utc>,
    /// Expiry instant, copied for expiry checks without a claim lookup.
    pub expires_at: Option<DateTime<Utc>>,
    /// Status at the time the reference was last synced.
    pub status: ClaimStatus,
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// The compliance record bound 1:1 to a wallet address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// The wallet address. Also the document key — one record per address.
    pub address: WalletAddress,
    /// The platform subject (investor) behind this address.
    pub subject_id: SubjectId,
    /// Public identity key material bound at registration.
    pub identity_key: String,
    /// Verification status.
    pub status: IdentityStatus,
    /// Denormalized claim projection: at most one reference per topic.
    pub claims: Vec<ClaimReference>,
    /// Registration instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub last_updated_at: DateTime<Utc>,
    /// Set when the identity first enters `VERIFIED`.
    pub verified_at: Option<DateTime<Utc>>,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Value,
}

impl IdentityRecord {
    /// Look up the claim reference for a topic, if present.
    pub fn claim_for_topic(&self, topic: ClaimTopic) -> Option<&ClaimReference> {
        self.claims.iter().find(|r| r.topic == topic)
    }

    /// Attach a claim reference, replacing any prior reference for the same
    /// topic. Returns the replaced reference, if any.
    ///
    /// This is the single mutation path for the projection, which is how the
    /// no-duplicate-topics invariant holds.
    pub fn attach_claim(&mut self, reference: ClaimReference) -> Option<ClaimReference> {
        let replaced = self
            .claims
            .iter()
            .position(|r| r.topic == reference.topic)
            .map(|idx| self.claims.remove(idx));
        self.claims.push(reference);
        replaced
    }

    /// Detach the claim reference with the given claim id. Returns the
    /// removed reference, if it was present.
    pub fn detach_claim(&mut self, claim_id: ClaimId) -> Option<ClaimReference> {
        self.claims
            .iter()
            .position(|r| r.claim_id == claim_id)
            .map(|idx| self.claims.remove(idx))
    }
}

// ---------------------------------------------------------------------------
// Trusted issuers
// ---------------------------------------------------------------------------

/// A trusted issuer: an entity authorized to attest specific claim topics.
///
/// The claims engine rejects any issuance outside `authorized_topics` —
/// this record is the single authorization choke point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedIssuer {
    /// Unique issuer identifier.
    pub id: IssuerId,
    /// Display name (KYC provider, accreditation agent, ...).
    pub name: String,
    /// The issuer's own wallet address.
    pub issuer_address: WalletAddress,
    /// Topics this issuer may attest. BTreeSet for deterministic
    /// serialization.
    pub authorized_topics: BTreeSet<ClaimTopic>,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Value,
}

impl TrustedIssuer {
    /// Whether this issuer may attest the given topic.
    pub fn is_authorized_for(&self, topic: ClaimTopic) -> bool {
        self.authorized_topics.contains(&topic)
    }
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

/// Operations recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// A new identity was registered.
    IdentityRegister,
    /// An identity's status changed.
    IdentityStatusUpdate,
    /// A claim reference was attached to an identity.
    IdentityClaimAttach,
    /// A claim reference was detached from an identity.
    IdentityClaimDetach,
    /// An identity's claim projection was rebuilt from the claims collection.
    IdentityReconcile,
    /// A claim was issued.
    ClaimIssue,
    /// A claim was revoked.
    ClaimRevoke,
    /// A claim was renewed.
    ClaimRenew,
    /// A trusted issuer was added.
    IssuerAdd,
}

impl AuditOperation {
    /// Return the string representation of this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityRegister => "identity_register",
            Self::IdentityStatusUpdate => "identity_status_update",
            Self::IdentityClaimAttach => "identity_claim_attach",
            Self::IdentityClaimDetach => "identity_claim_detach",
            Self::IdentityReconcile => "identity_reconcile",
            Self::ClaimIssue => "claim_issue",
            Self::ClaimRevoke => "claim_revoke",
            Self::ClaimRenew => "claim_renew",
            Self::IssuerAdd => "issuer_add",
        }
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit trail entry.
///
/// Entries form a SHA-256 hash chain: each entry's hash covers the previous
/// entry's hash, making silent tampering detectable by a linear scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry identifier.
    pub id: Uuid,
    /// When the operation happened.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub operation: AuditOperation,
    /// The identity the operation concerned (address string, or the issuer
    /// id for issuer operations).
    pub identity_id: String,
    /// Who performed it, when known.
    pub operator_id: Option<OperatorId>,
    /// Operation-specific change payload.
    pub changes: serde_json::Value,
    /// Hash of the previous chain entry; `None` for the genesis entry.
    pub previous_hash: Option<String>,
    /// This entry's chain hash.
    pub entry_hash: String,
}
