//! # Verification Hashes
//!
//! SHA-256 helpers for claim verification hashes and the audit hash chain.
//! Hash inputs are pipe-delimited canonical fields; JSON payloads are
//! serialized with `serde_json`, whose object keys are sorted, so the same
//! logical document always hashes to the same digest.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::identity::{IssuerId, WalletAddress};
use crate::topic::ClaimTopic;

/// Compute the lowercase hex SHA-256 digest of the input bytes.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compute the verification hash bound to an issued claim.
///
/// Covers the identity, topic, issuer, issuance instant, and attested data.
/// Any later mutation of these fields is detectable by recomputing the hash.
pub fn verification_hash(
    identity: &WalletAddress,
    topic: ClaimTopic,
    issuer: &IssuerId,
    issued_at: DateTime<Utc>,
    data: &serde_json::Value,
) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}",
        identity,
        topic,
        issuer,
        issued_at.to_rfc3339(),
        data,
    );
    sha256_hex(input.as_bytes())
}
