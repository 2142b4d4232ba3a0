//! # Error Hierarchy
//!
//! Structured error types for the compliance registry, built with
//! `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! The four domain variants ([`RegistryError::NotFound`],
//! [`RegistryError::Conflict`], [`RegistryError::Forbidden`],
//! [`RegistryError::BadRequest`]) are the complete compliance taxonomy:
//! downstream reporting branches on them, so denials must map to exactly
//! one of these. Infrastructure failures (store, serialization) are
//! separate variants — a store outage is never reported as a compliance
//! decision.

use thiserror::Error;

/// Top-level error type for registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The referenced entity (identity, claim, issuer, subject) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with existing state — duplicate registration,
    /// double revocation. Not idempotent by design: the caller must know the
    /// first attempt already took effect.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller or issuer is not authorized for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request is malformed or the state transition is illegal.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Domain primitive validation failure (maps to a 400 at the API edge).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Persistent store failure, normalized from the adapter.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Document serialization failure crossing the store boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes.
///
/// Each identifier type enforces format constraints at construction time.
/// These errors carry the invalid input so operators can diagnose
/// misconfiguration without guesswork.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Wallet address is not `0x` followed by 40 hex digits.
    #[error("invalid wallet address: \"{0}\" (expected 0x + 40 hex digits)")]
    InvalidAddress(String),

    /// Claim topic string is not a member of the closed topic set.
    #[error("unknown claim topic: \"{0}\"")]
    UnknownTopic(String),

    /// Subject identifier is empty.
    #[error("invalid subject ID: must be non-empty")]
    InvalidSubjectId,

    /// Identity key is empty.
    #[error("invalid identity key: must be non-empty")]
    InvalidIdentityKey,

    /// A claim expiry lies in the past at issuance or renewal time.
    #[error("expiry \"{0}\" is in the past")]
    ExpiryInPast(String),
}

/// Errors from the persistent store adapter.
///
/// The engines normalize these to found/not-found and success/failure;
/// adapter-specific detail is preserved for diagnostics only.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// An update closure rejected the current document state. The engines
    /// map this back to the domain taxonomy (`Conflict`, `BadRequest`)
    /// at the call site; it never escapes to API callers as a store error.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The stored document could not be decoded into the expected shape.
    #[error("corrupt document in {collection}/{id}: {reason}")]
    CorruptDocument {
        /// Collection the document was read from.
        collection: String,
        /// Document key.
        id: String,
        /// Decode failure detail.
        reason: String,
    },
}

/// Errors from the cache adapter.
///
/// Cache failures never propagate to callers — reads degrade to the store,
/// writes are logged and dropped. The type exists so adapters can report
/// what went wrong.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache backend failed the operation.
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_not_found_display() {
        let err = RegistryError::NotFound("identity 0xabc".to_string());
        assert!(format!("{err}").contains("not found"));
        assert!(format!("{err}").contains("0xabc"));
    }

    #[test]
    fn registry_error_conflict_display() {
        let err = RegistryError::Conflict("identity already registered".to_string());
        assert!(format!("{err}").contains("conflict"));
    }

    #[test]
    fn registry_error_forbidden_display() {
        let err = RegistryError::Forbidden("issuer not authorized for topic".to_string());
        assert!(format!("{err}").contains("forbidden"));
    }

    #[test]
    fn registry_error_from_validation() {
        let err: RegistryError = ValidationError::InvalidSubjectId.into();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert!(format!("{err}").contains("non-empty"));
    }

    #[test]
    fn registry_error_from_store() {
        let err: RegistryError = StoreError::Backend("connection reset".to_string()).into();
        assert!(matches!(err, RegistryError::Store(_)));
        assert!(format!("{err}").contains("connection reset"));
    }

    #[test]
    fn store_error_corrupt_document_names_location() {
        let err = StoreError::CorruptDocument {
            collection: "claims".to_string(),
            id: "c-1".to_string(),
            reason: "missing field `topic`".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("claims/c-1"));
        assert!(msg.contains("topic"));
    }

    #[test]
    fn validation_error_invalid_address_carries_input() {
        let err = ValidationError::InvalidAddress("0xZZ".to_string());
        assert!(format!("{err}").contains("0xZZ"));
    }

    #[test]
    fn validation_error_unknown_topic_carries_input() {
        let err = ValidationError::UnknownTopic("VIBES_APPROVED".to_string());
        assert!(format!("{err}").contains("VIBES_APPROVED"));
    }
}
