//! # Custom Extractors & Validation
//!
//! [`Validate`] trait for request DTOs, JSON extraction helpers, and the
//! operator-attribution header used by the audit trail.

use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::Json;

use tokreg_core::OperatorId;

use crate::error::AppError;

/// Header naming the operator performing a mutation, recorded in the
/// audit trail. Optional; absent for anonymous service-to-service calls.
pub const OPERATOR_HEADER: &str = "x-operator-id";

/// Trait for request types that validate business rules beyond what serde
/// deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to
/// [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Read the operator attribution header, if present and valid UTF-8.
pub fn operator_from_headers(headers: &HeaderMap) -> Option<OperatorId> {
    headers
        .get(OPERATOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(OperatorId::new)
}
