//! # Audit Trail Endpoints
//!
//! Read-only queries over the hash-chained audit log: per-identity
//! history and whole-chain integrity verification.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use tokreg_core::{AuditLogEntry, WalletAddress};
use tokreg_store::ChainIntegrity;

use crate::error::AppError;
use crate::state::AppState;

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit/identities/:address", get(identity_history))
        .route("/v1/audit/integrity", get(chain_integrity))
}

/// GET /v1/audit/identities/:address — Audit entries for one identity,
/// in chain order.
#[utoipa::path(
    get,
    path = "/v1/audit/identities/{address}",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Audit entries, oldest first"),
    ),
    tag = "audit"
)]
pub async fn identity_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let address = WalletAddress::new(address)?;
    let entries = state
        .audit
        .entries_for_identity(address.as_str())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(entries))
}

/// GET /v1/audit/integrity — Verify hash continuity over the whole chain.
#[utoipa::path(
    get,
    path = "/v1/audit/integrity",
    responses(
        (status = 200, description = "Chain integrity report"),
    ),
    tag = "audit"
)]
pub async fn chain_integrity(
    State(state): State<AppState>,
) -> Result<Json<ChainIntegrity>, AppError> {
    let integrity = state
        .audit
        .verify_chain()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(integrity))
}
