//! # Claim Endpoints
//!
//! Issuance (composed with identity attachment), lookup, verification,
//! revocation, renewal, bulk updates, and the expired-claims sweep.
//!
//! Issuance and attachment are two writes: the claim record first, then
//! the identity's projection. A crash between the two leaves a claim the
//! projection does not see; `POST /v1/identities/:address/reconcile`
//! repairs that.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tokreg_claims::{BulkUpdateOutcome, ClaimUpdate, ClaimUpdateFailure, ClaimVerification};
use tokreg_core::{ClaimId, ClaimRecord, ClaimTopic, IssuerId, WalletAddress};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, operator_from_headers, Validate};
use crate::state::AppState;

/// Claim issuance request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueClaimDto {
    /// Wallet address of the identity the claim is about.
    pub identity_id: String,
    /// Claim topic, e.g. `KYC_APPROVED`.
    pub topic: String,
    /// Trusted issuer id.
    pub issuer: String,
    /// Issuer-provided attestation payload.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Expiry; omit for an unbounded claim.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validate for IssueClaimDto {
    fn validate(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        Ok(())
    }
}

/// Revocation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeClaimDto {
    /// Reason recorded on the claim and in the audit trail.
    pub reason: String,
}

impl Validate for RevokeClaimDto {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        Ok(())
    }
}

/// Renewal request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RenewClaimDto {
    /// New expiry; omit for an unbounded claim.
    #[serde(default)]
    pub new_expiry: Option<DateTime<Utc>>,
}

/// One item of a bulk update request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkUpdateItemDto {
    /// Revoke a claim.
    Revoke {
        /// Claim to revoke.
        claim_id: String,
        /// Revocation reason.
        reason: String,
    },
    /// Renew a claim.
    Renew {
        /// Claim to renew.
        claim_id: String,
        /// New expiry; omit for unbounded.
        #[serde(default)]
        new_expiry: Option<DateTime<Utc>>,
    },
}

/// Bulk update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateDto {
    /// Updates, applied sequentially.
    pub updates: Vec<BulkUpdateItemDto>,
}

impl Validate for BulkUpdateDto {
    fn validate(&self) -> Result<(), String> {
        if self.updates.is_empty() {
            return Err("updates must not be empty".to_string());
        }
        Ok(())
    }
}

/// Bulk update outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkUpdateResponse {
    /// Claims updated.
    #[schema(value_type = Vec<Object>)]
    pub updated: Vec<ClaimRecord>,
    /// Per-item failures.
    #[schema(value_type = Vec<Object>)]
    pub failures: Vec<ClaimUpdateFailure>,
}

impl From<BulkUpdateOutcome> for BulkUpdateResponse {
    fn from(outcome: BulkUpdateOutcome) -> Self {
        Self {
            updated: outcome.successes,
            failures: outcome.failures,
        }
    }
}

fn parse_claim_id(raw: &str) -> Result<ClaimId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid claim id: {raw}")))
}

fn parse_issuer_id(raw: &str) -> Result<IssuerId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid issuer id: {raw}")))
}

/// Build the claims router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/claims", post(issue_claim))
        .route("/v1/claims/bulk", post(bulk_update_claims))
        .route("/v1/claims/expired", get(find_expired_claims))
        .route("/v1/claims/:id", get(get_claim))
        .route("/v1/claims/:id/verify", get(verify_claim))
        .route("/v1/claims/:id/revoke", post(revoke_claim))
        .route("/v1/claims/:id/renew", post(renew_claim))
}

/// POST /v1/claims — Issue a claim and attach it to the identity.
#[utoipa::path(
    post,
    path = "/v1/claims",
    request_body = IssueClaimDto,
    responses(
        (status = 201, description = "Claim issued and attached"),
        (status = 403, description = "Issuer unknown or unauthorized for topic", body = crate::error::ErrorBody),
        (status = 404, description = "Identity not registered", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub async fn issue_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IssueClaimDto>, JsonRejection>,
) -> Result<(StatusCode, Json<ClaimRecord>), AppError> {
    let dto = extract_validated_json(body)?;
    let operator = operator_from_headers(&headers);

    let identity_id = WalletAddress::new(dto.identity_id)?;
    let topic: ClaimTopic = dto.topic.parse()?;
    let issuer = parse_issuer_id(&dto.issuer)?;

    // The identity must exist before anything is written; the issuance
    // authorization check inside the engine runs before its write too.
    if state.registry.get_identity(&identity_id).await?.is_none() {
        return Err(AppError::NotFound(format!("identity {identity_id}")));
    }

    let claim = state
        .claims
        .issue_claim(
            identity_id.clone(),
            topic,
            issuer,
            dto.data.unwrap_or_else(|| serde_json::json!({})),
            dto.expires_at,
            operator.clone(),
        )
        .await?;

    state
        .registry
        .add_claim_to_identity(&identity_id, &claim, operator)
        .await?;

    Ok((StatusCode::CREATED, Json(claim)))
}

/// GET /v1/claims/:id — Fetch a claim record.
#[utoipa::path(
    get,
    path = "/v1/claims/{id}",
    params(("id" = String, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Claim found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub async fn get_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimRecord>, AppError> {
    let id = parse_claim_id(&id)?;
    state
        .claims
        .get_claim(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("claim {id}")))
}

/// GET /v1/claims/:id/verify — Verify a claim.
#[utoipa::path(
    get,
    path = "/v1/claims/{id}/verify",
    params(("id" = String, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Verification result; unknown claims are invalid, not 404"),
    ),
    tag = "claims"
)]
pub async fn verify_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimVerification>, AppError> {
    let id = parse_claim_id(&id)?;
    let verification = state.claims.verify_claim(&id).await?;
    Ok(Json(verification))
}

/// POST /v1/claims/:id/revoke — Revoke a claim.
#[utoipa::path(
    post,
    path = "/v1/claims/{id}/revoke",
    params(("id" = String, Path, description = "Claim id")),
    request_body = RevokeClaimDto,
    responses(
        (status = 200, description = "Claim revoked"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already revoked", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub async fn revoke_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RevokeClaimDto>, JsonRejection>,
) -> Result<Json<ClaimRecord>, AppError> {
    let dto = extract_validated_json(body)?;
    let id = parse_claim_id(&id)?;
    let operator = operator_from_headers(&headers);

    let claim = state.claims.revoke_claim(&id, dto.reason, operator).await?;
    sync_projection(&state, &claim).await;
    Ok(Json(claim))
}

/// POST /v1/claims/:id/renew — Renew a claim.
#[utoipa::path(
    post,
    path = "/v1/claims/{id}/renew",
    params(("id" = String, Path, description = "Claim id")),
    request_body = RenewClaimDto,
    responses(
        (status = 200, description = "Claim renewed"),
        (status = 400, description = "Revoked claims cannot be renewed", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub async fn renew_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RenewClaimDto>, JsonRejection>,
) -> Result<Json<ClaimRecord>, AppError> {
    let dto = extract_json(body)?;
    let id = parse_claim_id(&id)?;
    let operator = operator_from_headers(&headers);

    let claim = state
        .claims
        .renew_claim(&id, dto.new_expiry, operator)
        .await?;
    sync_projection(&state, &claim).await;
    Ok(Json(claim))
}

/// POST /v1/claims/bulk — Apply a batch of revocations and renewals.
#[utoipa::path(
    post,
    path = "/v1/claims/bulk",
    request_body = BulkUpdateDto,
    responses(
        (status = 200, description = "Batch processed; failures isolated per claim", body = BulkUpdateResponse),
    ),
    tag = "claims"
)]
pub async fn bulk_update_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BulkUpdateDto>, JsonRejection>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    let dto = extract_validated_json(body)?;
    let operator = operator_from_headers(&headers);

    let mut updates = Vec::with_capacity(dto.updates.len());
    for item in dto.updates {
        updates.push(match item {
            BulkUpdateItemDto::Revoke { claim_id, reason } => ClaimUpdate::Revoke {
                claim_id: parse_claim_id(&claim_id)?,
                reason,
            },
            BulkUpdateItemDto::Renew {
                claim_id,
                new_expiry,
            } => ClaimUpdate::Renew {
                claim_id: parse_claim_id(&claim_id)?,
                new_expiry,
            },
        });
    }

    let outcome = state.claims.bulk_update_claims(updates, operator).await;
    for claim in &outcome.successes {
        sync_projection(&state, claim).await;
    }
    Ok(Json(BulkUpdateResponse::from(outcome)))
}

/// GET /v1/claims/expired — Stored-`ACTIVE` claims past their expiry.
#[utoipa::path(
    get,
    path = "/v1/claims/expired",
    responses(
        (status = 200, description = "Claims awaiting expiry convergence"),
    ),
    tag = "claims"
)]
pub async fn find_expired_claims(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClaimRecord>>, AppError> {
    let expired = state.claims.find_expired_claims().await?;
    Ok(Json(expired))
}

/// Refresh the owning identity's claim reference after a claim mutation,
/// so identity-level reads see the new status without a claim lookup.
///
/// Only the reference pointing at this exact claim is replaced — a newer
/// claim for the same topic is never clobbered. Best-effort: projection
/// staleness is repairable via reconcile and must not fail the mutation.
async fn sync_projection(state: &AppState, claim: &ClaimRecord) {
    let current = match state.registry.get_identity(&claim.identity_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(claim = %claim.id, error = %e, "projection sync read failed");
            return;
        }
    };
    let points_here = current
        .claim_for_topic(claim.topic)
        .is_some_and(|r| r.claim_id == claim.id);
    if !points_here {
        return;
    }
    if let Err(e) = state
        .registry
        .add_claim_to_identity(&claim.identity_id, claim, None)
        .await
    {
        tracing::warn!(claim = %claim.id, error = %e, "projection sync failed; reconcile will repair");
    }
}
