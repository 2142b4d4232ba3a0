//! # Identity Endpoints
//!
//! Registration (single and batch), lookup, verification diagnostics,
//! status lifecycle, claim detachment, and projection reconciliation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tokreg_core::{ClaimId, ClaimTopic, IdentityRecord, IdentityStatus, SubjectId, WalletAddress};
use tokreg_registry::{BatchRegistrationFailure, RegisterIdentityRequest};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, operator_from_headers, Validate};
use crate::state::AppState;

/// Identity registration request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterIdentityDto {
    /// Wallet address: `0x` followed by 40 hex digits.
    pub address: String,
    /// Existing platform subject behind the address.
    pub subject_id: String,
    /// Public identity key material.
    pub identity_key: String,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Validate for RegisterIdentityDto {
    fn validate(&self) -> Result<(), String> {
        if self.identity_key.trim().is_empty() {
            return Err("identity_key must not be empty".to_string());
        }
        Ok(())
    }
}

impl RegisterIdentityDto {
    fn into_request(self) -> Result<RegisterIdentityRequest, AppError> {
        Ok(RegisterIdentityRequest {
            address: WalletAddress::new(self.address)?,
            subject_id: SubjectId::new(self.subject_id)?,
            identity_key: self.identity_key,
            metadata: self.metadata.unwrap_or_else(|| serde_json::json!({})),
        })
    }
}

/// Batch registration request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchRegisterDto {
    /// Identities to register.
    pub identities: Vec<RegisterIdentityDto>,
}

impl Validate for BatchRegisterDto {
    fn validate(&self) -> Result<(), String> {
        if self.identities.is_empty() {
            return Err("identities must not be empty".to_string());
        }
        if self.identities.len() > 1000 {
            return Err("at most 1000 identities per batch".to_string());
        }
        Ok(())
    }
}

/// Batch registration outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchRegisterResponse {
    /// Identities registered.
    #[schema(value_type = Vec<Object>)]
    pub registered: Vec<IdentityRecord>,
    /// Per-address failures, in input order.
    #[schema(value_type = Vec<Object>)]
    pub failures: Vec<BatchRegistrationFailure>,
}

/// Status update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusDto {
    /// Target status: `PENDING`, `VERIFIED`, or `REVOKED`.
    pub status: String,
}

/// Query parameters for identity verification.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    /// Comma-separated required topics; defaults to `KYC_APPROVED`.
    pub topics: Option<String>,
}

fn parse_topics(params: &VerifyParams) -> Result<Vec<ClaimTopic>, AppError> {
    match &params.topics {
        None => Ok(vec![ClaimTopic::KycApproved]),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ClaimTopic>().map_err(AppError::from))
            .collect(),
    }
}

fn parse_address(raw: &str) -> Result<WalletAddress, AppError> {
    Ok(WalletAddress::new(raw)?)
}

fn parse_status(raw: &str) -> Result<IdentityStatus, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| AppError::BadRequest(format!("unknown identity status: {raw}")))
}

/// Build the identities router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/identities", post(register_identity))
        .route("/v1/identities/batch", post(batch_register_identities))
        .route("/v1/identities/:address", get(get_identity))
        .route("/v1/identities/:address/verify", get(verify_identity))
        .route("/v1/identities/:address/status", put(update_status))
        .route(
            "/v1/identities/:address/claims/:claim_id",
            axum::routing::delete(detach_claim),
        )
        .route("/v1/identities/:address/reconcile", post(reconcile))
}

/// POST /v1/identities — Register an identity.
#[utoipa::path(
    post,
    path = "/v1/identities",
    request_body = RegisterIdentityDto,
    responses(
        (status = 201, description = "Identity registered"),
        (status = 404, description = "Subject not found", body = crate::error::ErrorBody),
        (status = 409, description = "Address already registered", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub async fn register_identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterIdentityDto>, JsonRejection>,
) -> Result<(StatusCode, Json<IdentityRecord>), AppError> {
    let dto = extract_validated_json(body)?;
    let operator = operator_from_headers(&headers);
    let record = state
        .registry
        .register_identity(dto.into_request()?, operator)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /v1/identities/batch — Register a batch of identities.
#[utoipa::path(
    post,
    path = "/v1/identities/batch",
    request_body = BatchRegisterDto,
    responses(
        (status = 200, description = "Batch processed; failures isolated per address", body = BatchRegisterResponse),
    ),
    tag = "identities"
)]
pub async fn batch_register_identities(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BatchRegisterDto>, JsonRejection>,
) -> Result<Json<BatchRegisterResponse>, AppError> {
    let dto = extract_validated_json(body)?;
    let operator = operator_from_headers(&headers);

    let mut requests = Vec::with_capacity(dto.identities.len());
    for item in dto.identities {
        requests.push(item.into_request()?);
    }

    let outcome = state
        .registry
        .batch_register_identities(requests, operator)
        .await;
    Ok(Json(BatchRegisterResponse {
        registered: outcome.successes,
        failures: outcome.failures,
    }))
}

/// GET /v1/identities/:address — Fetch an identity record.
#[utoipa::path(
    get,
    path = "/v1/identities/{address}",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Identity found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub async fn get_identity(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<IdentityRecord>, AppError> {
    let address = parse_address(&address)?;
    state
        .registry
        .get_identity(&address)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("identity {address}")))
}

/// GET /v1/identities/:address/verify — Verification diagnostics.
#[utoipa::path(
    get,
    path = "/v1/identities/{address}/verify",
    params(
        ("address" = String, Path, description = "Wallet address"),
        ("topics" = Option<String>, Query, description = "Comma-separated required topics"),
    ),
    responses(
        (status = 200, description = "Diagnostics with missing and expired topics; an unregistered address is not-verified, not 404"),
    ),
    tag = "identities"
)]
pub async fn verify_identity(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<tokreg_registry::IdentityVerification>, AppError> {
    let address = parse_address(&address)?;
    let topics = parse_topics(&params)?;
    let verification = state.registry.verify_identity(&address, &topics).await?;
    Ok(Json(verification))
}

/// PUT /v1/identities/:address/status — Transition identity status.
#[utoipa::path(
    put,
    path = "/v1/identities/{address}/status",
    params(("address" = String, Path, description = "Wallet address")),
    request_body = UpdateStatusDto,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Revocation is terminal", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateStatusDto>, JsonRejection>,
) -> Result<Json<IdentityRecord>, AppError> {
    let dto = extract_json(body)?;
    let address = parse_address(&address)?;
    let status = parse_status(&dto.status)?;
    let operator = operator_from_headers(&headers);
    let record = state
        .registry
        .update_identity_status(&address, status, operator)
        .await?;
    Ok(Json(record))
}

/// DELETE /v1/identities/:address/claims/:claim_id — Detach a claim
/// reference from the identity's projection.
#[utoipa::path(
    delete,
    path = "/v1/identities/{address}/claims/{claim_id}",
    params(
        ("address" = String, Path, description = "Wallet address"),
        ("claim_id" = String, Path, description = "Claim id"),
    ),
    responses(
        (status = 200, description = "Claim detached"),
        (status = 404, description = "Identity or attachment not found", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub async fn detach_claim(
    State(state): State<AppState>,
    Path((address, claim_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<IdentityRecord>, AppError> {
    let address = parse_address(&address)?;
    let claim_id: ClaimId = claim_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid claim id: {claim_id}")))?;
    let operator = operator_from_headers(&headers);
    let record = state
        .registry
        .remove_claim_from_identity(&address, claim_id, operator)
        .await?;
    Ok(Json(record))
}

/// POST /v1/identities/:address/reconcile — Rebuild the claim projection
/// from the claims collection.
#[utoipa::path(
    post,
    path = "/v1/identities/{address}/reconcile",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Projection rebuilt"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub async fn reconcile(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IdentityRecord>, AppError> {
    let address = parse_address(&address)?;
    let operator = operator_from_headers(&headers);
    let record = state.registry.reconcile(&address, operator).await?;
    Ok(Json(record))
}
