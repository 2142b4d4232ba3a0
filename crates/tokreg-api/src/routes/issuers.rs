//! # Trusted Issuer Endpoints
//!
//! Issuer registration and lookup. Topic grants are fixed at registration;
//! widening a grant means registering a new issuer entry.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use tokreg_claims::IssuerSpec;
use tokreg_core::{ClaimTopic, IssuerId, TrustedIssuer, WalletAddress};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, operator_from_headers, Validate};
use crate::state::AppState;

/// Issuer registration request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddIssuerDto {
    /// Display name.
    pub name: String,
    /// The issuer's own wallet address.
    pub issuer_address: String,
    /// Topics this issuer may attest, e.g. `["KYC_APPROVED"]`.
    pub authorized_topics: Vec<String>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Validate for AddIssuerDto {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.authorized_topics.is_empty() {
            return Err("authorized_topics must not be empty".to_string());
        }
        Ok(())
    }
}

/// Build the issuers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/issuers", post(add_issuer))
        .route("/v1/issuers/:id", get(get_issuer))
}

/// POST /v1/issuers — Register a trusted issuer.
#[utoipa::path(
    post,
    path = "/v1/issuers",
    request_body = AddIssuerDto,
    responses(
        (status = 201, description = "Issuer registered"),
        (status = 422, description = "Unknown topic or invalid address", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub async fn add_issuer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AddIssuerDto>, JsonRejection>,
) -> Result<(StatusCode, Json<TrustedIssuer>), AppError> {
    let dto = extract_validated_json(body)?;
    let operator = operator_from_headers(&headers);

    let mut topics = std::collections::BTreeSet::new();
    for raw in &dto.authorized_topics {
        topics.insert(raw.parse::<ClaimTopic>()?);
    }

    let issuer = state
        .issuers
        .add_issuer(
            IssuerSpec {
                name: dto.name,
                issuer_address: WalletAddress::new(dto.issuer_address)?,
                authorized_topics: topics,
                metadata: dto.metadata.unwrap_or_else(|| serde_json::json!({})),
            },
            operator,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(issuer)))
}

/// GET /v1/issuers/:id — Fetch a trusted issuer.
#[utoipa::path(
    get,
    path = "/v1/issuers/{id}",
    params(("id" = String, Path, description = "Issuer id")),
    responses(
        (status = 200, description = "Issuer found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub async fn get_issuer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrustedIssuer>, AppError> {
    let id: IssuerId = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid issuer id: {id}")))?;
    state
        .issuers
        .get_issuer(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("issuer {id}")))
}
