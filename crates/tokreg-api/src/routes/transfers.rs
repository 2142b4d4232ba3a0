//! # Transfer Eligibility Endpoint
//!
//! The pre-settlement gate consulted by the token module. Always answers
//! 200 with a decision — an ineligible transfer is a diagnostic, never an
//! HTTP error.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use tokreg_core::WalletAddress;
use tokreg_registry::TransferDecision;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Transfer eligibility request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckTransferDto {
    /// Sending wallet address.
    pub from: String,
    /// Receiving wallet address.
    pub to: String,
}

/// Build the transfers router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/transfers/check", post(check_transfer))
}

/// POST /v1/transfers/check — Decide whether a transfer may proceed.
#[utoipa::path(
    post,
    path = "/v1/transfers/check",
    request_body = CheckTransferDto,
    responses(
        (status = 200, description = "Decision with denial side and reason when ineligible"),
    ),
    tag = "transfers"
)]
pub async fn check_transfer(
    State(state): State<AppState>,
    body: Result<Json<CheckTransferDto>, JsonRejection>,
) -> Result<Json<TransferDecision>, AppError> {
    let dto = extract_json(body)?;
    let sender = WalletAddress::new(dto.from)?;
    let receiver = WalletAddress::new(dto.to)?;
    let decision = state.verifier.check_transfer(&sender, &receiver).await?;
    Ok(Json(decision))
}
