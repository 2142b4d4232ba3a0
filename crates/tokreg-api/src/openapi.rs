//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tokreg — Identity & Claims Compliance Registry",
        version = "0.3.0",
        description = "Compliance gating for tokenized investment transfers: identity lifecycle, issuer-gated claims, transfer eligibility, and a hash-chained audit trail.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Identities
        crate::routes::identities::register_identity,
        crate::routes::identities::batch_register_identities,
        crate::routes::identities::get_identity,
        crate::routes::identities::verify_identity,
        crate::routes::identities::update_status,
        crate::routes::identities::detach_claim,
        crate::routes::identities::reconcile,
        // Claims
        crate::routes::claims::issue_claim,
        crate::routes::claims::bulk_update_claims,
        crate::routes::claims::find_expired_claims,
        crate::routes::claims::get_claim,
        crate::routes::claims::verify_claim,
        crate::routes::claims::revoke_claim,
        crate::routes::claims::renew_claim,
        // Issuers
        crate::routes::issuers::add_issuer,
        crate::routes::issuers::get_issuer,
        // Transfers
        crate::routes::transfers::check_transfer,
        // Audit
        crate::routes::audit::identity_history,
        crate::routes::audit::chain_integrity,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Identity DTOs
        crate::routes::identities::RegisterIdentityDto,
        crate::routes::identities::BatchRegisterDto,
        crate::routes::identities::BatchRegisterResponse,
        crate::routes::identities::UpdateStatusDto,
        // Claim DTOs
        crate::routes::claims::IssueClaimDto,
        crate::routes::claims::RevokeClaimDto,
        crate::routes::claims::RenewClaimDto,
        crate::routes::claims::BulkUpdateItemDto,
        crate::routes::claims::BulkUpdateDto,
        crate::routes::claims::BulkUpdateResponse,
        // Issuer DTOs
        crate::routes::issuers::AddIssuerDto,
        // Transfer DTOs
        crate::routes::transfers::CheckTransferDto,
    )),
    tags(
        (name = "identities", description = "Identity lifecycle and verification"),
        (name = "claims", description = "Claim issuance, verification, revocation, renewal"),
        (name = "issuers", description = "Trusted issuer registry"),
        (name = "transfers", description = "Transfer eligibility gate"),
        (name = "audit", description = "Hash-chained audit trail"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
