//! # tokreg-api — Axum API for the Compliance Registry
//!
//! HTTP surface over the registry engines: identity lifecycle, issuer-gated
//! claim operations, the two-party transfer eligibility gate, and read-only
//! audit queries.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                  | Domain                  |
//! |------------------------|-------------------------|-------------------------|
//! | `/v1/identities/*`     | [`routes::identities`]  | Identity lifecycle      |
//! | `/v1/claims/*`         | [`routes::claims`]      | Claim lifecycle         |
//! | `/v1/issuers/*`        | [`routes::issuers`]     | Trusted issuers         |
//! | `/v1/transfers/check`  | [`routes::transfers`]   | Transfer gate           |
//! | `/v1/audit/*`          | [`routes::audit`]       | Audit trail             |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Auto-generated spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::identities::router())
        .merge(routes::claims::router())
        .merge(routes::issuers::router())
        .merge(routes::transfers::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
