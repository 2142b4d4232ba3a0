//! # API Contract
//!
//! Exercises the HTTP surface end to end: success paths, every error
//! family (400/401/403/404/409/422), the bearer-token middleware, the
//! transfer gate, and the audit endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use tokreg_api::state::{AppConfig, AppState};
use tokreg_store::{collections, DocumentStore, MemoryCache, MemoryStore};

/// Build a test app with auth disabled, returning the shared store so
/// tests can seed the subjects collection the onboarding module owns.
fn test_app() -> (axum::Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_backends(
        AppConfig::default(),
        store.clone(),
        Arc::new(MemoryCache::new()),
    );
    (tokreg_api::app(state), store)
}

/// Build a test app with auth enabled.
fn authed_app(token: &str) -> axum::Router {
    let config = AppConfig {
        auth_token: Some(token.to_string()),
        ..AppConfig::default()
    };
    tokreg_api::app(AppState::in_memory(config))
}

/// Read the response body as a JSON value.
async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// POST helper with a JSON body.
fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// PUT helper with a JSON body.
fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// GET helper.
fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn addr(n: u64) -> String {
    format!("0x{n:040x}")
}

async fn seed_subject(store: &MemoryStore, subject: &str, address: &str) {
    store
        .put(
            collections::SUBJECTS,
            subject,
            json!({"wallet_address": address}),
        )
        .await
        .unwrap();
}

/// Register an identity over HTTP, asserting 201.
async fn register(app: &axum::Router, store: &MemoryStore, address: &str, subject: &str) {
    seed_subject(store, subject, address).await;
    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": address, "subject_id": subject, "identity_key": "pk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

/// Register a KYC issuer over HTTP and return its id.
async fn register_issuer(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/issuers",
            json!({
                "name": "Acme KYC",
                "issuer_address": addr(0x1111),
                "authorized_topics": ["KYC_APPROVED", "AML_CLEARED"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_string()
}

/// Issue a claim over HTTP and return its id.
async fn issue_claim(app: &axum::Router, address: &str, issuer: &str) -> String {
    let resp = app
        .clone()
        .oneshot(post_json(
            "/v1/claims",
            json!({"identity_id": address, "topic": "KYC_APPROVED", "issuer": issuer}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_string()
}

/// Onboard an identity to VERIFIED with an active KYC claim.
async fn onboard(app: &axum::Router, store: &MemoryStore, address: &str, subject: &str, issuer: &str) {
    register(app, store, address, subject).await;
    issue_claim(app, address, issuer).await;
    let resp = app
        .clone()
        .oneshot(put_json(
            &format!("/v1/identities/{address}/status"),
            json!({"status": "VERIFIED"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// =========================================================================
// Health and OpenAPI
// =========================================================================

#[tokio::test]
async fn liveness_is_open() {
    let (app, _) = test_app();
    let resp = app.oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let (app, _) = test_app();
    let resp = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert!(v["info"]["title"].as_str().unwrap().contains("Tokreg"));
    assert!(v["paths"].get("/v1/transfers/check").is_some());
}

// =========================================================================
// Auth middleware
// =========================================================================

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = authed_app("secret-token");
    let resp = app.oneshot(get("/v1/claims/expired")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let app = authed_app("secret-token");
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/claims/expired")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_token_is_accepted() {
    let app = authed_app("secret-token");
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/v1/claims/expired")
                .header("authorization", "Bearer secret-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_bypasses_auth() {
    let app = authed_app("secret-token");
    let resp = app.oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// =========================================================================
// Identity registration
// =========================================================================

#[tokio::test]
async fn register_normalizes_address_case() {
    let (app, store) = test_app();
    seed_subject(&store, "inv-1", &addr(0xAB)).await;
    let mixed = addr(0xAB).replace("ab", "AB");
    let resp = app
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": mixed, "subject_id": "inv-1", "identity_key": "pk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let v = body_json(resp).await;
    assert_eq!(v["address"].as_str().unwrap(), addr(0xAB));
    assert_eq!(v["status"].as_str().unwrap(), "PENDING");
}

#[tokio::test]
async fn register_unknown_subject_is_404() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": addr(1), "subject_id": "ghost", "identity_key": "pk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"].as_str().unwrap(), "NOT_FOUND");
}

#[tokio::test]
async fn duplicate_registration_is_409() {
    let (app, store) = test_app();
    register(&app, &store, &addr(2), "inv-2").await;
    let resp = app
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": addr(2), "subject_id": "inv-2", "identity_key": "pk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"].as_str().unwrap(), "CONFLICT");
}

#[tokio::test]
async fn malformed_address_is_422() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": "0xnothex", "subject_id": "inv-1", "identity_key": "pk-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"].as_str().unwrap(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn empty_identity_key_is_422() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(post_json(
            "/v1/identities",
            json!({"address": addr(3), "subject_id": "inv-3", "identity_key": "  "}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/identities")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_status_value_is_400() {
    let (app, store) = test_app();
    register(&app, &store, &addr(4), "inv-4").await;
    let resp = app
        .oneshot(put_json(
            &format!("/v1/identities/{}/status", addr(4)),
            json!({"status": "FROZEN"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_registration_reports_partial_failure() {
    let (app, store) = test_app();
    seed_subject(&store, "inv-10", &addr(10)).await;
    seed_subject(&store, "inv-12", &addr(12)).await;
    let resp = app
        .oneshot(post_json(
            "/v1/identities/batch",
            json!({"identities": [
                {"address": addr(10), "subject_id": "inv-10", "identity_key": "pk"},
                {"address": addr(11), "subject_id": "inv-11", "identity_key": "pk"},
                {"address": addr(12), "subject_id": "inv-12", "identity_key": "pk"},
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["registered"].as_array().unwrap().len(), 2);
    let failures = v["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["address"].as_str().unwrap(), addr(11));
}

// =========================================================================
// Claims
// =========================================================================

#[tokio::test]
async fn issue_to_unregistered_identity_is_404() {
    let (app, _) = test_app();
    let issuer = register_issuer(&app).await;
    let resp = app
        .oneshot(post_json(
            "/v1/claims",
            json!({"identity_id": addr(20), "topic": "KYC_APPROVED", "issuer": issuer}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_issuer_is_403() {
    let (app, store) = test_app();
    register(&app, &store, &addr(21), "inv-21").await;
    let resp = app
        .oneshot(post_json(
            "/v1/claims",
            json!({
                "identity_id": addr(21),
                "topic": "KYC_APPROVED",
                "issuer": uuid::Uuid::new_v4().to_string(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"].as_str().unwrap(), "FORBIDDEN");
}

#[tokio::test]
async fn issuer_unauthorized_for_topic_is_403() {
    let (app, store) = test_app();
    register(&app, &store, &addr(22), "inv-22").await;
    let issuer = register_issuer(&app).await;
    let resp = app
        .oneshot(post_json(
            "/v1/claims",
            json!({"identity_id": addr(22), "topic": "COUNTRY_WHITELISTED", "issuer": issuer}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn issued_claim_is_attached_and_verifiable() {
    let (app, store) = test_app();
    register(&app, &store, &addr(23), "inv-23").await;
    let issuer = register_issuer(&app).await;
    let claim_id = issue_claim(&app, &addr(23), &issuer).await;

    let resp = app
        .clone()
        .oneshot(get(&format!("/v1/claims/{claim_id}/verify")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["is_valid"], json!(true));

    let resp = app
        .oneshot(get(&format!("/v1/identities/{}", addr(23))))
        .await
        .unwrap();
    let v = body_json(resp).await;
    let claims = v["claims"].as_array().unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0]["claim_id"].as_str().unwrap(), claim_id);
}

#[tokio::test]
async fn verify_unknown_claim_is_200_invalid() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(get(&format!(
            "/v1/claims/{}/verify",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["is_valid"], json!(false));
    assert_eq!(v["reason"].as_str().unwrap(), "Claim not found");
}

#[tokio::test]
async fn double_revocation_is_409() {
    let (app, store) = test_app();
    register(&app, &store, &addr(24), "inv-24").await;
    let issuer = register_issuer(&app).await;
    let claim_id = issue_claim(&app, &addr(24), &issuer).await;

    let uri = format!("/v1/claims/{claim_id}/revoke");
    let resp = app
        .clone()
        .oneshot(post_json(&uri, json!({"reason": "fraud"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(post_json(&uri, json!({"reason": "again"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn renewing_revoked_claim_is_400() {
    let (app, store) = test_app();
    register(&app, &store, &addr(25), "inv-25").await;
    let issuer = register_issuer(&app).await;
    let claim_id = issue_claim(&app, &addr(25), &issuer).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/claims/{claim_id}/revoke"),
            json!({"reason": "fraud"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(post_json(&format!("/v1/claims/{claim_id}/renew"), json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_update_isolates_failures() {
    let (app, store) = test_app();
    register(&app, &store, &addr(26), "inv-26").await;
    let issuer = register_issuer(&app).await;
    let claim_id = issue_claim(&app, &addr(26), &issuer).await;

    let resp = app
        .oneshot(post_json(
            "/v1/claims/bulk",
            json!({"updates": [
                {"action": "revoke", "claim_id": claim_id, "reason": "fraud"},
                {"action": "renew", "claim_id": uuid::Uuid::new_v4().to_string()},
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["updated"].as_array().unwrap().len(), 1);
    assert_eq!(v["failures"].as_array().unwrap().len(), 1);
}

// =========================================================================
// Transfer gate
// =========================================================================

#[tokio::test]
async fn transfer_between_verified_parties_is_eligible() {
    let (app, store) = test_app();
    let issuer = register_issuer(&app).await;
    onboard(&app, &store, &addr(30), "inv-30", &issuer).await;
    onboard(&app, &store, &addr(31), "inv-31", &issuer).await;

    let resp = app
        .oneshot(post_json(
            "/v1/transfers/check",
            json!({"from": addr(30), "to": addr(31)}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v, json!({"eligible": true}));
}

#[tokio::test]
async fn revocation_over_http_blocks_transfer_immediately() {
    let (app, store) = test_app();
    let issuer = register_issuer(&app).await;
    onboard(&app, &store, &addr(32), "inv-32", &issuer).await;
    onboard(&app, &store, &addr(33), "inv-33", &issuer).await;

    // The revoke handler refreshes the sender's projection, so the gate
    // sees the revocation without a reconcile.
    let resp = app
        .clone()
        .oneshot(get(&format!("/v1/identities/{}", addr(32))))
        .await
        .unwrap();
    let claim_id = body_json(resp).await["claims"][0]["claim_id"]
        .as_str()
        .unwrap()
        .to_string();
    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/claims/{claim_id}/revoke"),
            json!({"reason": "sanctions hit"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(post_json(
            "/v1/transfers/check",
            json!({"from": addr(32), "to": addr(33)}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["eligible"], json!(false));
    assert_eq!(v["side"].as_str().unwrap(), "sender");
    assert_eq!(
        v["reason"].as_str().unwrap(),
        "sender claim KYC_APPROVED is revoked"
    );
}

#[tokio::test]
async fn transfer_check_rejects_malformed_addresses() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(post_json(
            "/v1/transfers/check",
            json!({"from": "not-an-address", "to": addr(1)}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transfer_check_get_is_method_not_allowed() {
    let (app, _) = test_app();
    let resp = app.oneshot(get("/v1/transfers/check")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =========================================================================
// Identity verification diagnostics
// =========================================================================

#[tokio::test]
async fn verify_reports_missing_topics() {
    let (app, store) = test_app();
    let issuer = register_issuer(&app).await;
    onboard(&app, &store, &addr(40), "inv-40", &issuer).await;

    let resp = app
        .oneshot(get(&format!(
            "/v1/identities/{}/verify?topics=KYC_APPROVED,AML_CLEARED",
            addr(40)
        )))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["is_verified"], json!(false));
    assert_eq!(v["missing_claims"], json!(["AML_CLEARED"]));
}

#[tokio::test]
async fn verify_unregistered_address_is_not_verified_not_404() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(get(&format!("/v1/identities/{}/verify", addr(42))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["is_verified"], json!(false));
    assert_eq!(v["reason"].as_str().unwrap(), "Identity not found");
}

#[tokio::test]
async fn verify_unknown_topic_is_422() {
    let (app, store) = test_app();
    register(&app, &store, &addr(41), "inv-41").await;
    let resp = app
        .oneshot(get(&format!(
            "/v1/identities/{}/verify?topics=NOT_A_TOPIC",
            addr(41)
        )))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// =========================================================================
// Audit endpoints
// =========================================================================

#[tokio::test]
async fn audit_endpoints_expose_history_and_integrity() {
    let (app, store) = test_app();
    let issuer = register_issuer(&app).await;
    onboard(&app, &store, &addr(50), "inv-50", &issuer).await;

    let resp = app
        .clone()
        .oneshot(get(&format!("/v1/audit/identities/{}", addr(50))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let entries = body_json(resp).await;
    let operations: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation"].as_str().unwrap())
        .collect();
    assert_eq!(
        operations,
        vec![
            "identity_register",
            "claim_issue",
            "identity_claim_attach",
            "identity_status_update",
        ]
    );

    let resp = app.oneshot(get("/v1/audit/integrity")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["chain_valid"], json!(true));
    assert!(v["total_entries"].as_u64().unwrap() >= 5);
}
