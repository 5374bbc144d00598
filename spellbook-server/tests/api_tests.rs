//! Integration tests for spellbook-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (no token required)
//! - Catalog reads, privileged import with conflict decisions, edit/delete
//! - Unprivileged import and single submission into the moderation queue
//! - Approve / reject, including privilege checks and the reconcile policy

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use spellbook_common::auth::token_digest;
use spellbook_common::db::init_memory_database;
use spellbook_common::store::{MemoryStore, SpellStore, SqliteStore};
use spellbook_common::{ApprovalPolicy, Record, NAME_FIELD};
use spellbook_server::api::{SUBMITTER_HEADER, TOKEN_HEADER};
use spellbook_server::{build_router, AppState};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

const ADMIN_TOKEN: &str = "let-me-in";

/// Test helper: app over a given store with the admin token configured
fn setup_app(store: Arc<dyn SpellStore>, policy: ApprovalPolicy) -> axum::Router {
    let state = AppState::new(store, Some(token_digest(ADMIN_TOKEN)), policy);
    build_router(state)
}

fn memory_app() -> axum::Router {
    setup_app(Arc::new(MemoryStore::new()), ApprovalPolicy::Overwrite)
}

fn seeded_app(records: Vec<Record>, policy: ApprovalPolicy) -> axum::Router {
    setup_app(Arc::new(MemoryStore::with_catalog(records)), policy)
}

/// Test helper: request without credentials
fn test_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    build_request(method, uri, body, &[])
}

/// Test helper: request carrying the admin token
fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    build_request(method, uri, body, &[(TOKEN_HEADER, ADMIN_TOKEN)])
}

fn build_request(
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn spell(name: &str, fields: &[(&str, &str)]) -> Record {
    fields
        .iter()
        .fold(Record::new().with(NAME_FIELD, name), |record, (k, v)| {
            record.with(*k, *v)
        })
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let response = memory_app()
        .oneshot(test_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "spellbook-server");
    assert_eq!(body["approval_policy"], "overwrite");
    assert!(body["version"].is_string());
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[tokio::test]
async fn test_get_spell_by_name_or_identity() {
    let app = seeded_app(
        vec![spell("Fire Bolt", &[("Level", "Cantrip")])],
        ApprovalPolicy::Overwrite,
    );

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/spells/fire-bolt", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["identity"], "fire-bolt");
    assert_eq!(body["spell"]["Level"], "Cantrip");

    let response = app
        .oneshot(test_request("GET", "/api/spells/Fire%20Bolt", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_missing_spell_is_404() {
    let response = memory_app()
        .oneshot(test_request("GET", "/api/spells/wish", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_privileged_import_writes_catalog() {
    let app = memory_app();

    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/api/spells/import",
            Some(json!({
                "records": [
                    {"Name": "Fire Bolt", "Level": 0, "School": "Evocation"},
                    {"Spell Name": "Shield", "Level": 1},
                    {"Level": 3}
                ]
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["written"], 2);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["message"], "Import complete! 2 spells were added or updated");

    let response = app
        .oneshot(test_request("GET", "/api/spells", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["spells"][0]["identity"], "fire-bolt");
    assert_eq!(body["spells"][0]["spell"]["Level"], "0");
}

#[tokio::test]
async fn test_import_conflict_without_decision_reports_unresolved() {
    let app = seeded_app(
        vec![spell("Fire Bolt", &[("Level", "Cantrip"), ("Description", "old")])],
        ApprovalPolicy::Overwrite,
    );

    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/api/spells/import",
            Some(json!({
                "records": [{"Spell Name": "Fire Bolt", "Description": "new"}]
            })),
        ))
        .await
        .unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["unresolved"], 1);
    assert_eq!(body["unresolved_records"][0]["identity"], "fire-bolt");
    assert_eq!(
        body["unresolved_records"][0]["conflicts"][0],
        json!({"field": "Description", "existingValue": "old", "incomingValue": "new"})
    );

    // Re-submit with a per-field decision
    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/api/spells/import",
            Some(json!({
                "records": [{"Spell Name": "Fire Bolt", "Description": "new"}],
                "decisions": {
                    "Fire Bolt": {"action": "replace", "fields": {"Description": "incoming"}}
                }
            })),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["written"], 1);

    let response = app
        .oneshot(test_request("GET", "/api/spells/fire-bolt", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["spell"]["Description"], "new");
    assert_eq!(body["spell"]["Level"], "Cantrip");
}

#[tokio::test]
async fn test_import_on_conflict_fallback() {
    let app = seeded_app(
        vec![spell("Light", &[("Level", "Cantrip")])],
        ApprovalPolicy::Overwrite,
    );

    let response = app
        .oneshot(admin_request(
            "POST",
            "/api/spells/import",
            Some(json!({
                "records": [{"Spell Name": "Light", "Level": "0"}],
                "on_conflict": {"action": "replace", "default": "incoming"}
            })),
        ))
        .await
        .unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["written"], 1);
    assert_eq!(body["unresolved"], 0);
}

#[tokio::test]
async fn test_edit_renames_spell() {
    let app = seeded_app(
        vec![spell("Burning Hands", &[("Level", "1")])],
        ApprovalPolicy::Overwrite,
    );

    let response = app
        .clone()
        .oneshot(admin_request(
            "PUT",
            "/api/spells/burning-hands",
            Some(json!({"Spell Name": "Burning Hands (Revised)", "Level": "1"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["identity"], "burning-hands-(revised)");

    let response = app
        .oneshot(test_request("GET", "/api/spells", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["spells"][0]["identity"], "burning-hands-(revised)");
}

#[tokio::test]
async fn test_edit_and_delete_require_token() {
    let app = seeded_app(vec![spell("Light", &[])], ApprovalPolicy::Overwrite);

    let response = app
        .clone()
        .oneshot(test_request(
            "PUT",
            "/api/spells/light",
            Some(json!({"Spell Name": "Light", "Level": "0"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(build_request(
            "DELETE",
            "/api/spells/light",
            None,
            &[(TOKEN_HEADER, "wrong")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(admin_request("DELETE", "/api/spells/light", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Moderation Tests
// =============================================================================

#[tokio::test]
async fn test_unprivileged_import_is_queued() {
    let app = seeded_app(
        vec![spell("Fire Bolt", &[("Description", "old")])],
        ApprovalPolicy::Overwrite,
    );

    let response = app
        .clone()
        .oneshot(build_request(
            "POST",
            "/api/spells/import",
            Some(json!({
                "records": [
                    {"Spell Name": "Fire Bolt", "Description": "new"},
                    {"Spell Name": "Mage Armor"}
                ]
            })),
            &[(SUBMITTER_HEADER, "bob")],
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["queued"], 2);
    assert_eq!(body["written"], 0);
    assert_eq!(body["message"], "2 spells submitted for approval");

    // Catalog unchanged
    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/spells/fire-bolt", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["spell"]["Description"], "old");

    let response = app
        .oneshot(admin_request("GET", "/api/pending-spells", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["pending"][0]["submittedBy"], "bob");
    assert_eq!(body["pending"][0]["status"], "pending");
}

#[tokio::test]
async fn test_pending_list_requires_token() {
    let response = memory_app()
        .oneshot(test_request("GET", "/api/pending-spells", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_submit_and_approve_on_sqlite() {
    let pool = init_memory_database().await.unwrap();
    let app = setup_app(Arc::new(SqliteStore::new(pool)), ApprovalPolicy::Overwrite);

    let response = app
        .clone()
        .oneshot(build_request(
            "POST",
            "/api/pending-spells",
            Some(json!({"Spell Name": "Mage Armor", "Level": 1})),
            &[(SUBMITTER_HEADER, "alice")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["identity"], "mage-armor");

    // Approval needs the token
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/pending-spells/mage-armor/approve", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/pending-spells/mage-armor/approve", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["outcome"], "approved");
    assert_eq!(body["identity"], "mage-armor");

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/spells/mage-armor", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["spell"]["Level"], "1");
    assert!(body["spell"].get("submittedBy").is_none());

    let response = app
        .oneshot(admin_request("GET", "/api/pending-spells", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_submit_without_name_is_400() {
    let response = memory_app()
        .oneshot(test_request(
            "POST",
            "/api/pending-spells",
            Some(json!({"Level": "1"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_then_reject_again() {
    let app = memory_app();

    app.clone()
        .oneshot(test_request(
            "POST",
            "/api/pending-spells",
            Some(json!({"Spell Name": "Wish"})),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/pending-spells/wish/reject", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/pending-spells/wish/reject", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(test_request("GET", "/api/spells/wish", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reconcile_policy_returns_409_on_conflict() {
    let app = seeded_app(
        vec![spell("Light", &[("Level", "Cantrip")])],
        ApprovalPolicy::Reconcile,
    );

    app.clone()
        .oneshot(test_request(
            "POST",
            "/api/pending-spells",
            Some(json!({"Spell Name": "Light", "Level": "0"})),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/api/pending-spells/light/approve", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["outcome"], "conflicted");
    assert_eq!(body["conflicts"][0]["field"], "Level");

    // Entry is still pending
    let response = app
        .oneshot(admin_request("GET", "/api/pending-spells", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_no_configured_digest_means_nobody_is_privileged() {
    let state = AppState::new(Arc::new(MemoryStore::new()), None, ApprovalPolicy::Overwrite);
    let app = build_router(state);

    let response = app
        .oneshot(admin_request("GET", "/api/pending-spells", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Persona Tests
// =============================================================================

#[tokio::test]
async fn test_personas_start_empty() {
    let response = memory_app()
        .oneshot(test_request("GET", "/api/personas", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["personas"], json!({}));
}

#[tokio::test]
async fn test_persona_spell_list_is_kept_per_submitter() {
    let pool = init_memory_database().await.unwrap();
    let app = setup_app(Arc::new(SqliteStore::new(pool)), ApprovalPolicy::Overwrite);

    let response = app
        .clone()
        .oneshot(build_request(
            "POST",
            "/api/personas",
            Some(json!({
                "Mira": {"spells": ["Light"], "ownerPinHash": "abc123"}
            })),
            &[(SUBMITTER_HEADER, "Mira")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["saved"], 1);

    let response = app
        .clone()
        .oneshot(build_request(
            "PUT",
            "/api/personas/Mira/spells/Mage%20Armor",
            None,
            &[(SUBMITTER_HEADER, "Mira")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["persona"]["spells"], json!(["Light", "Mage Armor"]));

    // Another player may read but not edit
    let response = app
        .clone()
        .oneshot(build_request(
            "DELETE",
            "/api/personas/Mira/spells/light",
            None,
            &[(SUBMITTER_HEADER, "Tobin")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(test_request("GET", "/api/personas", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["personas"]["Mira"]["spells"], json!(["Light", "Mage Armor"]));
    assert_eq!(body["personas"]["Mira"]["ownerPinHash"], "abc123");
}

#[tokio::test]
async fn test_anonymous_caller_cannot_save_personas() {
    let response = memory_app()
        .oneshot(test_request(
            "POST",
            "/api/personas",
            Some(json!({"Mira": {"spells": ["Light"]}})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_manages_any_persona() {
    let app = memory_app();

    let response = app
        .clone()
        .oneshot(admin_request(
            "PUT",
            "/api/personas/Tobin",
            Some(json!({"spells": ["Sleep", "sleep", "Shield"]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["name"], "Tobin");
    assert_eq!(body["persona"]["spells"], json!(["Sleep", "Shield"]));

    let response = app
        .clone()
        .oneshot(admin_request("DELETE", "/api/personas/Tobin", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(test_request("GET", "/api/personas/Tobin", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reserved_persona_name_is_400() {
    let response = memory_app()
        .oneshot(admin_request(
            "PUT",
            "/api/personas/public_submission",
            Some(json!({"spells": []})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
