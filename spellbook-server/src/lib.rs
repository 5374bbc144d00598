//! spellbook-server library - HTTP surface of the spellbook catalog
//!
//! Exposes catalog browsing, batch import, single edits, the moderation
//! queue and player personas over JSON. Caller privilege comes from the
//! admin token header; the decision logic itself lives in `spellbook-common`.

use axum::Router;
use spellbook_common::store::SpellStore;
use spellbook_common::ApprovalPolicy;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog, moderation queue and persona backend
    pub store: Arc<dyn SpellStore>,
    /// Hex SHA-256 digest of the admin token; `None` disables privileged access
    pub admin_token_sha256: Option<String>,
    pub approval_policy: ApprovalPolicy,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SpellStore>,
        admin_token_sha256: Option<String>,
        approval_policy: ApprovalPolicy,
    ) -> Self {
        Self {
            store,
            admin_token_sha256,
            approval_policy,
        }
    }
}

/// Build application router
///
/// Privilege is checked per handler: the same route serves privileged and
/// unprivileged callers differently (import writes vs. queues).
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let spells = Router::new()
        .route("/api/spells", get(api::list_spells))
        .route("/api/spells/import", post(api::import_spells))
        .route(
            "/api/spells/:identity",
            get(api::get_spell)
                .put(api::edit_spell)
                .delete(api::delete_spell),
        );

    let moderation = Router::new()
        .route(
            "/api/pending-spells",
            get(api::list_pending).post(api::submit_spell),
        )
        .route(
            "/api/pending-spells/:identity/approve",
            post(api::approve_spell),
        )
        .route("/api/pending-spells/:identity/reject", post(api::reject_spell));

    let personas = Router::new()
        .route(
            "/api/personas",
            get(api::list_personas).post(api::save_personas),
        )
        .route(
            "/api/personas/:name",
            get(api::get_persona)
                .put(api::put_persona)
                .delete(api::delete_persona),
        )
        .route(
            "/api/personas/:name/spells/:spell",
            put(api::add_persona_spell).delete(api::remove_persona_spell),
        );

    Router::new()
        .merge(spells)
        .merge(moderation)
        .merge(personas)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // The browser UI is served from elsewhere
        .layer(CorsLayer::permissive())
}
