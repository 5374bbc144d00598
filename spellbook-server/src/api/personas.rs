//! Persona endpoints
//!
//! Anyone may read personas. A caller may change the persona named by its
//! submitter header; the admin token may change any persona.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use spellbook_common::{Persona, PersonaBook, PersonaService};

use super::caller::RequestCaller;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PersonaListResponse {
    pub count: usize,
    pub personas: PersonaBook,
}

#[derive(Debug, Serialize)]
pub struct PersonaEntry {
    pub name: String,
    pub persona: Persona,
}

#[derive(Debug, Serialize)]
pub struct PersonaSaveResponse {
    pub saved: usize,
}

/// GET /api/personas
pub async fn list_personas(
    State(state): State<AppState>,
) -> ApiResult<Json<PersonaListResponse>> {
    let personas = PersonaService::new(state.store.as_ref()).list().await?;
    Ok(Json(PersonaListResponse {
        count: personas.len(),
        personas,
    }))
}

/// POST /api/personas
///
/// Saves every persona in the body; personas not named there are kept.
pub async fn save_personas(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Json(book): Json<PersonaBook>,
) -> ApiResult<Json<PersonaSaveResponse>> {
    let saved = PersonaService::new(state.store.as_ref())
        .save_all(book, &caller)
        .await?;
    Ok(Json(PersonaSaveResponse { saved }))
}

/// GET /api/personas/:name
pub async fn get_persona(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PersonaEntry>> {
    let persona = PersonaService::new(state.store.as_ref()).get(&name).await?;
    Ok(Json(PersonaEntry {
        name: name.trim().to_string(),
        persona,
    }))
}

/// PUT /api/personas/:name
pub async fn put_persona(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
    Json(persona): Json<Persona>,
) -> ApiResult<Json<PersonaEntry>> {
    let persona = PersonaService::new(state.store.as_ref())
        .save(&name, persona, &caller)
        .await?;
    Ok(Json(PersonaEntry {
        name: name.trim().to_string(),
        persona,
    }))
}

/// DELETE /api/personas/:name
pub async fn delete_persona(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    PersonaService::new(state.store.as_ref())
        .delete(&name, &caller)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/personas/:name/spells/:spell
pub async fn add_persona_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path((name, spell)): Path<(String, String)>,
) -> ApiResult<Json<PersonaEntry>> {
    let persona = PersonaService::new(state.store.as_ref())
        .add_spell(&name, &spell, &caller)
        .await?;
    Ok(Json(PersonaEntry {
        name: name.trim().to_string(),
        persona,
    }))
}

/// DELETE /api/personas/:name/spells/:spell
pub async fn remove_persona_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path((name, spell)): Path<(String, String)>,
) -> ApiResult<Json<PersonaEntry>> {
    let persona = PersonaService::new(state.store.as_ref())
        .remove_spell(&name, &spell, &caller)
        .await?;
    Ok(Json(PersonaEntry {
        name: name.trim().to_string(),
        persona,
    }))
}
