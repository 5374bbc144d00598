//! Canonical catalog endpoints
//!
//! Reads are open to everyone. Import writes directly for privileged callers
//! and queues for everyone else; edit and delete are privileged only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spellbook_common::decision::{PresetDecisions, RecordDecision};
use spellbook_common::{Identity, ImportOrchestrator, ImportSummary, Record};
use std::collections::HashMap;
use tracing::info;

use super::caller::RequestCaller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// One catalog entry as returned to clients
#[derive(Debug, Serialize)]
pub struct SpellEntry {
    pub identity: Identity,
    pub spell: Record,
}

#[derive(Debug, Serialize)]
pub struct SpellListResponse {
    pub count: usize,
    pub spells: Vec<SpellEntry>,
}

/// Body of `POST /api/spells/import`
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Rows of tabular input (header -> cell); scalar cells only
    pub records: Vec<Map<String, Value>>,
    /// Per-record answers to conflicts, keyed by spell name or identity
    #[serde(default)]
    pub decisions: HashMap<String, RecordDecision>,
    /// Answer for conflicting records not listed in `decisions`
    #[serde(default)]
    pub on_conflict: Option<RecordDecision>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

/// GET /api/spells
pub async fn list_spells(State(state): State<AppState>) -> ApiResult<Json<SpellListResponse>> {
    let spells: Vec<SpellEntry> = state
        .store
        .get_all()
        .await?
        .into_iter()
        .map(|(identity, spell)| SpellEntry { identity, spell })
        .collect();

    Ok(Json(SpellListResponse {
        count: spells.len(),
        spells,
    }))
}

/// GET /api/spells/:identity
///
/// The path segment may be a spell name or an identity.
pub async fn get_spell(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SpellEntry>> {
    let identity = Identity::of(&name);
    let spell = state
        .store
        .get(&identity)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("spell {}", identity)))?;

    Ok(Json(SpellEntry { identity, spell }))
}

/// POST /api/spells/import
pub async fn import_spells(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    let records = request
        .records
        .into_iter()
        .map(record_from_row)
        .collect::<ApiResult<Vec<Record>>>()?;

    let decisions = PresetDecisions::new(
        request
            .decisions
            .into_iter()
            .map(|(name, decision)| (Identity::of(&name), decision))
            .collect(),
    )
    .with_fallback(request.on_conflict);

    info!(
        "Import of {} record(s) from {} (privileged: {})",
        records.len(),
        caller.submitter,
        caller.privileged
    );

    let summary = ImportOrchestrator::new(state.store.as_ref())
        .import_batch(records, &caller, &decisions)
        .await?;

    Ok(Json(ImportResponse {
        message: summary.display_string(),
        summary,
    }))
}

/// PUT /api/spells/:identity
///
/// Replaces the spell; when the body carries a different name the spell is
/// renamed and the entry under the path identity removed.
pub async fn edit_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<SpellEntry>> {
    let prior = Identity::of(&name);
    let record = record_from_row(body)?;

    let identity = ImportOrchestrator::new(state.store.as_ref())
        .edit_record(Some(&prior), record.clone(), &caller)
        .await?;

    Ok(Json(SpellEntry {
        identity,
        spell: record,
    }))
}

/// DELETE /api/spells/:identity
pub async fn delete_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    ImportOrchestrator::new(state.store.as_ref())
        .delete_record(&Identity::of(&name), &caller)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Convert one JSON row into a record
///
/// Numbers and booleans are taken as their text; nulls count as empty cells.
/// Nested arrays or objects are rejected.
pub(crate) fn record_from_row(row: Map<String, Value>) -> ApiResult<Record> {
    let cells = row
        .into_iter()
        .map(|(header, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ApiError::BadRequest(format!(
                        "field {:?} must be a scalar value",
                        header
                    )))
                }
            };
            Ok((header, text))
        })
        .collect::<ApiResult<Vec<(String, String)>>>()?;

    Ok(Record::from_row(cells))
}
