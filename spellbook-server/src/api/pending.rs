//! Moderation queue endpoints
//!
//! Anyone may submit; listing, approving and rejecting need the admin token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use spellbook_common::{
    ApprovalOutcome, Identity, ImportOrchestrator, ModerationService, QueueEntry,
};

use super::caller::RequestCaller;
use super::spells::record_from_row;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub count: usize,
    pub pending: Vec<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub identity: Identity,
    pub status: &'static str,
}

/// GET /api/pending-spells
pub async fn list_pending(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
) -> ApiResult<Json<PendingListResponse>> {
    caller.require_privilege("listing pending spells")?;

    let pending = state.store.list_pending().await?;
    Ok(Json(PendingListResponse {
        count: pending.len(),
        pending,
    }))
}

/// POST /api/pending-spells
///
/// Queues one record for approval, whoever the caller is.
pub async fn submit_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    let record = record_from_row(body)?;
    let identity = record
        .identity()
        .ok_or_else(|| ApiError::BadRequest("spell has no name".to_string()))?;

    ImportOrchestrator::new(state.store.as_ref())
        .submit_for_approval(vec![record], &caller.submitter)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionResponse {
            identity,
            status: "pending",
        }),
    ))
}

/// POST /api/pending-spells/:identity/approve
///
/// 200 with the approved identity, or 409 with the conflicts when the
/// reconcile policy kept the entry pending.
pub async fn approve_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let outcome = ModerationService::new(state.store.as_ref(), state.approval_policy)
        .approve_identity(&Identity::of(&name), &caller)
        .await?;

    let status = match outcome {
        ApprovalOutcome::Approved { .. } => StatusCode::OK,
        ApprovalOutcome::Conflicted { .. } => StatusCode::CONFLICT,
    };

    Ok((status, Json(outcome)).into_response())
}

/// POST /api/pending-spells/:identity/reject
pub async fn reject_spell(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    ModerationService::new(state.store.as_ref(), state.approval_policy)
        .reject_identity(&Identity::of(&name), &caller)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
