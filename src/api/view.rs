//! View and dashboard endpoints, plus the read-authorize-write-reread cycle
//! every mutating handler goes through.

use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::access::{
    authorize_mutation, build_dashboard, resolve_visibility, Dashboard, Identity, Mutation,
    Snapshot, VisibilityView,
};
use crate::db::{apply_write, load_snapshot};
use crate::AppState;

use super::audit::audit_log;
use super::error::ApiError;
use super::response::ApiResponse;

/// Resolve the caller's view from a fresh snapshot.
pub async fn load_view(state: &AppState, identity: &Identity) -> Result<VisibilityView, ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    Ok(resolve_visibility(identity, &snapshot.employees, &snapshot.tasks))
}

/// Authorize `mutation` against `snapshot`, persist it, record it in the
/// audit log and return the affected record id with the caller's re-derived
/// view. The view is always recomputed from storage, never patched.
pub async fn commit_mutation(
    state: &AppState,
    identity: &Identity,
    mutation: Mutation<'_>,
    snapshot: &Snapshot,
    details: Option<Value>,
) -> Result<(String, VisibilityView), ApiError> {
    let write = authorize_mutation(identity, mutation, snapshot)?;

    let id = apply_write(&state.db, &write)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", mutation.resource_type())))?;

    info!(
        action = write.action(),
        resource_id = %id,
        identity = %identity.id,
        "Mutation applied"
    );

    audit_log(
        state,
        write.action(),
        mutation.resource_type(),
        Some(&id),
        Some(&identity.id),
        details,
    )
    .await;

    let view = load_view(state, identity).await?;
    Ok((id, view))
}

/// Everything the caller may see
///
/// GET /api/view
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ApiResponse<VisibilityView>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// Admin or personal dashboard summary
///
/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    Ok(Json(ApiResponse::ok(build_dashboard(&identity, &view))))
}
