//! Audit log API endpoints and helpers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::access::Identity;
use crate::db::{list_audit_logs, log_audit, AuditLogListResponse, AuditLogQuery};
use crate::AppState;

use super::error::ApiError;
use super::response::ApiResponse;

/// Helper function to log an audit event with common patterns.
/// This is a convenience wrapper around db::log_audit that handles errors gracefully.
pub async fn audit_log(
    state: &AppState,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    user_id: Option<&str>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = log_audit(&state.db, action, resource_type, resource_id, user_id, details).await {
        // Log the error but don't fail the request
        tracing::warn!(
            action = action,
            resource_type = resource_type,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

/// List audit logs with filtering and pagination
///
/// Query parameters:
/// - action: Filter by action type (e.g., "task.update")
/// - resource_type: Filter by resource type ("employee", "task", "user")
/// - user_id: Filter by acting account
/// - page: Page number (1-indexed, defaults to 1)
/// - per_page: Items per page (defaults to 50, max 100)
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<ApiResponse<AuditLogListResponse>>, ApiError> {
    if !identity.role.can_view_audit_log() {
        return Err(ApiError::forbidden("Only administrators can view the audit log"));
    }
    let result = list_audit_logs(&state.db, &query).await?;
    Ok(Json(ApiResponse::ok(result)))
}
