//! Task board endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::access::{
    visibility::can_view_task, Identity, Mutation, Snapshot, TaskFilter, TaskScope,
    VisibilityView,
};
use crate::db::{load_snapshot, normalize_id, CreateTaskRequest, Task, UpdateTaskRequest};
use crate::AppState;

use super::error::ApiError;
use super::extract::ApiJson;
use super::response::ApiResponse;
use super::view::{commit_mutation, load_view};

fn find_task<'a>(view: &'a VisibilityView, id: &str) -> Result<&'a Task, ApiError> {
    let id = normalize_id(id);
    view.visible_tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// The stored task, provided the caller may see it. Hidden tasks are
/// reported as missing.
fn visible_target<'a>(
    snapshot: &'a Snapshot,
    identity: &Identity,
    id: &str,
) -> Result<&'a Task, ApiError> {
    let id = normalize_id(id);
    snapshot
        .tasks
        .iter()
        .find(|t| t.id == id)
        .filter(|t| can_view_task(identity, t, &snapshot.employees))
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// List tasks
///
/// GET /api/tasks?search=&status=&scope=all|mine
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let source = match filter.scope {
        TaskScope::All => &view.visible_tasks,
        TaskScope::Mine if view.profile.is_missing() => {
            return Err(ApiError::profile_required());
        }
        TaskScope::Mine => &view.my_tasks,
    };
    let tasks = filter.apply(source).into_iter().cloned().collect();
    Ok(Json(ApiResponse::ok(tasks)))
}

/// Create a task owned by the caller
///
/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    ApiJson(request): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::CreateTask(&request),
        &snapshot,
        None,
    )
    .await?;

    let task = find_task(&view, &id)?.clone();
    Ok((StatusCode::CREATED, Json(ApiResponse::with_view(task, view))))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let task = find_task(&view, &id)?.clone();
    Ok(Json(ApiResponse::ok(task)))
}

/// Update a task. Non-admins may only advance its status.
///
/// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateTaskRequest>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let target = visible_target(&snapshot, &identity, &id)?;
    let details = json!({
        "fields": request.touched_fields(),
        "from": target.status,
        "to": request.status,
    });

    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::UpdateTask {
            target,
            patch: &request,
        },
        &snapshot,
        Some(details),
    )
    .await?;

    let task = find_task(&view, &id)?.clone();
    Ok(Json(ApiResponse::with_view(task, view)))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let target = visible_target(&snapshot, &identity, &id)?;
    let details = json!({ "title": target.title });

    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::DeleteTask(target),
        &snapshot,
        Some(details),
    )
    .await?;

    Ok(Json(ApiResponse::with_view(json!({ "_id": id }), view)))
}
