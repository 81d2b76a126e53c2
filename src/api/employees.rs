//! Employee directory endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::access::{
    visibility::tasks_assigned_to, EmployeeFilter, Identity, Mutation, ProfileStatus,
    VisibilityView,
};
use crate::db::{
    load_snapshot, normalize_id, CreateEmployeeRequest, Employee, Task, UpdateEmployeeRequest,
};
use crate::AppState;

use super::error::ApiError;
use super::extract::ApiJson;
use super::response::ApiResponse;
use super::view::{commit_mutation, load_view};

fn find_employee<'a>(view: &'a VisibilityView, id: &str) -> Result<&'a Employee, ApiError> {
    let id = normalize_id(id);
    view.visible_employees
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

/// List the directory
///
/// GET /api/employees?search=&status=
pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(filter): Query<EmployeeFilter>,
) -> Result<Json<ApiResponse<Vec<Employee>>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let employees = filter
        .apply(&view.visible_employees)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(ApiResponse::ok(employees)))
}

/// Create an employee profile
///
/// POST /api/employees
pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    ApiJson(request): ApiJson<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Employee>>), ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::CreateEmployee(&request),
        &snapshot,
        None,
    )
    .await?;

    let employee = find_employee(&view, &id)?.clone();
    Ok((StatusCode::CREATED, Json(ApiResponse::with_view(employee, view))))
}

/// The caller's own profile
///
/// GET /api/employees/me
pub async fn get_my_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ApiResponse<Employee>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let ProfileStatus::Linked { employee_id } = &view.profile else {
        return Err(ApiError::profile_required());
    };
    let employee = find_employee(&view, employee_id)?.clone();
    Ok(Json(ApiResponse::ok(employee)))
}

/// GET /api/employees/:id
pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Employee>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let employee = find_employee(&view, &id)?.clone();
    Ok(Json(ApiResponse::ok(employee)))
}

/// Update an employee profile
///
/// PUT /api/employees/:id
pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateEmployeeRequest>,
) -> Result<Json<ApiResponse<Employee>>, ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let id = normalize_id(&id);
    let target = snapshot
        .employees
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::UpdateEmployee {
            target,
            patch: &request,
        },
        &snapshot,
        Some(json!({ "fields": request.touched_fields() })),
    )
    .await?;

    let employee = find_employee(&view, &id)?.clone();
    Ok(Json(ApiResponse::with_view(employee, view)))
}

/// Delete an employee profile. Tasks assigned to it keep their reference.
///
/// DELETE /api/employees/:id
pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let snapshot = load_snapshot(&state.db).await?;
    let id = normalize_id(&id);
    let target = snapshot
        .employees
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let details = json!({ "name": target.name, "owner": target.owner });
    let (id, view) = commit_mutation(
        &state,
        &identity,
        Mutation::DeleteEmployee(target),
        &snapshot,
        Some(details),
    )
    .await?;

    Ok(Json(ApiResponse::with_view(json!({ "_id": id }), view)))
}

/// Visible tasks assigned to an employee
///
/// GET /api/employees/:id/tasks
pub async fn get_employee_tasks(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let view = load_view(&state, &identity).await?;
    let employee = find_employee(&view, &id)?;
    let tasks = tasks_assigned_to(employee, &view.visible_tasks)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(ApiResponse::ok(tasks)))
}
