//! Audit log models for tracking accepted mutations.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

/// Response for listing audit logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering audit logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    /// Filter by action (e.g., "task.update")
    pub action: Option<String>,
    /// Filter by resource type (e.g., "task", "employee")
    pub resource_type: Option<String>,
    /// Filter by acting account
    pub user_id: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

pub mod actions {
    pub const EMPLOYEE_CREATE: &str = "employee.create";
    pub const EMPLOYEE_UPDATE: &str = "employee.update";
    pub const EMPLOYEE_DELETE: &str = "employee.delete";

    pub const TASK_CREATE: &str = "task.create";
    pub const TASK_UPDATE: &str = "task.update";
    pub const TASK_DELETE: &str = "task.delete";

    pub const AUTH_REGISTER: &str = "auth.register";
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGOUT: &str = "auth.logout";
}

pub mod resource_types {
    pub const EMPLOYEE: &str = "employee";
    pub const TASK: &str = "task";
    pub const USER: &str = "user";
}

/// Log an audit event to the database
pub async fn log_audit(
    db: &SqlitePool,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    user_id: Option<&str>,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = super::now_rfc3339();
    let details_json = details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, resource_type, resource_id, user_id, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(user_id)
    .bind(&details_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        action = action,
        resource_type = resource_type,
        resource_id = resource_id,
        user_id = user_id,
        "Audit log recorded"
    );

    Ok(())
}

/// List audit logs with filtering and pagination
pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(action) = &query.action {
        conditions.push("action = ?");
        bindings.push(action.clone());
    }

    if let Some(resource_type) = &query.resource_type {
        conditions.push("resource_type = ?");
        bindings.push(resource_type.clone());
    }

    if let Some(user_id) = &query.user_id {
        conditions.push("user_id = ?");
        bindings.push(user_id.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, AuditLog>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }
    query_builder = query_builder.bind(per_page).bind(offset);

    let items = query_builder.fetch_all(db).await?;

    let total_pages = (total + per_page - 1) / per_page;

    Ok(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}
