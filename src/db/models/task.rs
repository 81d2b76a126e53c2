//! Task board models, DTOs and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{double_option, normalize_email, now_rfc3339, RecordId};

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Whether a non-admin may move a task from `self` to `next`.
    ///
    /// Only single forward steps are legal: todo -> in-progress -> done.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Todo, TaskStatus::InProgress) | (TaskStatus::InProgress, TaskStatus::Done)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown task priority: {}", s)),
        }
    }
}

impl From<String> for TaskPriority {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Partial copy of an employee embedded in a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssigneeSnapshot {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<RecordId>,
}

/// Reference from a task to the employee it is assigned to.
///
/// Stored records carry either shape; both are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssigneeRef {
    ById(RecordId),
    BySnapshot(AssigneeSnapshot),
}

/// The comparable parts of an assignee reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssigneeKey {
    pub id: Option<String>,
    pub email: Option<String>,
}

impl AssigneeRef {
    /// Reduce either representation to a canonical id + email pair.
    /// Empty values are dropped so they can never produce a match.
    pub fn key(&self) -> AssigneeKey {
        match self {
            AssigneeRef::ById(id) => AssigneeKey {
                id: Some(id.as_str().to_string()).filter(|s| !s.is_empty()),
                email: None,
            },
            AssigneeRef::BySnapshot(snapshot) => AssigneeKey {
                id: snapshot
                    .id
                    .as_ref()
                    .map(|id| id.as_str().to_string())
                    .filter(|s| !s.is_empty()),
                email: snapshot
                    .email
                    .as_deref()
                    .map(normalize_email)
                    .filter(|s| !s.is_empty()),
            },
        }
    }

    /// Whether the reference carries nothing that could identify an employee.
    pub fn is_blank(&self) -> bool {
        let key = self.key();
        key.id.is_none() && key.email.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub assignee: Option<AssigneeRef>,
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<String>,
    assignee: Option<String>,
    owner: String,
    created_at: String,
    updated_at: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status: TaskStatus::from(row.status),
            priority: TaskPriority::from(row.priority),
            due_date: row.due_date,
            assignee: parse_assignee(row.assignee.as_deref()),
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Parse the assignee JSON column.
///
/// Rows written before the column held JSON contain a bare id; those are read
/// as `ById` rather than dropped.
pub fn parse_assignee(raw: Option<&str>) -> Option<AssigneeRef> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Option<AssigneeRef>>(raw) {
        Ok(parsed) => parsed,
        Err(_) => Some(AssigneeRef::ById(RecordId::new(raw))),
    }
}

/// Serialize an assignee for the JSON column.
pub fn serialize_assignee(assignee: Option<&AssigneeRef>) -> Option<String> {
    assignee.and_then(|a| serde_json::to_string(a).ok())
}

/// Request to create a task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub assignee: Option<AssigneeRef>,
}

/// Request to update a task. An explicit `null` clears an optional field;
/// `assignee: null` unassigns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee: Option<Option<AssigneeRef>>,
}

impl UpdateTaskRequest {
    /// Names of the fields present in the request.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.due_date.is_some() {
            fields.push("dueDate");
        }
        if self.assignee.is_some() {
            fields.push("assignee");
        }
        fields
    }
}

/// A validated task ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub assignee: Option<AssigneeRef>,
    pub owner: String,
}

/// Validated changes to an existing task. `None` leaves a column untouched;
/// `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<String>>,
    pub assignee: Option<Option<AssigneeRef>>,
}

pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Task::from).collect())
}

pub async fn get_task(pool: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Task::from))
}

pub async fn insert_task(pool: &SqlitePool, new: &NewTask) -> Result<String, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, status, priority, due_date, assignee, owner, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.status.to_string())
    .bind(new.priority.to_string())
    .bind(&new.due_date)
    .bind(serialize_assignee(new.assignee.as_ref()))
    .bind(&new.owner)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn update_task(
    pool: &SqlitePool,
    id: &str,
    changes: &TaskChanges,
) -> Result<u64, sqlx::Error> {
    let now = now_rfc3339();
    let assignee_json = changes
        .assignee
        .as_ref()
        .and_then(|a| serialize_assignee(a.as_ref()));

    let result = sqlx::query(
        r#"
        UPDATE tasks SET
            title = COALESCE(?, title),
            description = CASE WHEN ? THEN ? ELSE description END,
            status = COALESCE(?, status),
            priority = COALESCE(?, priority),
            due_date = CASE WHEN ? THEN ? ELSE due_date END,
            assignee = CASE WHEN ? THEN ? ELSE assignee END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.title)
    .bind(changes.description.is_some())
    .bind(changes.description.clone().flatten())
    .bind(changes.status.map(|s| s.to_string()))
    .bind(changes.priority.map(|p| p.to_string()))
    .bind(changes.due_date.is_some())
    .bind(changes.due_date.clone().flatten())
    .bind(changes.assignee.is_some())
    .bind(assignee_json)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_task(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
