mod models;

pub use models::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

use crate::access::{ApprovedWrite, Snapshot};
use crate::config::ServerConfig;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Open the database described by the server config and run migrations.
pub async fn init(server: &ServerConfig) -> Result<DbPool> {
    let db_url = match &server.database_url {
        Some(url) => url.clone(),
        None => {
            std::fs::create_dir_all(&server.data_dir).with_context(|| {
                format!("Failed to create data directory: {}", server.data_dir.display())
            })?;
            let db_path = server.data_dir.join("taskdesk.db");
            format!("sqlite:{}", db_path.display())
        }
    };

    info!("Initializing database at {}", db_url);
    let pool = open(&db_url, 5).await?;
    info!("Database initialized successfully");
    Ok(pool)
}

/// Connect to `url` with foreign keys enforced and apply all migrations.
pub async fn open(url: &str, max_connections: u32) -> Result<DbPool> {
    let in_memory = url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("Invalid database URL: {}", url))?
        .create_if_missing(true)
        .pragma("foreign_keys", "ON");
    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: accounts, sessions, employees, tasks
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Add audit_logs table for tracking accepted mutations
    let has_audit_logs_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='audit_logs'"
    )
    .fetch_optional(pool)
    .await?;
    if has_audit_logs_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_audit_logs.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// Read the full directory, board and account list in one pass.
///
/// Every visibility and authorization decision is made against a snapshot
/// taken this way; nothing is cached between requests.
pub async fn load_snapshot(pool: &SqlitePool) -> Result<Snapshot, sqlx::Error> {
    let employees = list_employees(pool).await?;
    let tasks = list_tasks(pool).await?;
    let account_ids: HashSet<String> = list_account_ids(pool).await?.into_iter().collect();

    Ok(Snapshot {
        employees,
        tasks,
        account_ids,
    })
}

/// Persist an approved write.
///
/// Returns the id of the created or affected record, or `None` when the
/// target of an update or delete no longer exists.
pub async fn apply_write(pool: &SqlitePool, write: &ApprovedWrite) -> Result<Option<String>, sqlx::Error> {
    let affected = |rows: u64, id: &str| (rows > 0).then(|| id.to_string());

    match write {
        ApprovedWrite::CreateEmployee(new) => insert_employee(pool, new).await.map(Some),
        ApprovedWrite::UpdateEmployee { id, changes } => {
            let rows = update_employee(pool, id, changes).await?;
            Ok(affected(rows, id))
        }
        ApprovedWrite::DeleteEmployee { id } => {
            let rows = delete_employee(pool, id).await?;
            Ok(affected(rows, id))
        }
        ApprovedWrite::CreateTask(new) => insert_task(pool, new).await.map(Some),
        ApprovedWrite::UpdateTask { id, changes } => {
            let rows = update_task(pool, id, changes).await?;
            Ok(affected(rows, id))
        }
        ApprovedWrite::DeleteTask { id } => {
            let rows = delete_task(pool, id).await?;
            Ok(affected(rows, id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    async fn memory_pool() -> DbPool {
        open("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        let snapshot = load_snapshot(&pool).await.unwrap();
        assert!(snapshot.employees.is_empty());
        assert!(snapshot.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_apply_writes_round_trip() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "ada@example.com", "hash", "Ada", Role::User)
            .await
            .unwrap();

        let employee_id = apply_write(
            &pool,
            &ApprovedWrite::CreateEmployee(NewEmployee {
                name: "Ada".to_string(),
                email: Some("ada@example.com".to_string()),
                phone: None,
                position: None,
                department: None,
                status: EmployeeStatus::Active,
                owner: user.id.clone(),
            }),
        )
        .await
        .unwrap()
        .unwrap();

        let task_id = apply_write(
            &pool,
            &ApprovedWrite::CreateTask(NewTask {
                title: "Report".to_string(),
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::High,
                due_date: Some("2024-05-01".to_string()),
                assignee: Some(AssigneeRef::ById(RecordId::new(&employee_id))),
                owner: user.id.clone(),
            }),
        )
        .await
        .unwrap()
        .unwrap();

        apply_write(
            &pool,
            &ApprovedWrite::UpdateTask {
                id: task_id.clone(),
                changes: TaskChanges {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();

        let snapshot = load_snapshot(&pool).await.unwrap();
        assert!(snapshot.account_ids.contains(&user.id));
        assert_eq!(snapshot.employees.len(), 1);
        let task = &snapshot.tasks[0];
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.assignee, Some(AssigneeRef::ById(RecordId::new(&employee_id))));

        // Clearing the assignee writes NULL
        apply_write(
            &pool,
            &ApprovedWrite::UpdateTask {
                id: task_id.clone(),
                changes: TaskChanges {
                    assignee: Some(None),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        let task = get_task(&pool, &task_id).await.unwrap().unwrap();
        assert_eq!(task.assignee, None);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_cleared_changes_write_null_and_keep_the_rest() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "ada@example.com", "hash", "Ada", Role::User)
            .await
            .unwrap();

        let employee_id = apply_write(
            &pool,
            &ApprovedWrite::CreateEmployee(NewEmployee {
                name: "Ada".to_string(),
                email: Some("ada@example.com".to_string()),
                phone: Some("555-0100".to_string()),
                position: Some("Engineer".to_string()),
                department: None,
                status: EmployeeStatus::Active,
                owner: user.id.clone(),
            }),
        )
        .await
        .unwrap()
        .unwrap();
        let task_id = apply_write(
            &pool,
            &ApprovedWrite::CreateTask(NewTask {
                title: "Report".to_string(),
                description: Some("Draft".to_string()),
                status: TaskStatus::Todo,
                priority: TaskPriority::Medium,
                due_date: Some("2024-05-01".to_string()),
                assignee: None,
                owner: user.id.clone(),
            }),
        )
        .await
        .unwrap()
        .unwrap();

        apply_write(
            &pool,
            &ApprovedWrite::UpdateEmployee {
                id: employee_id.clone(),
                changes: EmployeeChanges {
                    phone: Some(None),
                    department: Some(Some("Ops".to_string())),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        apply_write(
            &pool,
            &ApprovedWrite::UpdateTask {
                id: task_id.clone(),
                changes: TaskChanges {
                    due_date: Some(None),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();

        let employee = find_employee_by_owner(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(employee.phone, None);
        assert_eq!(employee.position.as_deref(), Some("Engineer"));
        assert_eq!(employee.department.as_deref(), Some("Ops"));
        assert_eq!(employee.email.as_deref(), Some("ada@example.com"));

        let task = get_task(&pool, &task_id).await.unwrap().unwrap();
        assert_eq!(task.due_date, None);
        assert_eq!(task.description.as_deref(), Some("Draft"));
        assert_eq!(task.title, "Report");
    }

    #[tokio::test]
    async fn test_write_to_missing_record_returns_none() {
        let pool = memory_pool().await;
        let result = apply_write(&pool, &ApprovedWrite::DeleteTask { id: "gone".to_string() })
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_second_profile_for_account_violates_unique_owner() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "ada@example.com", "hash", "Ada", Role::User)
            .await
            .unwrap();
        let new = NewEmployee {
            name: "Ada".to_string(),
            email: None,
            phone: None,
            position: None,
            department: None,
            status: EmployeeStatus::Active,
            owner: user.id.clone(),
        };
        insert_employee(&pool, &new).await.unwrap();
        let err = insert_employee(&pool, &new).await.unwrap_err();
        assert!(matches!(
            err,
            sqlx::Error::Database(ref db) if db.is_unique_violation()
        ));
    }
}
