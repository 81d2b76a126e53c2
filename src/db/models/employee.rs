//! Employee directory models, DTOs and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{double_option, now_rfc3339, RecordId};

/// Employment status of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Unknown employee status: {}", s)),
        }
    }
}

impl From<String> for EmployeeStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// An employee profile. `owner` is the id of the account the profile belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: EmployeeStatus,
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
struct EmployeeRow {
    id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    position: Option<String>,
    department: Option<String>,
    status: String,
    owner: String,
    created_at: String,
    updated_at: String,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            position: row.position,
            department: row.department,
            status: EmployeeStatus::from(row.status),
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Request to create an employee profile.
///
/// Fields are optional at the wire level so that missing required fields are
/// reported as validation errors rather than as JSON rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub owner: Option<RecordId>,
}

/// Request to update an employee profile. An explicit `null` clears an
/// optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub position: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub owner: Option<Option<RecordId>>,
}

impl UpdateEmployeeRequest {
    /// Names of the fields present in the request.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.phone.is_some() {
            fields.push("phone");
        }
        if self.position.is_some() {
            fields.push("position");
        }
        if self.department.is_some() {
            fields.push("department");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.owner.is_some() {
            fields.push("owner");
        }
        fields
    }
}

/// A validated employee ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: EmployeeStatus,
    pub owner: String,
}

/// Validated changes to an existing employee. `None` leaves a column
/// untouched; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeChanges {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub position: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub status: Option<EmployeeStatus>,
    pub owner: Option<String>,
}

pub async fn list_employees(pool: &SqlitePool) -> Result<Vec<Employee>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees ORDER BY created_at ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Employee::from).collect())
}

/// The profile linked to an account, if any.
pub async fn find_employee_by_owner(
    pool: &SqlitePool,
    owner: &str,
) -> Result<Option<Employee>, sqlx::Error> {
    let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE owner = ?")
        .bind(owner)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Employee::from))
}

pub async fn insert_employee(pool: &SqlitePool, new: &NewEmployee) -> Result<String, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO employees (id, name, email, phone, position, department, status, owner, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.position)
    .bind(&new.department)
    .bind(new.status.to_string())
    .bind(&new.owner)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn update_employee(
    pool: &SqlitePool,
    id: &str,
    changes: &EmployeeChanges,
) -> Result<u64, sqlx::Error> {
    let now = now_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE employees SET
            name = COALESCE(?, name),
            email = CASE WHEN ? THEN ? ELSE email END,
            phone = CASE WHEN ? THEN ? ELSE phone END,
            position = CASE WHEN ? THEN ? ELSE position END,
            department = CASE WHEN ? THEN ? ELSE department END,
            status = COALESCE(?, status),
            owner = COALESCE(?, owner),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.name)
    .bind(changes.email.is_some())
    .bind(changes.email.clone().flatten())
    .bind(changes.phone.is_some())
    .bind(changes.phone.clone().flatten())
    .bind(changes.position.is_some())
    .bind(changes.position.clone().flatten())
    .bind(changes.department.is_some())
    .bind(changes.department.clone().flatten())
    .bind(changes.status.map(|s| s.to_string()))
    .bind(&changes.owner)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_employee(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
