//! Mutation gateway.
//!
//! Every create/update/delete of an employee or task is checked here against
//! the caller's identity and a snapshot of the directory and board before it
//! reaches storage. An accepted mutation comes back as an [`ApprovedWrite`]
//! with all payload values parsed and server-controlled fields (owners,
//! default statuses) filled in; a rejected one is always an error, never a
//! silent no-op.
//!
//! | Operation       | Admin      | Owning user                          |
//! |-----------------|------------|--------------------------------------|
//! | Create employee | any owner  | own profile only                     |
//! | Update employee | any field  | own profile: name/email/phone/position |
//! | Delete employee | yes        | no                                   |
//! | Create task     | yes        | yes, starts in `todo`                |
//! | Update task     | any field  | assignee or owner: status step only  |
//! | Delete task     | yes        | task owner only                      |

use std::collections::HashSet;

use tracing::debug;

use crate::db::{
    actions, normalize_id, resource_types, AssigneeRef, CreateEmployeeRequest, CreateTaskRequest,
    Employee, EmployeeChanges, EmployeeStatus, NewEmployee, NewTask, Task, TaskChanges,
    TaskPriority, TaskStatus, UpdateEmployeeRequest, UpdateTaskRequest,
};

use super::error::{AccessError, AccessResult};
use super::identity::Identity;
use super::validation::{
    normalize_optional, validate_due_date, validate_email, validate_required_text,
    validate_text_length,
};
use super::visibility::{is_assigned_to_me, is_task_owner, own_employee, resolve_assignee};

const MAX_NAME_LEN: usize = 100;
const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_FIELD_LEN: usize = 120;

/// Employee fields a profile owner may edit themselves.
const SELF_EDITABLE_EMPLOYEE_FIELDS: [&str; 4] = ["name", "email", "phone", "position"];

/// The directory and board as of the read preceding a mutation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub tasks: Vec<Task>,
    /// Ids of every account, for checking employee owner references
    pub account_ids: HashSet<String>,
}

impl Snapshot {
    fn account_exists(&self, id: &str) -> bool {
        self.account_ids.contains(id)
    }

    fn profile_owned_by(&self, owner: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| normalize_id(&e.owner) == owner)
    }
}

/// Kind of write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// A requested write: operation, target record and payload.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    CreateEmployee(&'a CreateEmployeeRequest),
    UpdateEmployee {
        target: &'a Employee,
        patch: &'a UpdateEmployeeRequest,
    },
    DeleteEmployee(&'a Employee),
    CreateTask(&'a CreateTaskRequest),
    UpdateTask {
        target: &'a Task,
        patch: &'a UpdateTaskRequest,
    },
    DeleteTask(&'a Task),
}

impl Mutation<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            Mutation::CreateEmployee(_) | Mutation::CreateTask(_) => Operation::Create,
            Mutation::UpdateEmployee { .. } | Mutation::UpdateTask { .. } => Operation::Update,
            Mutation::DeleteEmployee(_) | Mutation::DeleteTask(_) => Operation::Delete,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Mutation::CreateEmployee(_)
            | Mutation::UpdateEmployee { .. }
            | Mutation::DeleteEmployee(_) => resource_types::EMPLOYEE,
            Mutation::CreateTask(_) | Mutation::UpdateTask { .. } | Mutation::DeleteTask(_) => {
                resource_types::TASK
            }
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            Mutation::UpdateEmployee { target, .. } => Some(&target.id),
            Mutation::DeleteEmployee(target) => Some(&target.id),
            Mutation::UpdateTask { target, .. } => Some(&target.id),
            Mutation::DeleteTask(target) => Some(&target.id),
            Mutation::CreateEmployee(_) | Mutation::CreateTask(_) => None,
        }
    }
}

/// A write that passed authorization and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovedWrite {
    CreateEmployee(NewEmployee),
    UpdateEmployee { id: String, changes: EmployeeChanges },
    DeleteEmployee { id: String },
    CreateTask(NewTask),
    UpdateTask { id: String, changes: TaskChanges },
    DeleteTask { id: String },
}

impl ApprovedWrite {
    /// Audit action name, e.g. `task.update`
    pub fn action(&self) -> &'static str {
        match self {
            ApprovedWrite::CreateEmployee(_) => actions::EMPLOYEE_CREATE,
            ApprovedWrite::UpdateEmployee { .. } => actions::EMPLOYEE_UPDATE,
            ApprovedWrite::DeleteEmployee { .. } => actions::EMPLOYEE_DELETE,
            ApprovedWrite::CreateTask(_) => actions::TASK_CREATE,
            ApprovedWrite::UpdateTask { .. } => actions::TASK_UPDATE,
            ApprovedWrite::DeleteTask { .. } => actions::TASK_DELETE,
        }
    }
}

/// Authorize and validate `mutation` for `identity` against `snapshot`.
pub fn authorize_mutation(
    identity: &Identity,
    mutation: Mutation<'_>,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    let result = match mutation {
        Mutation::CreateEmployee(req) => authorize_create_employee(identity, req, snapshot),
        Mutation::UpdateEmployee { target, patch } => {
            authorize_update_employee(identity, target, patch, snapshot)
        }
        Mutation::DeleteEmployee(target) => authorize_delete_employee(identity, target),
        Mutation::CreateTask(req) => authorize_create_task(identity, req, snapshot),
        Mutation::UpdateTask { target, patch } => {
            authorize_update_task(identity, target, patch, snapshot)
        }
        Mutation::DeleteTask(target) => authorize_delete_task(identity, target),
    };

    if let Err(err) = &result {
        debug!(
            identity = %identity.id,
            role = %identity.role,
            operation = %mutation.operation(),
            resource_type = mutation.resource_type(),
            target_id = mutation.target_id(),
            error = %err,
            "Mutation rejected"
        );
    }

    result
}

fn authorize_create_employee(
    identity: &Identity,
    req: &CreateEmployeeRequest,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    let caller = normalize_id(&identity.id);

    let owner = if identity.role.can_manage_employees() {
        let owner = req
            .owner
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AccessError::validation("owner", "Owner account is required"))?;
        let owner = owner.as_str().to_string();
        if !snapshot.account_exists(&owner) {
            return Err(AccessError::reference("owner", owner));
        }
        owner
    } else {
        // Self-registration: the profile always belongs to the caller.
        if let Some(owner) = &req.owner {
            if owner.as_str() != caller {
                return Err(AccessError::authorization(
                    "You can only create your own employee profile",
                ));
            }
        }
        if req.status.is_some() {
            return Err(AccessError::authorization(
                "Employee status can only be set by an administrator",
            ));
        }
        if req.department.is_some() {
            return Err(AccessError::authorization(
                "Department can only be set by an administrator",
            ));
        }
        caller
    };

    if snapshot.profile_owned_by(&owner).is_some() {
        return Err(AccessError::validation(
            "owner",
            "This account already has an employee profile",
        ));
    }

    let name = validate_required_text(req.name.as_deref(), "name", MAX_NAME_LEN)?;
    let email = normalize_optional(req.email.as_deref());
    if let Some(email) = &email {
        validate_email(email).map_err(|e| AccessError::validation("email", e))?;
    }
    let status = match req.status.as_deref() {
        Some(raw) => parse_field::<EmployeeStatus>(raw, "status")?,
        None => EmployeeStatus::Active,
    };

    Ok(ApprovedWrite::CreateEmployee(NewEmployee {
        name,
        email,
        phone: optional_field(req.phone.as_deref(), "phone")?,
        position: optional_field(req.position.as_deref(), "position")?,
        department: optional_field(req.department.as_deref(), "department")?,
        status,
        owner,
    }))
}

fn authorize_update_employee(
    identity: &Identity,
    target: &Employee,
    patch: &UpdateEmployeeRequest,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    let touched = patch.touched_fields();

    if !identity.role.can_manage_employees() {
        if normalize_id(&target.owner) != normalize_id(&identity.id) {
            return Err(AccessError::authorization(
                "You can only edit your own employee profile",
            ));
        }
        if let Some(field) = touched
            .iter()
            .copied()
            .find(|f| !SELF_EDITABLE_EMPLOYEE_FIELDS.contains(f))
        {
            return Err(AccessError::authorization(format!(
                "{} can only be changed by an administrator",
                field
            )));
        }
    }

    if touched.is_empty() {
        return Err(AccessError::validation("body", "No fields to update"));
    }

    let mut changes = EmployeeChanges::default();

    if let Some(name) = patch.name.as_deref() {
        changes.name = Some(validate_required_text(Some(name), "name", MAX_NAME_LEN)?);
    }
    changes.email = clearable_field(&patch.email, |email| {
        validate_email(email).map_err(|e| AccessError::validation("email", e))
    })?;
    changes.phone = clearable_field(&patch.phone, |v| {
        validate_text_length(v, "phone", MAX_FIELD_LEN)
    })?;
    changes.position = clearable_field(&patch.position, |v| {
        validate_text_length(v, "position", MAX_FIELD_LEN)
    })?;
    changes.department = clearable_field(&patch.department, |v| {
        validate_text_length(v, "department", MAX_FIELD_LEN)
    })?;
    if let Some(raw) = patch.status.as_deref() {
        changes.status = Some(parse_field::<EmployeeStatus>(raw, "status")?);
    }

    match &patch.owner {
        None => {}
        Some(None) => {
            return Err(AccessError::validation(
                "owner",
                "An employee profile must belong to an account",
            ))
        }
        Some(Some(owner)) => {
            let owner = owner.as_str().to_string();
            if !snapshot.account_exists(&owner) {
                return Err(AccessError::reference("owner", owner));
            }
            if let Some(existing) = snapshot.profile_owned_by(&owner) {
                if existing.id != target.id {
                    return Err(AccessError::validation(
                        "owner",
                        "This account already has an employee profile",
                    ));
                }
            }
            changes.owner = Some(owner);
        }
    }

    Ok(ApprovedWrite::UpdateEmployee {
        id: target.id.clone(),
        changes,
    })
}

fn authorize_delete_employee(identity: &Identity, target: &Employee) -> AccessResult<ApprovedWrite> {
    if !identity.role.can_delete_employees() {
        return Err(AccessError::authorization(
            "Only administrators can delete employees",
        ));
    }
    Ok(ApprovedWrite::DeleteEmployee {
        id: target.id.clone(),
    })
}

fn authorize_create_task(
    identity: &Identity,
    req: &CreateTaskRequest,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    let status = match req.status.as_deref() {
        Some(raw) => parse_field::<TaskStatus>(raw, "status")?,
        None => TaskStatus::Todo,
    };
    if status != TaskStatus::Todo && !identity.role.can_override_status() {
        return Err(AccessError::authorization(
            "New tasks start in todo; only administrators may create them in another status",
        ));
    }

    let title = validate_required_text(req.title.as_deref(), "title", MAX_TITLE_LEN)?;
    let description = normalize_optional(req.description.as_deref());
    if let Some(description) = &description {
        validate_text_length(description, "description", MAX_DESCRIPTION_LEN)?;
    }
    let priority = match req.priority.as_deref() {
        Some(raw) => parse_field::<TaskPriority>(raw, "priority")?,
        None => TaskPriority::default(),
    };
    let due_date = due_date_field(req.due_date.as_deref())?;
    let assignee = match &req.assignee {
        Some(assignee) => Some(check_assignee(assignee, snapshot)?),
        None => None,
    };

    Ok(ApprovedWrite::CreateTask(NewTask {
        title,
        description,
        status,
        priority,
        due_date,
        assignee,
        owner: normalize_id(&identity.id),
    }))
}

fn authorize_update_task(
    identity: &Identity,
    target: &Task,
    patch: &UpdateTaskRequest,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    if identity.role.can_manage_all_tasks() {
        return admin_task_changes(target, patch, snapshot);
    }

    let is_assignee = own_employee(identity, &snapshot.employees)
        .map(|own| is_assigned_to_me(target, identity, own))
        .unwrap_or(false);
    if !is_assignee && !is_task_owner(target, identity) {
        return Err(AccessError::authorization(
            "Only the task's assignee or owner can update it",
        ));
    }

    if let Some(field) = patch.touched_fields().into_iter().find(|f| *f != "status") {
        return Err(AccessError::authorization(format!(
            "{} can only be changed by an administrator",
            field
        )));
    }

    let raw = patch
        .status
        .as_deref()
        .ok_or_else(|| AccessError::validation("status", "Status is required"))?;
    let next = parse_field::<TaskStatus>(raw, "status")?;

    if !target.status.can_advance_to(next) {
        return Err(AccessError::authorization(format!(
            "Cannot move task from {} to {}",
            target.status, next
        )));
    }

    Ok(ApprovedWrite::UpdateTask {
        id: target.id.clone(),
        changes: TaskChanges {
            status: Some(next),
            ..Default::default()
        },
    })
}

fn admin_task_changes(
    target: &Task,
    patch: &UpdateTaskRequest,
    snapshot: &Snapshot,
) -> AccessResult<ApprovedWrite> {
    if patch.touched_fields().is_empty() {
        return Err(AccessError::validation("body", "No fields to update"));
    }

    let mut changes = TaskChanges::default();

    if let Some(title) = patch.title.as_deref() {
        changes.title = Some(validate_required_text(Some(title), "title", MAX_TITLE_LEN)?);
    }
    changes.description = clearable_field(&patch.description, |v| {
        validate_text_length(v, "description", MAX_DESCRIPTION_LEN)
    })?;
    if let Some(raw) = patch.status.as_deref() {
        changes.status = Some(parse_field::<TaskStatus>(raw, "status")?);
    }
    if let Some(raw) = patch.priority.as_deref() {
        changes.priority = Some(parse_field::<TaskPriority>(raw, "priority")?);
    }
    changes.due_date = clearable_field(&patch.due_date, |v| {
        validate_due_date(v).map_err(|e| AccessError::validation("dueDate", e))
    })?;
    changes.assignee = match &patch.assignee {
        None => None,
        Some(None) => Some(None),
        Some(Some(assignee)) => Some(Some(check_assignee(assignee, snapshot)?)),
    };

    Ok(ApprovedWrite::UpdateTask {
        id: target.id.clone(),
        changes,
    })
}

fn authorize_delete_task(identity: &Identity, target: &Task) -> AccessResult<ApprovedWrite> {
    if !identity.role.can_manage_all_tasks() && !is_task_owner(target, identity) {
        return Err(AccessError::authorization(
            "Only the task's owner or an administrator can delete it",
        ));
    }
    Ok(ApprovedWrite::DeleteTask {
        id: target.id.clone(),
    })
}

/// The assignee must name an existing employee, by id or by email. It is
/// stored in the shape it was given.
fn check_assignee(assignee: &AssigneeRef, snapshot: &Snapshot) -> AccessResult<AssigneeRef> {
    if assignee.is_blank() {
        return Err(AccessError::validation(
            "assignee",
            "Assignee must identify an employee by id or email",
        ));
    }
    if resolve_assignee(assignee, &snapshot.employees).is_none() {
        let key = assignee.key();
        let reference = key.id.or(key.email).unwrap_or_default();
        return Err(AccessError::reference("assignee", reference));
    }
    Ok(assignee.clone())
}

fn parse_field<T>(raw: &str, field: &str) -> AccessResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| AccessError::validation(field, e))
}

fn optional_field(raw: Option<&str>, field: &str) -> AccessResult<Option<String>> {
    match normalize_optional(raw) {
        Some(value) => {
            validate_text_length(&value, field, MAX_FIELD_LEN)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// A patch to a nullable column. Absent leaves it alone; `null` or a blank
/// string clears it; anything else is trimmed and checked.
fn clearable_field<F>(
    patch: &Option<Option<String>>,
    check: F,
) -> AccessResult<Option<Option<String>>>
where
    F: Fn(&str) -> AccessResult<()>,
{
    let Some(raw) = patch else {
        return Ok(None);
    };
    match normalize_optional(raw.as_deref()) {
        Some(value) => {
            check(&value)?;
            Ok(Some(Some(value)))
        }
        None => Ok(Some(None)),
    }
}

fn due_date_field(raw: Option<&str>) -> AccessResult<Option<String>> {
    match normalize_optional(raw) {
        Some(value) => {
            validate_due_date(&value).map_err(|e| AccessError::validation("dueDate", e))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::visibility::fixtures::*;
    use crate::db::RecordId;

    fn snapshot() -> Snapshot {
        Snapshot {
            employees: vec![
                employee("e1", "u1", Some("ada@example.com")),
                employee("e2", "u2", Some("bob@example.com")),
            ],
            tasks: Vec::new(),
            account_ids: ["u1", "u2", "u3", "root"].iter().map(|s| s.to_string()).collect(),
        }
    }

    fn status_patch(status: &str) -> UpdateTaskRequest {
        UpdateTaskRequest {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn assert_authorization<T: std::fmt::Debug>(result: AccessResult<T>) {
        assert!(
            matches!(result, Err(AccessError::Authorization { .. })),
            "expected authorization error, got {:?}",
            result
        );
    }

    #[test]
    fn test_assignee_walks_status_forward() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let mut t = task("t1", "u2", by_id("e1"));

        let write = authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("in-progress") },
            &snap,
        )
        .unwrap();
        assert_eq!(
            write,
            ApprovedWrite::UpdateTask {
                id: "t1".to_string(),
                changes: TaskChanges {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                }
            }
        );

        t.status = TaskStatus::InProgress;
        assert!(authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("done") },
            &snap,
        )
        .is_ok());
    }

    #[test]
    fn test_skipping_to_done_is_rejected() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let t = task("t1", "u2", by_id("e1"));

        assert_authorization(authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("done") },
            &snap,
        ));
    }

    #[test]
    fn test_reverse_transition_is_rejected() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let mut t = task("t1", "u2", by_id("e1"));
        t.status = TaskStatus::Done;

        assert_authorization(authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("in-progress") },
            &snap,
        ));
    }

    #[test]
    fn test_admin_may_set_any_status() {
        let snap = snapshot();
        let t = task("t1", "u2", by_id("e1"));
        assert!(authorize_mutation(
            &admin("root"),
            Mutation::UpdateTask { target: &t, patch: &status_patch("done") },
            &snap,
        )
        .is_ok());
    }

    #[test]
    fn test_assignee_matched_by_snapshot_email_may_update_status() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let t = task("t1", "u2", by_snapshot(Some("stale"), Some("ada@example.com")));

        assert!(authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("in-progress") },
            &snap,
        )
        .is_ok());
    }

    #[test]
    fn test_unrelated_user_cannot_update_task() {
        let snap = snapshot();
        let bob = user("u2", "bob@example.com");
        let t = task("t1", "u3", by_id("e1"));

        assert_authorization(authorize_mutation(
            &bob,
            Mutation::UpdateTask { target: &t, patch: &status_patch("in-progress") },
            &snap,
        ));
    }

    #[test]
    fn test_non_admin_limited_to_status_field() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let t = task("t1", "u1", by_id("e1"));
        let patch = UpdateTaskRequest {
            title: Some("Renamed".to_string()),
            status: Some("in-progress".to_string()),
            ..Default::default()
        };

        assert_authorization(authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &patch },
            &snap,
        ));
    }

    #[test]
    fn test_invalid_status_value_is_validation_error() {
        let snap = snapshot();
        let ada = user("u1", "ada@example.com");
        let t = task("t1", "u2", by_id("e1"));

        let result = authorize_mutation(
            &ada,
            Mutation::UpdateTask { target: &t, patch: &status_patch("completed") },
            &snap,
        );
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "status"));
    }

    #[test]
    fn test_create_task_forces_owner_and_defaults() {
        let snap = snapshot();
        let req = CreateTaskRequest {
            title: Some("  Write report ".to_string()),
            assignee: by_id("e2"),
            ..Default::default()
        };

        let write =
            authorize_mutation(&user("u1", "ada@example.com"), Mutation::CreateTask(&req), &snap)
                .unwrap();
        match write {
            ApprovedWrite::CreateTask(new) => {
                assert_eq!(new.owner, "u1");
                assert_eq!(new.title, "Write report");
                assert_eq!(new.status, TaskStatus::Todo);
                assert_eq!(new.priority, TaskPriority::Medium);
                assert_eq!(new.assignee, by_id("e2"));
            }
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[test]
    fn test_create_task_missing_title_is_validation_error() {
        let snap = snapshot();
        let result = authorize_mutation(
            &admin("root"),
            Mutation::CreateTask(&CreateTaskRequest::default()),
            &snap,
        );
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "title"));
    }

    #[test]
    fn test_create_task_with_unknown_assignee_is_reference_error() {
        let snap = snapshot();
        let req = CreateTaskRequest {
            title: Some("Orphan".to_string()),
            assignee: by_id("ghost"),
            ..Default::default()
        };
        let result = authorize_mutation(&admin("root"), Mutation::CreateTask(&req), &snap);
        assert_eq!(result, Err(AccessError::reference("assignee", "ghost")));
    }

    #[test]
    fn test_non_admin_cannot_create_finished_task() {
        let snap = snapshot();
        let req = CreateTaskRequest {
            title: Some("Already done".to_string()),
            status: Some("done".to_string()),
            ..Default::default()
        };
        assert_authorization(authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::CreateTask(&req),
            &snap,
        ));
    }

    #[test]
    fn test_invalid_due_date_is_validation_error() {
        let snap = snapshot();
        let req = CreateTaskRequest {
            title: Some("Dated".to_string()),
            due_date: Some("next tuesday".to_string()),
            ..Default::default()
        };
        let result = authorize_mutation(&admin("root"), Mutation::CreateTask(&req), &snap);
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "dueDate"));
    }

    #[test]
    fn test_admin_can_unassign_task() {
        let snap = snapshot();
        let t = task("t1", "u2", by_id("e1"));
        let patch = UpdateTaskRequest {
            assignee: Some(None),
            ..Default::default()
        };
        let write = authorize_mutation(
            &admin("root"),
            Mutation::UpdateTask { target: &t, patch: &patch },
            &snap,
        )
        .unwrap();
        match write {
            ApprovedWrite::UpdateTask { changes, .. } => assert_eq!(changes.assignee, Some(None)),
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[test]
    fn test_delete_task_owner_or_admin_only() {
        let t = task("t1", "u1", by_id("e2"));
        assert!(authorize_mutation(&user("u1", "ada@example.com"), Mutation::DeleteTask(&t), &snapshot()).is_ok());
        assert!(authorize_mutation(&admin("root"), Mutation::DeleteTask(&t), &snapshot()).is_ok());
        // Being the assignee is not enough.
        assert_authorization(authorize_mutation(
            &user("u2", "bob@example.com"),
            Mutation::DeleteTask(&t),
            &snapshot(),
        ));
    }

    #[test]
    fn test_non_admin_cannot_delete_employee() {
        let snap = snapshot();
        let other = &snap.employees[1];
        assert_authorization(authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::DeleteEmployee(other),
            &snap,
        ));
        // Not even their own profile.
        let own = &snap.employees[0];
        assert_authorization(authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::DeleteEmployee(own),
            &snap,
        ));
        assert!(authorize_mutation(&admin("root"), Mutation::DeleteEmployee(other), &snap).is_ok());
    }

    #[test]
    fn test_self_registration_forces_owner() {
        let snap = snapshot();
        let req = CreateEmployeeRequest {
            name: Some("Cleo".to_string()),
            email: Some("cleo@example.com".to_string()),
            ..Default::default()
        };
        let write =
            authorize_mutation(&user("u3", "cleo@example.com"), Mutation::CreateEmployee(&req), &snap)
                .unwrap();
        match write {
            ApprovedWrite::CreateEmployee(new) => {
                assert_eq!(new.owner, "u3");
                assert_eq!(new.status, EmployeeStatus::Active);
            }
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[test]
    fn test_user_cannot_create_profile_for_someone_else() {
        let snap = snapshot();
        let req = CreateEmployeeRequest {
            name: Some("Cleo".to_string()),
            owner: Some(RecordId::new("u2")),
            ..Default::default()
        };
        assert_authorization(authorize_mutation(
            &user("u3", "cleo@example.com"),
            Mutation::CreateEmployee(&req),
            &snap,
        ));
    }

    #[test]
    fn test_second_profile_for_account_is_rejected() {
        let snap = snapshot();
        let req = CreateEmployeeRequest {
            name: Some("Ada again".to_string()),
            ..Default::default()
        };
        let result =
            authorize_mutation(&user("u1", "ada@example.com"), Mutation::CreateEmployee(&req), &snap);
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "owner"));
    }

    #[test]
    fn test_admin_create_employee_requires_existing_owner() {
        let snap = snapshot();
        let missing = CreateEmployeeRequest {
            name: Some("Dana".to_string()),
            ..Default::default()
        };
        let result = authorize_mutation(&admin("root"), Mutation::CreateEmployee(&missing), &snap);
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "owner"));

        let unknown = CreateEmployeeRequest {
            name: Some("Dana".to_string()),
            owner: Some(RecordId::new("nobody")),
            ..Default::default()
        };
        assert_eq!(
            authorize_mutation(&admin("root"), Mutation::CreateEmployee(&unknown), &snap),
            Err(AccessError::reference("owner", "nobody"))
        );

        let ok = CreateEmployeeRequest {
            name: Some("Dana".to_string()),
            owner: Some(RecordId::new("u3")),
            status: Some("inactive".to_string()),
            ..Default::default()
        };
        assert!(authorize_mutation(&admin("root"), Mutation::CreateEmployee(&ok), &snap).is_ok());
    }

    #[test]
    fn test_owner_edits_profile_fields_only() {
        let snap = snapshot();
        let own = &snap.employees[0];
        let ada = user("u1", "ada@example.com");

        let allowed = UpdateEmployeeRequest {
            phone: Some(Some("555-0100".to_string())),
            position: Some(Some("Engineer".to_string())),
            ..Default::default()
        };
        assert!(authorize_mutation(
            &ada,
            Mutation::UpdateEmployee { target: own, patch: &allowed },
            &snap
        )
        .is_ok());

        let status = UpdateEmployeeRequest {
            status: Some("inactive".to_string()),
            ..Default::default()
        };
        assert_authorization(authorize_mutation(
            &ada,
            Mutation::UpdateEmployee { target: own, patch: &status },
            &snap,
        ));

        let owner = UpdateEmployeeRequest {
            owner: Some(Some(RecordId::new("u3"))),
            ..Default::default()
        };
        assert_authorization(authorize_mutation(
            &ada,
            Mutation::UpdateEmployee { target: own, patch: &owner },
            &snap,
        ));
    }

    #[test]
    fn test_user_cannot_edit_other_profile() {
        let snap = snapshot();
        let other = &snap.employees[1];
        let patch = UpdateEmployeeRequest {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        };
        assert_authorization(authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::UpdateEmployee { target: other, patch: &patch },
            &snap,
        ));
    }

    #[test]
    fn test_invalid_employee_email_is_validation_error() {
        let snap = snapshot();
        let own = &snap.employees[0];
        let patch = UpdateEmployeeRequest {
            email: Some(Some("not-an-email".to_string())),
            ..Default::default()
        };
        let result = authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::UpdateEmployee { target: own, patch: &patch },
            &snap,
        );
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "email"));
    }

    #[test]
    fn test_admin_null_clears_task_fields() {
        let snap = snapshot();
        let t = task("t1", "u2", by_id("e1"));

        let patch: UpdateTaskRequest = serde_json::from_str(r#"{"dueDate": null}"#).unwrap();
        let write = authorize_mutation(
            &admin("root"),
            Mutation::UpdateTask { target: &t, patch: &patch },
            &snap,
        )
        .unwrap();
        assert_eq!(
            write,
            ApprovedWrite::UpdateTask {
                id: "t1".to_string(),
                changes: TaskChanges {
                    due_date: Some(None),
                    ..Default::default()
                }
            }
        );

        let patch: UpdateTaskRequest =
            serde_json::from_str(r#"{"dueDate": null, "title": "x", "description": "  "}"#)
                .unwrap();
        match authorize_mutation(
            &admin("root"),
            Mutation::UpdateTask { target: &t, patch: &patch },
            &snap,
        )
        .unwrap()
        {
            ApprovedWrite::UpdateTask { changes, .. } => {
                assert_eq!(changes.title, Some("x".to_string()));
                assert_eq!(changes.due_date, Some(None));
                assert_eq!(changes.description, Some(None));
                assert_eq!(changes.priority, None);
            }
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[test]
    fn test_owner_null_clears_profile_field() {
        let snap = snapshot();
        let own = &snap.employees[0];
        let patch: UpdateEmployeeRequest = serde_json::from_str(r#"{"phone": null}"#).unwrap();

        match authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::UpdateEmployee { target: own, patch: &patch },
            &snap,
        )
        .unwrap()
        {
            ApprovedWrite::UpdateEmployee { changes, .. } => {
                assert_eq!(changes.phone, Some(None));
                assert_eq!(changes.email, None);
            }
            other => panic!("unexpected write {:?}", other),
        }

        // Clearing is still an edit of an admin-only field.
        let patch: UpdateEmployeeRequest =
            serde_json::from_str(r#"{"department": null}"#).unwrap();
        assert_authorization(authorize_mutation(
            &user("u1", "ada@example.com"),
            Mutation::UpdateEmployee { target: own, patch: &patch },
            &snap,
        ));
    }

    #[test]
    fn test_update_with_bad_due_date_is_validation_error() {
        let snap = snapshot();
        let t = task("t1", "u2", by_id("e1"));
        let patch: UpdateTaskRequest =
            serde_json::from_str(r#"{"dueDate": "someday"}"#).unwrap();
        let result = authorize_mutation(
            &admin("root"),
            Mutation::UpdateTask { target: &t, patch: &patch },
            &snap,
        );
        assert!(matches!(result, Err(AccessError::Validation { ref field, .. }) if field == "dueDate"));
    }

    #[test]
    fn test_mutation_metadata() {
        let t = task("t1", "u1", None);
        let m = Mutation::DeleteTask(&t);
        assert_eq!(m.operation(), Operation::Delete);
        assert_eq!(m.resource_type(), "task");
        assert_eq!(m.target_id(), Some("t1"));
        assert_eq!(
            ApprovedWrite::DeleteTask { id: "t1".to_string() }.action(),
            "task.delete"
        );
    }
}
