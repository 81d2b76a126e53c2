//! Visibility resolution.
//!
//! Every view of the employee directory and task board is derived here from a
//! full snapshot of both, for one identity. Callers never re-derive
//! assignment matches themselves. Resolution is a pure function: it does no
//! I/O and never fails; anything the identity may not see is filtered out.

use serde::Serialize;

use crate::db::{emails_match, normalize_id, AssigneeRef, Employee, Task};

use super::identity::Identity;

/// Whether the identity has a linked employee profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ProfileStatus {
    Linked {
        #[serde(rename = "employeeId")]
        employee_id: String,
    },
    /// Employee-scoped pages must prompt for a profile instead of rendering
    /// an empty task list.
    Missing,
}

impl ProfileStatus {
    pub fn is_missing(&self) -> bool {
        matches!(self, ProfileStatus::Missing)
    }
}

/// Everything one identity may see.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityView {
    pub visible_employees: Vec<Employee>,
    pub visible_tasks: Vec<Task>,
    pub my_tasks: Vec<Task>,
    pub profile: ProfileStatus,
}

/// Compute the view of `employees` and `tasks` available to `identity`.
pub fn resolve_visibility(
    identity: &Identity,
    employees: &[Employee],
    tasks: &[Task],
) -> VisibilityView {
    let own = own_employee(identity, employees);

    // The directory is browsable by everyone; only mutation rights differ.
    let visible_employees = employees.to_vec();

    let visible_tasks = tasks
        .iter()
        .filter(|task| can_view_task(identity, task, employees))
        .cloned()
        .collect();

    let my_tasks = match own {
        Some(employee) => tasks
            .iter()
            .filter(|task| is_my_task(task, identity, employee))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let profile = match own {
        Some(employee) => ProfileStatus::Linked {
            employee_id: employee.id.clone(),
        },
        None => ProfileStatus::Missing,
    };

    VisibilityView {
        visible_employees,
        visible_tasks,
        my_tasks,
        profile,
    }
}

/// The employee profile owned by `identity`, if any.
pub fn own_employee<'a>(identity: &Identity, employees: &'a [Employee]) -> Option<&'a Employee> {
    let caller = normalize_id(&identity.id);
    employees.iter().find(|e| normalize_id(&e.owner) == caller)
}

/// Whether `task` belongs in the caller's own task list.
///
/// A task is "mine" when any of these hold:
/// 1. the assignee is a snapshot whose id is my employee id, or whose email
///    is my account email;
/// 2. the assignee is a bare id equal to my employee id;
/// 3. I created the task, wherever it is assigned.
pub fn is_my_task(task: &Task, identity: &Identity, own: &Employee) -> bool {
    is_assigned_to_me(task, identity, own) || is_task_owner(task, identity)
}

/// Rules 1 and 2 of [`is_my_task`]: the assignment points at the caller.
pub fn is_assigned_to_me(task: &Task, identity: &Identity, own: &Employee) -> bool {
    let Some(assignee) = &task.assignee else {
        return false;
    };
    let key = assignee.key();
    let own_id = normalize_id(&own.id);

    if key.id.as_deref() == Some(own_id.as_str()) {
        return true;
    }

    match assignee {
        AssigneeRef::BySnapshot(_) => {
            emails_match(key.email.as_deref(), Some(identity.email.as_str()))
        }
        AssigneeRef::ById(_) => false,
    }
}

pub fn is_task_owner(task: &Task, identity: &Identity) -> bool {
    normalize_id(&task.owner) == normalize_id(&identity.id)
}

/// Whether an assignee reference points at `employee`, by id or by email.
pub fn assignee_matches(assignee: &AssigneeRef, employee: &Employee) -> bool {
    let key = assignee.key();
    if key.id.as_deref() == Some(normalize_id(&employee.id).as_str()) {
        return true;
    }
    emails_match(key.email.as_deref(), employee.email.as_deref())
}

/// Find the employee an assignee reference points at. An id match takes
/// precedence over an email match.
pub fn resolve_assignee<'a>(
    assignee: &AssigneeRef,
    employees: &'a [Employee],
) -> Option<&'a Employee> {
    let key = assignee.key();
    if let Some(id) = key.id.as_deref() {
        if let Some(found) = employees.iter().find(|e| normalize_id(&e.id) == id) {
            return Some(found);
        }
    }
    let email = key.email?;
    employees
        .iter()
        .find(|e| emails_match(Some(email.as_str()), e.email.as_deref()))
}

/// A task whose assignee is set but resolves to no employee.
pub fn has_dangling_assignee(task: &Task, employees: &[Employee]) -> bool {
    match &task.assignee {
        Some(assignee) => resolve_assignee(assignee, employees).is_none(),
        None => false,
    }
}

/// Admins see every task. Everyone else sees the whole board except tasks
/// with a dangling assignee, which only their owner may see.
pub fn can_view_task(identity: &Identity, task: &Task, employees: &[Employee]) -> bool {
    identity.is_admin()
        || is_task_owner(task, identity)
        || !has_dangling_assignee(task, employees)
}

/// Tasks from `tasks` assigned to `employee`.
pub fn tasks_assigned_to<'a>(employee: &Employee, tasks: &'a [Task]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| {
            task.assignee
                .as_ref()
                .map(|assignee| assignee_matches(assignee, employee))
                .unwrap_or(false)
        })
        .collect()
}
