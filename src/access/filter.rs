//! Search and status filters for the employee and task list pages.
//!
//! Filters narrow an already resolved view; they never widen it.

use serde::Deserialize;

use crate::db::{Employee, Task};

/// `all` and an empty value both mean "no filter".
fn active(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty() && v != "all")
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Which task list to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    /// Every task visible to the caller
    #[default]
    All,
    /// Tasks assigned to or owned by the caller
    Mine,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub scope: TaskScope,
}

impl TaskFilter {
    /// Case-insensitive match on title or description, exact match on status.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = active(&self.status) {
            if task.status.to_string() != status {
                return false;
            }
        }
        match active(&self.search) {
            Some(needle) => {
                contains_ci(Some(&task.title), &needle)
                    || contains_ci(task.description.as_deref(), &needle)
            }
            None => true,
        }
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    pub search: Option<String>,
    pub status: Option<String>,
}

impl EmployeeFilter {
    /// Case-insensitive match on name or email, exact match on status.
    pub fn matches(&self, employee: &Employee) -> bool {
        if let Some(status) = active(&self.status) {
            if employee.status.to_string() != status {
                return false;
            }
        }
        match active(&self.search) {
            Some(needle) => {
                contains_ci(Some(&employee.name), &needle)
                    || contains_ci(employee.email.as_deref(), &needle)
            }
            None => true,
        }
    }

    pub fn apply<'a>(&self, employees: &'a [Employee]) -> Vec<&'a Employee> {
        employees.iter().filter(|e| self.matches(e)).collect()
    }
}
