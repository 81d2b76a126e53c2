//! Dashboard summaries derived from a resolved [`VisibilityView`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::db::{EmployeeStatus, Task, TaskStatus};

use super::identity::Identity;
use super::visibility::VisibilityView;

const RECENT_TASKS: usize = 4;
const UPCOMING_TASKS: usize = 5;

/// Task counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl StatusCounts {
    pub fn tally(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut counts, task| {
            counts.total += 1;
            match task.status {
                TaskStatus::Todo => counts.todo += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Done => counts.done += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    pub total_employees: usize,
    pub active_employees: usize,
    pub tasks: StatusCounts,
    pub recent_tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalSummary {
    /// The caller has no employee profile yet; the client should prompt for one
    pub profile_required: bool,
    pub tasks: StatusCounts,
    pub upcoming_tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Dashboard {
    Admin(AdminSummary),
    Personal(PersonalSummary),
}

/// Admins get the organisation-wide summary, everyone else a personal one.
pub fn build_dashboard(identity: &Identity, view: &VisibilityView) -> Dashboard {
    if identity.is_admin() {
        Dashboard::Admin(admin_summary(view))
    } else {
        Dashboard::Personal(personal_summary(view))
    }
}

pub fn admin_summary(view: &VisibilityView) -> AdminSummary {
    let active_employees = view
        .visible_employees
        .iter()
        .filter(|e| e.status == EmployeeStatus::Active)
        .count();

    let mut recent: Vec<&Task> = view.visible_tasks.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    AdminSummary {
        total_employees: view.visible_employees.len(),
        active_employees,
        tasks: StatusCounts::tally(&view.visible_tasks),
        recent_tasks: recent.into_iter().take(RECENT_TASKS).cloned().collect(),
    }
}

pub fn personal_summary(view: &VisibilityView) -> PersonalSummary {
    let mut upcoming: Vec<&Task> = view
        .my_tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .collect();
    // Tasks without a (parseable) due date sort last.
    upcoming.sort_by_key(|t| {
        let due = t.due_date.as_deref().and_then(parse_due_date);
        (due.is_none(), due, t.created_at.clone())
    });

    PersonalSummary {
        profile_required: view.profile.is_missing(),
        tasks: StatusCounts::tally(&view.my_tasks),
        upcoming_tasks: upcoming.into_iter().take(UPCOMING_TASKS).cloned().collect(),
    }
}

/// Due dates are stored either as `YYYY-MM-DD` or as RFC 3339 timestamps.
fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
