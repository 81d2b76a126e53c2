//! Access control core: who may see and change which employees and tasks.
//!
//! Nothing in here performs I/O. Handlers load a [`Snapshot`], ask the
//! [`visibility`] resolver what the caller may see and the [`gateway`] whether
//! a write is allowed, then persist the [`ApprovedWrite`].

pub mod dashboard;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod identity;
pub mod validation;
pub mod visibility;

pub use dashboard::{build_dashboard, AdminSummary, Dashboard, PersonalSummary, StatusCounts};
pub use error::{AccessError, AccessResult};
pub use filter::{EmployeeFilter, TaskFilter, TaskScope};
pub use gateway::{authorize_mutation, ApprovedWrite, Mutation, Operation, Snapshot};
pub use identity::{Identity, Role};
pub use visibility::{resolve_visibility, ProfileStatus, VisibilityView};
