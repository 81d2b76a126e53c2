//! Database models split into domain-specific modules.

pub mod audit;
pub mod common;
pub mod employee;
pub mod task;
pub mod user;

pub use audit::*;
pub use common::*;
pub use employee::*;
pub use task::*;
pub use user::*;
