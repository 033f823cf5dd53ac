//! Domain layer for the employee directory.
//!
//! Holds the `Employee` entity, the storage contract the service depends on
//! and the service enforcing email uniqueness. The crate has no knowledge of
//! SQL or HTTP; those live in the storage and app crates.
pub mod service;
pub mod store;
pub mod types;

pub use service::{EmployeeService, EmployeeServiceError};
pub use store::EmployeeStore;
pub use types::{Employee, PageRequest};
