use std::future::Future;

use crate::types::{Employee, PageRequest};

/// Persistence contract over the employee table.
///
/// Implementations surface only storage-engine failures through
/// [`EmployeeStore::Error`]; a missing row is `Ok(None)` for lookups and a
/// no-op for deletes.
pub trait EmployeeStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts the employee when `id` is `None`, otherwise overwrites the row with that id.
    fn save(
        &self,
        employee: Employee,
    ) -> impl Future<Output = Result<Employee, Self::Error>> + Send;

    /// Returns the rows inside `page`, in insertion order.
    fn find_page(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<Employee>, Self::Error>> + Send;

    fn find_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send;

    /// Exact match on the email column.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send;

    /// Exact match on both name columns. The lowest id wins when several rows match.
    fn find_by_first_and_last_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send;

    /// Removes the row identified by `employee.id`. Unsaved employees are ignored.
    fn delete(&self, employee: &Employee) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete_by_id(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
