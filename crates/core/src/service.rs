use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::store::EmployeeStore;
use crate::types::{Employee, PageRequest};

/// Employee operations on top of an [`EmployeeStore`].
///
/// Apart from the email uniqueness check in [`EmployeeService::create`] every
/// method delegates to the store unchanged.
pub struct EmployeeService<S> {
    store: S,
    create_lock: Mutex<()>,
}

impl<S: EmployeeStore> EmployeeService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a new employee unless another record already uses the same email.
    ///
    /// The lookup and the insert run under one lock, so two concurrent creates
    /// through this service cannot both pass the check. Writers that bypass the
    /// service are not covered.
    pub async fn create(
        &self,
        employee: Employee,
    ) -> Result<Employee, EmployeeServiceError<S::Error>> {
        let _guard = self.create_lock.lock().await;

        let existing = self
            .store
            .find_by_email(&employee.email)
            .await
            .map_err(EmployeeServiceError::Store)?;
        if let Some(existing) = existing {
            warn!(
                stage = "employees",
                email = %employee.email,
                existing_id = ?existing.id,
                "rejecting employee with duplicate email"
            );
            return Err(EmployeeServiceError::DuplicateEmail(employee.email));
        }

        self.store
            .save(employee)
            .await
            .map_err(EmployeeServiceError::Store)
    }

    pub async fn list(
        &self,
        page: PageRequest,
    ) -> Result<Vec<Employee>, EmployeeServiceError<S::Error>> {
        self.store
            .find_page(page)
            .await
            .map_err(EmployeeServiceError::Store)
    }

    pub async fn get_by_id(
        &self,
        id: i64,
    ) -> Result<Option<Employee>, EmployeeServiceError<S::Error>> {
        self.store
            .find_by_id(id)
            .await
            .map_err(EmployeeServiceError::Store)
    }

    /// Saves the employee as-is. Callers check existence first when they need "not found".
    pub async fn update(
        &self,
        employee: Employee,
    ) -> Result<Employee, EmployeeServiceError<S::Error>> {
        self.store
            .save(employee)
            .await
            .map_err(EmployeeServiceError::Store)
    }

    pub async fn delete(&self, employee: &Employee) -> Result<(), EmployeeServiceError<S::Error>> {
        self.store
            .delete(employee)
            .await
            .map_err(EmployeeServiceError::Store)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<(), EmployeeServiceError<S::Error>> {
        self.store
            .delete_by_id(id)
            .await
            .map_err(EmployeeServiceError::Store)
    }
}

/// Errors returned by [`EmployeeService`].
#[derive(Debug, Error)]
pub enum EmployeeServiceError<E> {
    #[error("employee already exists with email: {0}")]
    DuplicateEmail(String),
    #[error(transparent)]
    Store(E),
}
