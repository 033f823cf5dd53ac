use serde::{Deserialize, Serialize};

/// Employee record as persisted in the `employees` table.
///
/// `id` is `None` until the record has been saved for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Employee {
    /// Builds an unsaved employee.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }
}

/// Window over the employee table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 10;

    /// Builds a window from a zero-based page number and a page size.
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            offset: u64::from(page) * u64::from(size),
            limit: u64::from(size),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::of(0, Self::DEFAULT_SIZE)
    }
}
