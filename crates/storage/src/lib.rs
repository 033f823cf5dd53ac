use std::{str::FromStr, time::Duration};

use sqlx::{
    migrate::MigrateError,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
    },
    Row, SqlitePool,
};
use thiserror::Error;

use employee_directory_core::{Employee, EmployeeStore, PageRequest};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// An in-memory database disappears with its last connection, so for those
    /// URLs the pool is pinned to one connection that is never recycled.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(5000));

        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to interact with the employees table.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const EMPLOYEE_COLUMNS: &str = "id, first_name, last_name, email";

/// Repository responsible for the `employees` table.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Same predicate as [`EmployeeStore::find_by_first_and_last_name`], written as raw
    /// SQL with numbered parameters and decoded column by column.
    pub async fn find_by_first_and_last_name_numbered(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Employee>, EmployeeStoreError> {
        let row = sqlx::query(
            "SELECT e.id, e.first_name, e.last_name, e.email \
               FROM employees AS e \
              WHERE e.first_name = ?1 AND e.last_name = ?2 \
              ORDER BY e.id \
              LIMIT 1",
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_employee).transpose()
    }

    /// Named-parameter form of the same lookup. SQLite numbers `:first_name` and
    /// `:last_name` in order of first appearance, so binds stay positional.
    pub async fn find_by_first_and_last_name_named(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Employee>, EmployeeStoreError> {
        let row = sqlx::query(
            "SELECT e.id, e.first_name, e.last_name, e.email \
               FROM employees AS e \
              WHERE e.first_name = :first_name AND e.last_name = :last_name \
              ORDER BY e.id \
              LIMIT 1",
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_employee).transpose()
    }

    /// Removes every employee row.
    pub async fn delete_all(&self) -> Result<u64, EmployeeStoreError> {
        let result = sqlx::query("DELETE FROM employees")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<u64, EmployeeStoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

impl EmployeeStore for EmployeeRepository {
    type Error = EmployeeStoreError;

    async fn save(&self, employee: Employee) -> Result<Employee, Self::Error> {
        let row = match employee.id {
            None => {
                sqlx::query_as::<_, EmployeeRow>(&format!(
                    "INSERT INTO employees (first_name, last_name, email) \
                     VALUES (?, ?, ?) \
                     RETURNING {EMPLOYEE_COLUMNS}"
                ))
                .bind(&employee.first_name)
                .bind(&employee.last_name)
                .bind(&employee.email)
                .fetch_one(&self.pool)
                .await?
            }
            Some(id) => {
                sqlx::query_as::<_, EmployeeRow>(&format!(
                    "INSERT INTO employees (id, first_name, last_name, email) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(id) DO UPDATE \
                     SET first_name = excluded.first_name, \
                         last_name = excluded.last_name, \
                         email = excluded.email \
                     RETURNING {EMPLOYEE_COLUMNS}"
                ))
                .bind(id)
                .bind(&employee.first_name)
                .bind(&employee.last_name)
                .bind(&employee.email)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(row.into_domain())
    }

    async fn find_page(&self, page: PageRequest) -> Result<Vec<Employee>, Self::Error> {
        let rows = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(clamp_to_i64(page.limit))
        .bind(clamp_to_i64(page.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeRow::into_domain).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Employee>, Self::Error> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, Self::Error> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = ? ORDER BY id LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    async fn find_by_first_and_last_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Employee>, Self::Error> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees \
             WHERE first_name = ? AND last_name = ? \
             ORDER BY id LIMIT 1"
        ))
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    async fn delete(&self, employee: &Employee) -> Result<(), Self::Error> {
        match employee.id {
            Some(id) => self.delete_by_id(id).await,
            None => Ok(()),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), Self::Error> {
        sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_employee(row: &SqliteRow) -> Result<Employee, EmployeeStoreError> {
    let id: i64 = row.try_get("id")?;
    Ok(Employee {
        id: Some(id),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
    })
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Row shape of the `employees` table.
#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
}

impl EmployeeRow {
    fn into_domain(self) -> Employee {
        Employee {
            id: Some(self.id),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        }
    }
}

/// Errors that can occur while reading or writing employees.
#[derive(Debug, Error)]
pub enum EmployeeStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
