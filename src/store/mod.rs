//! Storage collaborators for the roster and attendance history.
//!
//! Implementations own the roll-number uniqueness constraint: whatever the
//! rules engine checks beforehand is advisory, a rejected write here is final.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AttendanceSession, Student};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("roll number `{roll_number}` already exists")]
    Duplicate { roll_number: String },
    #[error("record does not exist")]
    NotFound,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    /// All students, ordered by roll number ascending.
    async fn list_students(&self) -> StoreResult<Vec<Student>>;

    async fn get_student(&self, id: Uuid) -> StoreResult<Option<Student>>;

    async fn find_by_roll_number(&self, roll_number: &str) -> StoreResult<Option<Student>>;

    /// Fails with `Duplicate` if the roll number is taken.
    async fn insert_student(&self, student: &Student) -> StoreResult<()>;

    /// Overwrites roll number and name of the student with `student.id`.
    /// Fails with `NotFound` or `Duplicate`.
    async fn update_student(&self, student: &Student) -> StoreResult<()>;

    async fn delete_student(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert_session(&self, session: &AttendanceSession) -> StoreResult<()>;

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<AttendanceSession>>;

    /// All sessions, most recent `date` first.
    async fn list_sessions(&self) -> StoreResult<Vec<AttendanceSession>>;

    /// Replaces the stored document with the same id. Fails with `NotFound`.
    async fn replace_session(&self, session: &AttendanceSession) -> StoreResult<()>;

    async fn delete_session(&self, id: Uuid) -> StoreResult<()>;
}
