use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AttendanceStore, RosterStore, StoreError, StoreResult};
use crate::models::{AttendanceEntry, AttendanceSession, Student};

const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS students (
        id UUID PRIMARY KEY,
        roll_number TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS attendance_sessions (
        id UUID PRIMARY KEY,
        group_name TEXT NOT NULL,
        date TIMESTAMPTZ NOT NULL,
        entries JSONB NOT NULL DEFAULT '[]'::jsonb
    )",
    "CREATE INDEX IF NOT EXISTS attendance_sessions_date_idx
        ON attendance_sessions (date DESC)",
];

/// Postgres-backed roster and attendance storage.
#[derive(Debug, Clone)]
pub struct PgStore {
    pg: PgPool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    group_name: String,
    date: DateTime<Utc>,
    entries: Json<Vec<AttendanceEntry>>,
}

impl From<SessionRow> for AttendanceSession {
    fn from(row: SessionRow) -> Self {
        AttendanceSession {
            id: row.id,
            group_name: row.group_name,
            date: row.date,
            entries: row.entries.0,
        }
    }
}

impl PgStore {
    pub fn new(pg: PgPool) -> Self {
        Self { pg }
    }

    /// Creates tables and indexes if they are missing.
    pub async fn prepare(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pg).await?;
        }
        log::info!("Database schema is ready");
        Ok(())
    }
}

fn translate_write(err: sqlx::Error, roll_number: &str) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Duplicate {
                roll_number: roll_number.to_string(),
            };
        }
    }
    log::error!("Student write failed: {}", err);
    StoreError::from(err)
}

#[async_trait]
impl RosterStore for PgStore {
    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let students =
            sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY roll_number ASC, id ASC")
                .fetch_all(&self.pg)
                .await?;
        Ok(students)
    }

    async fn get_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pg)
            .await?;
        Ok(student)
    }

    async fn find_by_roll_number(&self, roll_number: &str) -> StoreResult<Option<Student>> {
        let student =
            sqlx::query_as::<_, Student>("SELECT * FROM students WHERE roll_number = $1 LIMIT 1")
                .bind(roll_number)
                .fetch_optional(&self.pg)
                .await?;
        Ok(student)
    }

    async fn insert_student(&self, student: &Student) -> StoreResult<()> {
        sqlx::query("INSERT INTO students (id, roll_number, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(student.id)
            .bind(&student.roll_number)
            .bind(&student.name)
            .bind(student.created_at)
            .execute(&self.pg)
            .await
            .map_err(|err| translate_write(err, &student.roll_number))?;
        Ok(())
    }

    async fn update_student(&self, student: &Student) -> StoreResult<()> {
        let res = sqlx::query("UPDATE students SET roll_number = $1, name = $2 WHERE id = $3")
            .bind(&student.roll_number)
            .bind(&student.name)
            .bind(student.id)
            .execute(&self.pg)
            .await
            .map_err(|err| translate_write(err, &student.roll_number))?;

        if res.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pg)
            .await?;

        if res.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn insert_session(&self, session: &AttendanceSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO attendance_sessions (id, group_name, date, entries) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id)
        .bind(&session.group_name)
        .bind(session.date)
        .bind(Json(&session.entries))
        .execute(&self.pg)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<AttendanceSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, group_name, date, entries FROM attendance_sessions WHERE id = $1 LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pg)
        .await?;
        Ok(row.map(AttendanceSession::from))
    }

    async fn list_sessions(&self) -> StoreResult<Vec<AttendanceSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, group_name, date, entries FROM attendance_sessions ORDER BY date DESC",
        )
        .fetch_all(&self.pg)
        .await?;
        Ok(rows.into_iter().map(AttendanceSession::from).collect())
    }

    async fn replace_session(&self, session: &AttendanceSession) -> StoreResult<()> {
        let res = sqlx::query(
            "UPDATE attendance_sessions SET group_name = $1, date = $2, entries = $3 WHERE id = $4",
        )
        .bind(&session.group_name)
        .bind(session.date)
        .bind(Json(&session.entries))
        .bind(session.id)
        .execute(&self.pg)
        .await?;

        if res.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM attendance_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pg)
            .await?;

        if res.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
