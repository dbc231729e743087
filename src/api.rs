//! REST binding of the roster and attendance operations.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::{self, creates, proceeds, responds, Payload};
use crate::models::{AttendanceSession, EntryDraft, SessionSummary, Student, StudentDraft};
use crate::rules::{BulkOutcome, Registry};

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/api/students", get(list_students).post(add_student))
        .route("/api/students/bulk", post(add_students_bulk))
        .route(
            "/api/students/:id",
            put(update_student).delete(delete_student),
        )
        .route("/api/attendance", get(list_sessions).post(create_session))
        .route(
            "/api/attendance/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/api/attendance/:id/summary", get(session_summary))
        .fallback(err::handler404.into_service())
        .layer(Extension(registry))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchStudents {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateStudents {
    /// Rows are decoded one by one so a malformed row fails alone.
    #[serde(default)]
    pub students: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    #[serde(default)]
    pub group_name: String,
    #[serde(default, alias = "entries")]
    pub records: Vec<EntryDraft>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentList {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionList {
    pub sessions: Vec<AttendanceSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub message: String,
    #[serde(flatten)]
    pub outcome: BulkOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Acknowledged {
    pub message: String,
}

impl Acknowledged {
    fn of<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

async fn list_students(
    Extension(registry): Extension<Arc<Registry>>,
    query: Result<Query<SearchStudents>, QueryRejection>,
) -> Payload<StudentList> {
    let Query(query) = query?;
    let students = match query.search {
        Some(term) => registry.search_students(&term).await?,
        None => registry.list_students().await?,
    };
    proceeds(StudentList { students })
}

async fn add_student(
    Extension(registry): Extension<Arc<Registry>>,
    body: Result<Json<StudentDraft>, JsonRejection>,
) -> Payload<Student> {
    let Json(draft) = body?;
    creates(registry.add_student(draft).await?)
}

async fn add_students_bulk(
    Extension(registry): Extension<Arc<Registry>>,
    body: Result<Json<BulkCreateStudents>, JsonRejection>,
) -> Payload<BulkReport> {
    let Json(body) = body?;
    let outcome = registry.add_students_bulk(body.students).await?;
    let status = match outcome {
        BulkOutcome::Success { .. } => StatusCode::CREATED,
        BulkOutcome::PartialFailure { .. } => StatusCode::MULTI_STATUS,
        BulkOutcome::TotalFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    responds(
        status,
        BulkReport {
            message: outcome.message(),
            outcome,
        },
    )
}

async fn update_student(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StudentDraft>, JsonRejection>,
) -> Payload<Student> {
    let Path(id) = id?;
    let Json(draft) = body?;
    proceeds(registry.update_student(id, draft).await?)
}

async fn delete_student(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Payload<Acknowledged> {
    let Path(id) = id?;
    registry.delete_student(id).await?;
    proceeds(Acknowledged::of("Student deleted successfully"))
}

async fn create_session(
    Extension(registry): Extension<Arc<Registry>>,
    body: Result<Json<SessionBody>, JsonRejection>,
) -> Payload<AttendanceSession> {
    let Json(body) = body?;
    creates(
        registry
            .create_session(&body.group_name, body.records)
            .await?,
    )
}

async fn list_sessions(Extension(registry): Extension<Arc<Registry>>) -> Payload<SessionList> {
    proceeds(SessionList {
        sessions: registry.list_sessions().await?,
    })
}

async fn get_session(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Payload<AttendanceSession> {
    let Path(id) = id?;
    proceeds(registry.get_session(id).await?)
}

async fn session_summary(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Payload<SessionSummary> {
    let Path(id) = id?;
    proceeds(registry.session_summary(id).await?)
}

async fn update_session(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SessionBody>, JsonRejection>,
) -> Payload<AttendanceSession> {
    let Path(id) = id?;
    let Json(body) = body?;
    proceeds(
        registry
            .update_session(id, &body.group_name, body.records)
            .await?,
    )
}

async fn delete_session(
    Extension(registry): Extension<Arc<Registry>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Payload<Acknowledged> {
    let Path(id) = id?;
    registry.delete_session(id).await?;
    proceeds(Acknowledged::of("Attendance record deleted"))
}
