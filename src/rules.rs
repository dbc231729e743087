//! Consistency rules between the roster and attendance history.
//!
//! Every write passes through [`Registry`], which:
//! - trims and validates input before it reaches storage,
//! - checks roll-number uniqueness on insert *and* update (advisory; the
//!   store's constraint has the last word and is translated, never retried),
//! - isolates per-item failures in bulk roster inserts,
//! - never cascades a student deletion into attendance sessions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::models::{
    AttendanceEntry, AttendanceSession, AttendanceStatus, BulkRow, EntryDraft, SessionSummary,
    Student, StudentDraft,
};
use crate::store::{AttendanceStore, MemoryStore, RosterStore, StoreError};

pub type RuleResult<T> = Result<T, RuleError>;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0}")]
    Validation(String),
    #[error("Roll Number `{roll_number}` already exists.")]
    DuplicateKey { roll_number: String },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RuleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { roll_number } => RuleError::DuplicateKey { roll_number },
            other => RuleError::Store(other),
        }
    }
}

fn missing(entity: &'static str, id: Uuid) -> impl FnOnce(StoreError) -> RuleError {
    move |err| match err {
        StoreError::NotFound => RuleError::NotFound { entity, id },
        other => RuleError::from(other),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub roll_number: String,
    pub reason: String,
}

/// Result of a best-effort bulk roster insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome")]
pub enum BulkOutcome {
    Success {
        #[serde(rename = "insertedCount")]
        inserted_count: usize,
    },
    PartialFailure {
        #[serde(rename = "insertedCount")]
        inserted_count: usize,
        failures: Vec<BulkFailure>,
    },
    TotalFailure {
        failures: Vec<BulkFailure>,
    },
}

impl BulkOutcome {
    fn from_parts(inserted_count: usize, failures: Vec<BulkFailure>) -> Self {
        match (inserted_count, failures.is_empty()) {
            (_, true) => BulkOutcome::Success { inserted_count },
            (0, false) => BulkOutcome::TotalFailure { failures },
            (_, false) => BulkOutcome::PartialFailure {
                inserted_count,
                failures,
            },
        }
    }

    pub fn inserted_count(&self) -> usize {
        match self {
            BulkOutcome::Success { inserted_count }
            | BulkOutcome::PartialFailure { inserted_count, .. } => *inserted_count,
            BulkOutcome::TotalFailure { .. } => 0,
        }
    }

    pub fn failures(&self) -> &[BulkFailure] {
        match self {
            BulkOutcome::Success { .. } => &[],
            BulkOutcome::PartialFailure { failures, .. } | BulkOutcome::TotalFailure { failures } => {
                failures
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            BulkOutcome::Success { inserted_count } => {
                format!("{} students added successfully.", inserted_count)
            }
            _ => format!(
                "Completed with some errors. Added: {}, Failed: {}.",
                self.inserted_count(),
                self.failures().len()
            ),
        }
    }
}

/// Sorted roster snapshot derived from the store, dropped on every roster write.
///
/// Only serves reads. A snapshot taken while a write was in flight is discarded
/// instead of cached.
#[derive(Debug, Default)]
struct RosterReplica {
    generation: AtomicU64,
    snapshot: RwLock<Option<Arc<Vec<Student>>>>,
}

impl RosterReplica {
    async fn get(&self, roster: &dyn RosterStore) -> RuleResult<Arc<Vec<Student>>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let generation = self.generation.load(Ordering::Acquire);
        let fresh = Arc::new(roster.list_students().await?);
        let mut slot = self.snapshot.write().await;
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(fresh.clone());
        }
        Ok(fresh)
    }

    async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.snapshot.write().await = None;
    }
}

/// The single entry point for roster and attendance operations.
pub struct Registry {
    roster: Arc<dyn RosterStore>,
    attendance: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    replica: RosterReplica,
}

fn validate_student(draft: StudentDraft) -> RuleResult<StudentDraft> {
    let roll_number = draft.roll_number.trim();
    let name = draft.name.trim();
    if roll_number.is_empty() {
        return Err(RuleError::Validation("`rollNumber` is required".to_string()));
    }
    if name.is_empty() {
        return Err(RuleError::Validation("`name` is required".to_string()));
    }
    Ok(StudentDraft::new(roll_number, name))
}

fn validate_group_name(group_name: &str) -> RuleResult<String> {
    let group_name = group_name.trim();
    if group_name.is_empty() {
        return Err(RuleError::Validation("`groupName` is required".to_string()));
    }
    Ok(group_name.to_string())
}

fn validate_entries(drafts: Vec<EntryDraft>) -> RuleResult<Vec<AttendanceEntry>> {
    let mut entries = Vec::with_capacity(drafts.len());
    let mut seen = HashSet::with_capacity(drafts.len());
    let mut repeated = 0;
    for (index, draft) in drafts.into_iter().enumerate() {
        if draft.student_id.trim().is_empty() {
            return Err(RuleError::Validation(format!(
                "records[{}]: `studentId` is required",
                index
            )));
        }
        let status = draft
            .status
            .parse::<AttendanceStatus>()
            .map_err(|err| RuleError::Validation(format!("records[{}]: {}", index, err)))?;

        let student_id = draft.student_id.trim().to_string();
        if !seen.insert(student_id.clone()) {
            repeated += 1;
        }

        entries.push(AttendanceEntry {
            student_id,
            roll_number: draft.roll_number,
            student_name: draft.student_name,
            status,
        });
    }
    if repeated > 0 {
        log::warn!(
            "{} records repeat a student already present in the same session",
            repeated
        );
    }
    Ok(entries)
}

fn matches_term(student: &Student, term: &str) -> bool {
    student.name.to_lowercase().contains(term) || student.roll_number.to_lowercase().contains(term)
}

impl Registry {
    pub fn new(
        roster: Arc<dyn RosterStore>,
        attendance: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            roster,
            attendance,
            clock,
            replica: RosterReplica::default(),
        }
    }

    /// Registry over a fresh [`MemoryStore`].
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, clock)
    }

    pub fn with_system_clock(
        roster: Arc<dyn RosterStore>,
        attendance: Arc<dyn AttendanceStore>,
    ) -> Self {
        Self::new(roster, attendance, Arc::new(SystemClock))
    }

    pub async fn list_students(&self) -> RuleResult<Vec<Student>> {
        let snapshot = self.replica.get(self.roster.as_ref()).await?;
        Ok(snapshot.as_ref().clone())
    }

    /// Case-insensitive substring match on name or roll number.
    pub async fn search_students(&self, term: &str) -> RuleResult<Vec<Student>> {
        let term = term.trim().to_lowercase();
        let snapshot = self.replica.get(self.roster.as_ref()).await?;
        Ok(snapshot
            .iter()
            .filter(|student| term.is_empty() || matches_term(student, &term))
            .cloned()
            .collect())
    }

    pub async fn add_student(&self, draft: StudentDraft) -> RuleResult<Student> {
        let result = self.insert_student(draft).await;
        if result.is_ok() {
            self.replica.invalidate().await;
        }
        result
    }

    async fn insert_student(&self, draft: StudentDraft) -> RuleResult<Student> {
        let draft = validate_student(draft)?;

        if self
            .roster
            .find_by_roll_number(&draft.roll_number)
            .await?
            .is_some()
        {
            return Err(RuleError::DuplicateKey {
                roll_number: draft.roll_number,
            });
        }

        let student = Student {
            id: Uuid::new_v4(),
            roll_number: draft.roll_number,
            name: draft.name,
            created_at: self.clock.now(),
        };
        self.roster.insert_student(&student).await?;
        log::debug!("Added student {} ({})", student.roll_number, student.id);
        Ok(student)
    }

    /// Attempts every item in order; one bad item never stops the rest.
    pub async fn add_students_bulk<R>(&self, rows: Vec<R>) -> RuleResult<BulkOutcome>
    where
        R: Into<BulkRow>,
    {
        if rows.is_empty() {
            return Err(RuleError::Validation(
                "Student data must be a non-empty array.".to_string(),
            ));
        }

        let mut inserted = 0;
        let mut failures = Vec::new();
        for (index, row) in rows.into_iter().map(Into::<BulkRow>::into).enumerate() {
            let (roll_number, result) = match row {
                BulkRow::Draft(draft) => {
                    let roll_number = draft.roll_number.trim().to_string();
                    (roll_number, self.insert_student(draft).await)
                }
                BulkRow::Malformed {
                    roll_number,
                    reason,
                } => (
                    roll_number,
                    Err(RuleError::Validation(format!("students[{}]: {}", index, reason))),
                ),
            };
            match result {
                Ok(_) => inserted += 1,
                Err(err) => {
                    log::warn!("Bulk insert skipped roll number `{}`: {}", roll_number, err);
                    failures.push(BulkFailure {
                        roll_number,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if inserted > 0 {
            self.replica.invalidate().await;
        }
        Ok(BulkOutcome::from_parts(inserted, failures))
    }

    pub async fn update_student(&self, id: Uuid, draft: StudentDraft) -> RuleResult<Student> {
        let draft = validate_student(draft)?;

        let existing = self
            .roster
            .get_student(id)
            .await?
            .ok_or(RuleError::NotFound {
                entity: "Student",
                id,
            })?;

        if let Some(holder) = self.roster.find_by_roll_number(&draft.roll_number).await? {
            if holder.id != id {
                return Err(RuleError::DuplicateKey {
                    roll_number: draft.roll_number,
                });
            }
        }

        let updated = Student {
            roll_number: draft.roll_number,
            name: draft.name,
            ..existing
        };
        self.roster
            .update_student(&updated)
            .await
            .map_err(missing("Student", id))?;
        self.replica.invalidate().await;
        log::debug!("Updated student {}", id);
        Ok(updated)
    }

    /// Removes a student from the roster. Attendance sessions keep their copies.
    pub async fn delete_student(&self, id: Uuid) -> RuleResult<()> {
        self.roster
            .delete_student(id)
            .await
            .map_err(missing("Student", id))?;
        self.replica.invalidate().await;
        log::debug!("Deleted student {}", id);
        Ok(())
    }

    /// Records a session as supplied; entries are not checked against the roster.
    pub async fn create_session(
        &self,
        group_name: &str,
        entries: Vec<EntryDraft>,
    ) -> RuleResult<AttendanceSession> {
        let session = AttendanceSession {
            id: Uuid::new_v4(),
            group_name: validate_group_name(group_name)?,
            entries: validate_entries(entries)?,
            date: self.clock.now(),
        };
        self.attendance.insert_session(&session).await?;
        log::debug!(
            "Created session {} `{}` with {} records",
            session.id,
            session.group_name,
            session.entries.len()
        );
        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> RuleResult<AttendanceSession> {
        self.attendance
            .get_session(id)
            .await?
            .ok_or(RuleError::NotFound {
                entity: "Attendance record",
                id,
            })
    }

    pub async fn session_summary(&self, id: Uuid) -> RuleResult<SessionSummary> {
        Ok(self.get_session(id).await?.summary())
    }

    pub async fn list_sessions(&self) -> RuleResult<Vec<AttendanceSession>> {
        Ok(self.attendance.list_sessions().await?)
    }

    /// Replaces name and entries wholesale; `date` becomes the edit time.
    pub async fn update_session(
        &self,
        id: Uuid,
        group_name: &str,
        entries: Vec<EntryDraft>,
    ) -> RuleResult<AttendanceSession> {
        let session = AttendanceSession {
            id,
            group_name: validate_group_name(group_name)?,
            entries: validate_entries(entries)?,
            date: self.clock.now(),
        };
        self.attendance
            .replace_session(&session)
            .await
            .map_err(missing("Attendance record", id))?;
        log::debug!("Updated session {}", id);
        Ok(session)
    }

    pub async fn delete_session(&self, id: Uuid) -> RuleResult<()> {
        self.attendance
            .delete_session(id)
            .await
            .map_err(missing("Attendance record", id))?;
        log::debug!("Deleted session {}", id);
        Ok(())
    }
}
