use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A roster entry. `roll_number` is unique across the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub roll_number: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl Display for UnknownStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` is not a valid attendance status (expected `Present` or `Absent`)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for AttendanceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One student's status inside a session.
///
/// `roll_number` and `student_name` are copies taken when the entry was
/// captured; they are never refreshed from the roster. `student_id` is a weak
/// reference and may point at a student that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub roll_number: String,
    pub student_name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub id: Uuid,
    pub group_name: String,
    /// Creation time, overwritten by every edit.
    pub date: DateTime<Utc>,
    #[serde(rename = "records", alias = "entries")]
    pub entries: Vec<AttendanceEntry>,
}

impl AttendanceSession {
    pub fn summary(&self) -> SessionSummary {
        let (present, absent): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .cloned()
            .partition(|entry| entry.status == AttendanceStatus::Present);

        SessionSummary {
            id: self.id,
            group_name: self.group_name.clone(),
            date: self.date,
            present_count: present.len(),
            absent_count: absent.len(),
            present,
            absent,
        }
    }
}

/// Present/absent breakdown of one session, entry order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub group_name: String,
    pub date: DateTime<Utc>,
    pub present_count: usize,
    pub absent_count: usize,
    pub present: Vec<AttendanceEntry>,
    pub absent: Vec<AttendanceEntry>,
}

/// Accepts a string, a number (stringified) or null (empty) for free-form
/// text fields, the way roster imports tend to arrive.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Uint(u64),
        Float(f64),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(text)) => text,
        Some(Scalar::Int(n)) => n.to_string(),
        Some(Scalar::Uint(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Unvalidated student fields as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default, deserialize_with = "lenient_string")]
    pub roll_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

impl StudentDraft {
    pub fn new<R: Into<String>, N: Into<String>>(roll_number: R, name: N) -> Self {
        Self {
            roll_number: roll_number.into(),
            name: name.into(),
        }
    }
}

/// One item of a bulk roster insert, decoded independently of its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkRow {
    Draft(StudentDraft),
    Malformed { roll_number: String, reason: String },
}

impl From<StudentDraft> for BulkRow {
    fn from(draft: StudentDraft) -> Self {
        BulkRow::Draft(draft)
    }
}

impl From<serde_json::Value> for BulkRow {
    fn from(value: serde_json::Value) -> Self {
        let roll_number = match value.get("rollNumber") {
            Some(serde_json::Value::String(roll)) => roll.trim().to_string(),
            Some(serde_json::Value::Number(roll)) => roll.to_string(),
            _ => String::new(),
        };
        match serde_json::from_value::<StudentDraft>(value) {
            Ok(draft) => BulkRow::Draft(draft),
            Err(err) => BulkRow::Malformed {
                roll_number,
                reason: err.to_string(),
            },
        }
    }
}

/// Unvalidated session entry; `status` is parsed by the rules engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    #[serde(default, deserialize_with = "lenient_string")]
    pub student_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub roll_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub student_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
}

impl EntryDraft {
    pub fn new(student_id: &str, roll_number: &str, student_name: &str, status: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            roll_number: roll_number.to_string(),
            student_name: student_name.to_string(),
            status: status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: id.to_string(),
            roll_number: format!("R-{}", id),
            student_name: format!("Student {}", id),
            status,
        }
    }

    #[test]
    fn status_parsing_is_exact() {
        assert_eq!("Present".parse(), Ok(AttendanceStatus::Present));
        assert_eq!("Absent".parse(), Ok(AttendanceStatus::Absent));
        assert!("Late".parse::<AttendanceStatus>().is_err());
        assert!("present".parse::<AttendanceStatus>().is_err());
        assert!("".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn summary_splits_and_keeps_order() {
        let session = AttendanceSession {
            id: Uuid::new_v4(),
            group_name: "05-01-2025".to_string(),
            date: Utc::now(),
            entries: vec![
                entry("c", AttendanceStatus::Present),
                entry("a", AttendanceStatus::Absent),
                entry("b", AttendanceStatus::Present),
            ],
        };

        let summary = session.summary();
        assert_eq!(summary.present_count, 2);
        assert_eq!(summary.absent_count, 1);
        let present: Vec<_> = summary.present.iter().map(|e| e.student_id.as_str()).collect();
        assert_eq!(present, vec!["c", "b"]);
        assert_eq!(summary.absent[0].student_id, "a");
    }

    #[test]
    fn session_wire_format_uses_records() {
        let session = AttendanceSession {
            id: Uuid::nil(),
            group_name: "g".to_string(),
            date: Utc::now(),
            entries: vec![entry("s1", AttendanceStatus::Absent)],
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["groupName"], "g");
        assert_eq!(json["records"][0]["studentId"], "s1");
        assert_eq!(json["records"][0]["status"], "Absent");
    }

    #[test]
    fn drafts_accept_numbers_and_nulls() {
        let draft: StudentDraft =
            serde_json::from_value(serde_json::json!({ "rollNumber": 101, "name": null })).unwrap();
        assert_eq!(draft, StudentDraft::new("101", ""));

        let entry: EntryDraft = serde_json::from_value(serde_json::json!({
            "studentId": "s1",
            "rollNumber": null,
            "studentName": null,
            "status": "Present"
        }))
        .unwrap();
        assert_eq!(entry, EntryDraft::new("s1", "", "", "Present"));
    }

    #[test]
    fn unusable_bulk_rows_are_kept_as_malformed() {
        let row = BulkRow::from(serde_json::json!({ "rollNumber": "R7", "name": { "first": "Al" } }));
        assert!(matches!(row, BulkRow::Malformed { ref roll_number, .. } if roll_number == "R7"));

        let row = BulkRow::from(serde_json::json!("R8"));
        assert!(matches!(row, BulkRow::Malformed { ref roll_number, .. } if roll_number.is_empty()));

        let row = BulkRow::from(serde_json::json!({ "rollNumber": 9, "name": "Ivy" }));
        assert_eq!(row, BulkRow::Draft(StudentDraft::new("9", "Ivy")));
    }
}
