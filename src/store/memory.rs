use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AttendanceStore, RosterStore, StoreError, StoreResult};
use crate::models::{AttendanceSession, Student};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    students: RwLock<HashMap<Uuid, Student>>,
    // insertion order, so equal dates list in a stable order
    sessions: RwLock<Vec<AttendanceSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let students = self.students.read().await;
        let mut all: Vec<Student> = students.values().cloned().collect();
        all.sort_by(|a, b| {
            a.roll_number
                .cmp(&b.roll_number)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }

    async fn get_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn find_by_roll_number(&self, roll_number: &str) -> StoreResult<Option<Student>> {
        Ok(self
            .students
            .read()
            .await
            .values()
            .find(|s| s.roll_number == roll_number)
            .cloned())
    }

    async fn insert_student(&self, student: &Student) -> StoreResult<()> {
        let mut students = self.students.write().await;
        if students
            .values()
            .any(|s| s.roll_number == student.roll_number)
        {
            return Err(StoreError::Duplicate {
                roll_number: student.roll_number.clone(),
            });
        }
        students.insert(student.id, student.clone());
        Ok(())
    }

    async fn update_student(&self, student: &Student) -> StoreResult<()> {
        let mut students = self.students.write().await;
        if !students.contains_key(&student.id) {
            return Err(StoreError::NotFound);
        }
        if students
            .values()
            .any(|s| s.id != student.id && s.roll_number == student.roll_number)
        {
            return Err(StoreError::Duplicate {
                roll_number: student.roll_number.clone(),
            });
        }
        if let Some(existing) = students.get_mut(&student.id) {
            existing.roll_number = student.roll_number.clone();
            existing.name = student.name.clone();
        }
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> StoreResult<()> {
        match self.students.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_session(&self, session: &AttendanceSession) -> StoreResult<()> {
        self.sessions.write().await.push(session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<AttendanceSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn list_sessions(&self) -> StoreResult<Vec<AttendanceSession>> {
        let mut all = self.sessions.read().await.clone();
        all.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(all)
    }

    async fn replace_session(&self, session: &AttendanceSession) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(roll: &str, name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            roll_number: roll.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_enforces_unique_roll_number() {
        let store = MemoryStore::new();
        store.insert_student(&student("R1", "Alice")).await.unwrap();
        let err = store
            .insert_student(&student("R1", "Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { roll_number } if roll_number == "R1"));
    }

    #[tokio::test]
    async fn update_allows_own_roll_number_but_not_anothers() {
        let store = MemoryStore::new();
        let mut alice = student("R1", "Alice");
        let bob = student("R2", "Bob");
        store.insert_student(&alice).await.unwrap();
        store.insert_student(&bob).await.unwrap();

        alice.name = "Alicia".to_string();
        store.update_student(&alice).await.unwrap();

        alice.roll_number = "R2".to_string();
        let err = store.update_student(&alice).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let stored = store.get_student(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.roll_number, "R1");
        assert_eq!(stored.name, "Alicia");
    }

    #[tokio::test]
    async fn list_is_sorted_by_roll_number() {
        let store = MemoryStore::new();
        for roll in ["R3", "R1", "R2"] {
            store.insert_student(&student(roll, "x")).await.unwrap();
        }
        let rolls: Vec<_> = store
            .list_students()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.roll_number)
            .collect();
        assert_eq!(rolls, vec!["R1", "R2", "R3"]);
    }

    #[tokio::test]
    async fn missing_records_report_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.delete_student(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete_session(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
        let ghost = AttendanceSession {
            id: Uuid::new_v4(),
            group_name: "g".to_string(),
            date: Utc::now(),
            entries: vec![],
        };
        assert!(matches!(
            store.replace_session(&ghost).await,
            Err(StoreError::NotFound)
        ));
    }
}
