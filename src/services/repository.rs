use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::review::{ReviewSchedule, StudyRecord};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("version conflict on {id}: stored {stored}, attempted {attempted}")]
    VersionConflict { id: Uuid, stored: u64, attempted: u64 },
    #[error("duplicate: {0}")]
    Duplicate(String),
}

/// Persistence boundary for schedules. `save` rejects a snapshot whose
/// version is not newer than the stored one.
pub trait ScheduleRepository: Send + Sync {
    fn save(&self, schedule: &ReviewSchedule) -> Result<(), RepositoryError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewSchedule>, RepositoryError>;
    fn find_by_student_id(&self, student_id: &str) -> Result<Vec<ReviewSchedule>, RepositoryError>;
    fn find_by_student_and_problem(
        &self,
        student_id: &str,
        problem_id: &str,
    ) -> Result<Option<ReviewSchedule>, RepositoryError>;
    fn find_all(&self) -> Result<Vec<ReviewSchedule>, RepositoryError>;
}

pub trait StudyRecordRepository: Send + Sync {
    fn save(&self, record: &StudyRecord) -> Result<(), RepositoryError>;
    fn find_by_student_id(&self, student_id: &str) -> Result<Vec<StudyRecord>, RepositoryError>;
    fn find_by_problem_id(&self, problem_id: &str) -> Result<Vec<StudyRecord>, RepositoryError>;
}

#[derive(Default)]
struct ScheduleTable {
    by_id: HashMap<Uuid, ReviewSchedule>,
    by_pair: HashMap<(String, String), Uuid>,
}

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    table: RwLock<ScheduleTable>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScheduleRepository for InMemoryScheduleRepository {
    fn save(&self, schedule: &ReviewSchedule) -> Result<(), RepositoryError> {
        let mut table = self.table.write();
        let pair = (schedule.student_id().to_string(), schedule.problem_id().to_string());

        match table.by_id.get(&schedule.id()) {
            Some(stored) if stored.version() >= schedule.version() => {
                return Err(RepositoryError::VersionConflict {
                    id: schedule.id(),
                    stored: stored.version(),
                    attempted: schedule.version(),
                });
            }
            Some(_) => {}
            None => {
                if table.by_pair.contains_key(&pair) {
                    return Err(RepositoryError::Duplicate(format!(
                        "schedule for student {} and problem {}",
                        pair.0, pair.1
                    )));
                }
            }
        }

        let mut stored = schedule.clone();
        stored.drain_events();
        table.by_pair.insert(pair, schedule.id());
        table.by_id.insert(schedule.id(), stored);

        debug!(schedule_id = %schedule.id(), version = schedule.version(), "Schedule saved");
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewSchedule>, RepositoryError> {
        Ok(self.table.read().by_id.get(&id).cloned())
    }

    fn find_by_student_id(&self, student_id: &str) -> Result<Vec<ReviewSchedule>, RepositoryError> {
        let table = self.table.read();
        let mut schedules: Vec<_> = table
            .by_id
            .values()
            .filter(|schedule| schedule.student_id() == student_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|schedule| schedule.created_at());
        Ok(schedules)
    }

    fn find_by_student_and_problem(
        &self,
        student_id: &str,
        problem_id: &str,
    ) -> Result<Option<ReviewSchedule>, RepositoryError> {
        let table = self.table.read();
        let key = (student_id.to_string(), problem_id.to_string());
        Ok(table
            .by_pair
            .get(&key)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn find_all(&self) -> Result<Vec<ReviewSchedule>, RepositoryError> {
        let mut schedules: Vec<_> = self.table.read().by_id.values().cloned().collect();
        schedules.sort_by_key(|schedule| schedule.created_at());
        Ok(schedules)
    }
}

#[derive(Default)]
pub struct InMemoryStudyRecordRepository {
    records: RwLock<Vec<StudyRecord>>,
}

impl InMemoryStudyRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StudyRecordRepository for InMemoryStudyRecordRepository {
    fn save(&self, record: &StudyRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        if records.iter().any(|existing| existing.id() == record.id()) {
            return Err(RepositoryError::Duplicate(format!("study record {}", record.id())));
        }
        records.push(record.clone());
        debug!(record_id = %record.id(), student_id = record.student_id(), "Study record saved");
        Ok(())
    }

    fn find_by_student_id(&self, student_id: &str) -> Result<Vec<StudyRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| record.student_id() == student_id)
            .cloned()
            .collect())
    }

    fn find_by_problem_id(&self, problem_id: &str) -> Result<Vec<StudyRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| record.problem_id() == problem_id)
            .cloned()
            .collect())
    }
}
