//! In-memory trajectory service for testing.
//!
//! Applies saves, closures and catalog syncs the way the spreadsheet service
//! does, and can be told to fail the next call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::balance::REGULAR_CAP;
use crate::core::classify::loads;
use crate::core::record::{
    AcademicCondition, ClosureOutcome, FieldValue, Status, StudentStatus, StudentSummary,
    SubjectCatalogEntry, SubjectRecord,
};
use crate::error::{Result, TrajectoryError};
use crate::remote::envelope::{
    actions, CloseRequest, DivisionRisk, SaveRequest, SyncRequest, SyncResult,
};
use crate::remote::traits::TrajectoryService;

#[derive(Debug, Default)]
struct State {
    /// Keyed by (cycle, student id).
    statuses: BTreeMap<(String, String), StudentStatus>,
    catalog: Vec<SubjectCatalogEntry>,
    fail_next: Option<TrajectoryError>,
    calls: Vec<String>,
}

/// In-memory service.
///
/// Thread-safe implementation using `RwLock`. Data is lost when the service
/// is dropped.
#[derive(Debug, Default)]
pub struct MemoryService {
    state: RwLock<State>,
}

impl MemoryService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a student's record set, replacing any previous one.
    pub fn insert_status(&self, status: StudentStatus) -> Result<()> {
        let mut state = self.write()?;
        state
            .statuses
            .insert((status.cycle.clone(), status.student.id.clone()), status);
        Ok(())
    }

    /// Replace the subject catalog.
    pub fn set_catalog(&self, catalog: Vec<SubjectCatalogEntry>) -> Result<()> {
        self.write()?.catalog = catalog;
        Ok(())
    }

    /// Make the next call fail with `error` without touching stored data.
    pub fn fail_next(&self, error: TrajectoryError) -> Result<()> {
        self.write()?.fail_next = Some(error);
        Ok(())
    }

    /// Action names received so far, oldest first.
    pub fn calls(&self) -> Result<Vec<String>> {
        Ok(self.read()?.calls.clone())
    }

    /// A stored record set.
    pub fn status(&self, cycle: &str, student_id: &str) -> Result<Option<StudentStatus>> {
        Ok(self
            .read()?
            .statuses
            .get(&(cycle.to_string(), student_id.to_string()))
            .cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| TrajectoryError::remote("in-memory service lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| TrajectoryError::remote("in-memory service lock poisoned"))
    }

    /// Log the call and return the write guard, or the injected failure.
    fn begin(&self, action: &str) -> Result<RwLockWriteGuard<'_, State>> {
        let mut state = self.write()?;
        state.calls.push(action.to_string());
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn lookup<'a>(
    state: &'a mut State,
    cycle: &str,
    student_id: &str,
) -> Result<&'a mut StudentStatus> {
    state
        .statuses
        .get_mut(&(cycle.to_string(), student_id.to_string()))
        .ok_or_else(|| {
            TrajectoryError::remote(format!(
                "student {student_id} not found in cycle {cycle}"
            ))
        })
}

fn owed_count(status: &StudentStatus) -> usize {
    status
        .records
        .iter()
        .filter(|r| r.condition == AcademicCondition::Owed)
        .count()
}

impl TrajectoryService for MemoryService {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> Result<()> {
        let _state = self.begin(actions::PING)?;
        Ok(())
    }

    fn cycles(&self) -> Result<Vec<String>> {
        let state = self.begin(actions::GET_CYCLES)?;
        let cycles: BTreeSet<String> = state.statuses.keys().map(|(c, _)| c.clone()).collect();
        Ok(cycles.into_iter().collect())
    }

    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>> {
        let state = self.begin(actions::GET_STUDENT_LIST)?;
        let mut roster: Vec<StudentSummary> = state
            .statuses
            .iter()
            .filter(|((c, _), _)| c == cycle)
            .map(|(_, status)| StudentSummary {
                id: status.student.id.clone(),
                surname: status.student.surname.clone(),
                name: status.student.name.clone(),
                grade: status.student.grade,
                division: status.student.division.clone(),
                shift: status.student.shift.clone(),
                cycle_closed: status.is_cycle_closed(),
                needs_review: loads(&status.records).regular > REGULAR_CAP,
            })
            .collect();
        roster.sort_by(|a, b| {
            a.surname
                .cmp(&b.surname)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(roster)
    }

    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus> {
        let mut state = self.begin(actions::GET_STUDENT_STATUS)?;
        Ok(lookup(&mut state, cycle, student_id)?.clone())
    }

    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus> {
        let mut state = self.begin(actions::SAVE_STUDENT_STATUS)?;
        let status = lookup(&mut state, &request.cycle, &request.student_id)?;

        // All or nothing: check every subject before writing any.
        for update in &request.updates {
            if !status
                .records
                .iter()
                .any(|r| r.subject_id == update.subject_id)
            {
                return Err(TrajectoryError::remote(format!(
                    "subject {} not found for student {}",
                    update.subject_id, request.student_id
                )));
            }
        }

        for update in &request.updates {
            for record in status
                .records
                .iter_mut()
                .filter(|r| r.subject_id == update.subject_id)
            {
                for value in update.fields.values() {
                    match *value {
                        FieldValue::Status(s) => record.status = s,
                        FieldValue::Outcome(o) => record.outcome = o,
                    }
                }
            }
        }

        tracing::debug!(
            student = %request.student_id,
            updates = request.updates.len(),
            actor = %request.actor,
            "memory service saved"
        );
        Ok(status.clone())
    }

    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus> {
        let mut state = self.begin(actions::CLOSE_CYCLE)?;
        let status = lookup(&mut state, &request.cycle, &request.student_id)?;

        let missing = status
            .records
            .iter()
            .filter(|r| r.is_engaged() && !r.outcome.is_set())
            .count();
        if missing > 0 {
            return Err(TrajectoryError::remote(format!(
                "{missing} subjects have no closure outcome"
            )));
        }

        for record in status.records.iter_mut().filter(|r| r.is_engaged()) {
            match record.outcome {
                ClosureOutcome::Passed => {
                    record.condition = AcademicCondition::Approved;
                    record.status = Status::ApprovedSentinel;
                }
                ClosureOutcome::Failed => record.condition = AcademicCondition::Owed,
                ClosureOutcome::Unset => {}
            }
        }
        if request.mark_closed {
            for record in &mut status.records {
                record.cycle_closed = true;
            }
        }

        Ok(status.clone())
    }

    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult> {
        let mut state = self.begin(actions::SYNC_CATALOG_ROWS)?;
        let catalog = state.catalog.clone();
        let status = lookup(&mut state, &request.cycle, &request.student_id)?;

        let mut added = 0;
        for entry in catalog.iter().filter(|e| e.applies_to(&status.student)) {
            if status.records.iter().any(|r| r.subject_id == entry.id) {
                continue;
            }
            let mut record = SubjectRecord::new(entry.id.clone(), entry.name.clone(), 0);
            record.grade = entry.grade;
            record.never_taken = true;
            status.records.push(record);
            added += 1;
        }

        Ok(SyncResult {
            added,
            status: status.clone(),
        })
    }

    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>> {
        let state = self.begin(actions::GET_DIVISION_RISK_SUMMARY)?;
        let mut divisions: BTreeMap<(String, String), DivisionRisk> = BTreeMap::new();

        for status in state
            .statuses
            .iter()
            .filter(|((c, _), _)| c == cycle)
            .map(|(_, s)| s)
        {
            let key = (status.student.division.clone(), status.student.shift.clone());
            let entry = divisions.entry(key).or_insert_with(|| DivisionRisk {
                division: status.student.division.clone(),
                shift: status.student.shift.clone(),
                ..Default::default()
            });
            entry.total_students += 1;
            if owed_count(status) >= threshold as usize {
                entry.at_risk += 1;
            }
        }

        Ok(divisions.into_values().collect())
    }
}
