//! One student's editing session.
//!
//! A [`StudentSession`] is built fresh each time a student is selected. It
//! holds the live record set, the change tracker and the policies in force,
//! and drives every round-trip to the remote service. Remote calls take
//! `&mut self` and block, so at most one is in flight per session; a failed
//! call leaves the session exactly as it was.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::core::alerts::{alerts, RuleAlert};
use crate::core::balance::{BalanceReport, Balancer, DemotionOrder, Limits};
use crate::core::classify::{classify, loads, Classification, ClassifyContext, Loads, OwedPolicy};
use crate::core::closure::{self, ClosureProgress, OutcomeChoice};
use crate::core::plan::plan_text;
use crate::core::record::{
    ClosureOutcome, EditableField, FieldValue, Status, Student, StudentStatus, SubjectRecord,
};
use crate::core::tracker::ChangeTracker;
use crate::error::{Result, TrajectoryError};
use crate::remote::envelope::{CloseRequest, SaveRequest, SyncRequest};
use crate::remote::TrajectoryService;

/// Policies a session runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub limits: Limits,
    pub demotion_order: DemotionOrder,
    pub owed_policy: OwedPolicy,
    /// Recorded as the author of saves and closures.
    pub actor: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            demotion_order: DemotionOrder::default(),
            owed_policy: OwedPolicy::default(),
            actor: "web".to_string(),
        }
    }
}

impl SessionSettings {
    /// Settings from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: config.limits,
            demotion_order: config.policy.demotion_order,
            owed_policy: config.policy.owed,
            actor: config.remote.actor.clone(),
        }
    }
}

/// What a successful closure did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosureReceipt {
    /// Outcome edits persisted before closing.
    pub outcomes_saved: usize,
    /// Subjects closed.
    pub closed: usize,
}

/// Editing session for one student in one cycle.
pub struct StudentSession<S: TrajectoryService> {
    service: S,
    cycle: String,
    student: Student,
    tracker: ChangeTracker,
    balancer: Balancer,
    settings: SessionSettings,
    loaded_at: DateTime<Utc>,
}

impl<S: TrajectoryService> std::fmt::Debug for StudentSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentSession")
            .field("service", &self.service.name())
            .field("cycle", &self.cycle)
            .field("student", &self.student.id)
            .field("records", &self.tracker.records().len())
            .field("dirty", &self.tracker.dirty().len())
            .finish()
    }
}

impl<S: TrajectoryService> StudentSession<S> {
    /// Load a student's record set and start a session on it.
    pub fn open(
        service: S,
        settings: SessionSettings,
        cycle: &str,
        student_id: &str,
    ) -> Result<Self> {
        let status = service.fetch_status(cycle, student_id)?;
        tracing::info!(
            student = student_id,
            cycle,
            records = status.records.len(),
            "student loaded"
        );
        Ok(Self::from_status(service, settings, cycle, status))
    }

    /// Start a session on an already fetched record set.
    pub fn from_status(
        service: S,
        settings: SessionSettings,
        cycle: &str,
        status: StudentStatus,
    ) -> Self {
        let cycle = if status.cycle.is_empty() {
            cycle.to_string()
        } else {
            status.cycle
        };
        Self {
            service,
            cycle,
            student: status.student,
            tracker: ChangeTracker::load(status.records),
            balancer: Balancer::new(settings.demotion_order, settings.limits),
            settings,
            loaded_at: Utc::now(),
        }
    }

    /// The cycle.
    pub fn cycle(&self) -> &str {
        &self.cycle
    }

    /// The student.
    pub fn student(&self) -> &Student {
        &self.student
    }

    /// Live records.
    pub fn records(&self) -> &[SubjectRecord] {
        self.tracker.records()
    }

    /// The change tracker.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// The policies in force.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// When the authoritative record set was last adopted.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Whether the cycle is already closed for this student.
    pub fn is_cycle_closed(&self) -> bool {
        self.records().iter().any(|r| r.cycle_closed)
    }

    fn context(&self) -> ClassifyContext {
        ClassifyContext {
            current_grade: self.student.grade,
            graduated: self.student.graduated,
        }
    }

    /// Buckets and counters for the live records.
    pub fn classification(&self) -> Classification {
        classify(self.records(), &self.context(), self.settings.owed_policy)
    }

    /// Load counters for the live records.
    pub fn loads(&self) -> Loads {
        loads(self.records())
    }

    /// Caps currently exceeded.
    pub fn alerts(&self) -> Vec<RuleAlert> {
        alerts(
            self.loads(),
            &self.settings.limits,
            self.settings.demotion_order,
            self.student.grade,
        )
    }

    /// Change one subject's status.
    pub fn set_status(&mut self, subject_id: &str, status: Status) -> Result<bool> {
        self.tracker
            .set_field(subject_id, FieldValue::Status(status))
            .inspect_err(|e| tracing::warn!(subject = subject_id, error = %e, "edit rejected"))
    }

    /// Press a closure outcome button.
    pub fn toggle_outcome(&mut self, subject_id: &str, choice: OutcomeChoice) -> Result<ClosureOutcome> {
        closure::toggle(&mut self.tracker, subject_id, choice)
            .inspect_err(|e| tracing::warn!(subject = subject_id, error = %e, "edit rejected"))
    }

    /// Cap out subjects until the regular load fits.
    pub fn auto_adjust(&mut self) -> Result<BalanceReport> {
        self.balancer.run(&mut self.tracker, self.student.grade)
    }

    /// What [`auto_adjust`](Self::auto_adjust) would do.
    pub fn preview_adjust(&self) -> Result<BalanceReport> {
        self.balancer.preview(&self.tracker, self.student.grade)
    }

    /// Engaged subjects and how many still lack an outcome.
    pub fn closure_progress(&self) -> ClosureProgress {
        closure::progress(self.records())
    }

    /// Whether there is anything to save.
    pub fn can_save(&self) -> bool {
        self.tracker.can_save()
    }

    /// Drop every unsaved edit.
    pub fn discard_changes(&mut self) {
        let baseline: Vec<SubjectRecord> = self
            .records()
            .iter()
            .map(|r| self.tracker.baseline(&r.subject_id).unwrap_or(r).clone())
            .collect();
        self.tracker.rebaseline(baseline);
    }

    fn adopt(&mut self, status: StudentStatus) {
        if !status.cycle.is_empty() {
            self.cycle = status.cycle;
        }
        if !status.student.id.is_empty() {
            self.student = status.student;
        }
        self.tracker.rebaseline(status.records);
        self.loaded_at = Utc::now();
    }

    /// Persist the dirty map and adopt the record set the service returns.
    ///
    /// Returns the number of subjects written.
    pub fn save(&mut self) -> Result<usize> {
        if !self.tracker.can_save() {
            return Err(TrajectoryError::rejected("there are no changes to save"));
        }
        let updates = self.tracker.updates();
        let count = updates.len();
        let request = SaveRequest {
            cycle: self.cycle.clone(),
            student_id: self.student.id.clone(),
            actor: self.settings.actor.clone(),
            updates,
        };

        let status = self.service.save_status(&request).inspect_err(|e| {
            tracing::warn!(student = %self.student.id, error = %e, "save failed");
        })?;

        self.adopt(status);
        tracing::info!(student = %self.student.id, subjects = count, "saved");
        Ok(count)
    }

    /// Persist the recorded outcomes and close the cycle.
    ///
    /// Refused locally unless every engaged subject has an outcome and no
    /// status edit is pending. Outcome edits are saved first; the closure
    /// itself runs only after that save succeeds.
    pub fn submit_closure(&mut self) -> Result<ClosureReceipt> {
        let progress = closure::ensure_ready(self.records())?;
        if self.tracker.has_dirty_field(EditableField::Status) {
            return Err(TrajectoryError::rejected(
                "save or discard the pending status changes before closing the cycle",
            ));
        }

        let outcomes = self.tracker.updates_for(EditableField::Outcome);
        let outcomes_saved = outcomes.len();
        if !outcomes.is_empty() {
            let request = SaveRequest {
                cycle: self.cycle.clone(),
                student_id: self.student.id.clone(),
                actor: self.settings.actor.clone(),
                updates: outcomes,
            };
            let status = self.service.save_status(&request).inspect_err(|e| {
                tracing::warn!(student = %self.student.id, error = %e, "saving outcomes failed");
            })?;
            self.adopt(status);
        }

        let request = CloseRequest {
            cycle: self.cycle.clone(),
            student_id: self.student.id.clone(),
            actor: self.settings.actor.clone(),
            mark_closed: true,
        };
        let status = self.service.close_cycle(&request).inspect_err(|e| {
            tracing::warn!(student = %self.student.id, error = %e, "closing cycle failed");
        })?;
        self.adopt(status);

        tracing::info!(
            student = %self.student.id,
            closed = progress.total,
            "cycle closed"
        );
        Ok(ClosureReceipt {
            outcomes_saved,
            closed: progress.total,
        })
    }

    /// Ask the service to add missing catalog rows, then adopt the result.
    ///
    /// Returns the number of rows added. Refused while edits are pending.
    pub fn sync_catalog(&mut self) -> Result<usize> {
        if self.tracker.can_save() {
            return Err(TrajectoryError::rejected(
                "save or discard pending changes before syncing the catalog",
            ));
        }
        let request = SyncRequest {
            cycle: self.cycle.clone(),
            student_id: self.student.id.clone(),
            actor: self.settings.actor.clone(),
        };
        let result = self.service.sync_catalog(&request)?;
        self.adopt(result.status);
        tracing::info!(student = %self.student.id, added = result.added, "catalog synced");
        Ok(result.added)
    }

    /// Fetch the record set again, dropping unsaved edits.
    pub fn reload(&mut self) -> Result<()> {
        let status = self.service.fetch_status(&self.cycle, &self.student.id)?;
        self.adopt(status);
        Ok(())
    }

    /// Family-facing plan text.
    pub fn plan_text(&self) -> String {
        plan_text(
            &self.student,
            &self.cycle,
            &self.classification(),
            &self.settings.limits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::AcademicCondition;
    use crate::remote::MemoryService;
    use std::sync::Arc;

    fn student(grade: u8) -> Student {
        Student {
            id: "S1".into(),
            surname: "Perez".into(),
            name: "Ana".into(),
            grade: Some(grade),
            ..Default::default()
        }
    }

    fn seeded(records: Vec<SubjectRecord>, grade: u8) -> Arc<MemoryService> {
        let service = Arc::new(MemoryService::new());
        service
            .insert_status(StudentStatus {
                cycle: "2026".into(),
                student: student(grade),
                records,
            })
            .unwrap();
        service
    }

    fn open(service: &Arc<MemoryService>) -> StudentSession<Arc<MemoryService>> {
        StudentSession::open(Arc::clone(service), SessionSettings::default(), "2026", "S1").unwrap()
    }

    fn over_cap_records() -> Vec<SubjectRecord> {
        let mut records: Vec<SubjectRecord> = (1..=10)
            .map(|i| {
                SubjectRecord::new(format!("F{i:02}"), format!("First {i:02}"), 3)
                    .with_status(Status::FirstTime)
            })
            .collect();
        records.extend((1..=4).map(|i| {
            SubjectRecord::new(format!("R{i:02}"), format!("Repeat {i:02}"), 2)
                .with_condition(AcademicCondition::Owed)
                .with_status(Status::Repeat)
        }));
        records
    }

    fn closable_records() -> Vec<SubjectRecord> {
        vec![
            SubjectRecord::new("MAT3", "Matematica III", 3).with_status(Status::FirstTime),
            SubjectRecord::new("GEO2", "Geografia II", 2)
                .with_condition(AcademicCondition::Owed)
                .with_status(Status::Repeat),
            SubjectRecord::new("LEN2", "Lengua II", 2)
                .with_condition(AcademicCondition::Owed)
                .with_status(Status::Intensification),
            SubjectRecord::new("HIS1", "Historia I", 1).with_condition(AcademicCondition::Approved),
        ]
    }

    #[test]
    fn test_auto_adjust_then_save() {
        let service = seeded(over_cap_records(), 3);
        let mut session = open(&service);
        assert_eq!(session.loads().regular, 14);
        assert_eq!(session.alerts().len(), 1);

        let report = session.auto_adjust().unwrap();
        assert_eq!(report.moved(), 2);
        assert_eq!(session.loads().regular, 12);
        assert!(session.alerts().is_empty());
        assert_eq!(session.tracker().dirty().len(), 2);

        assert_eq!(session.save().unwrap(), 2);
        assert!(!session.can_save());

        let stored = service.status("2026", "S1").unwrap().unwrap();
        assert_eq!(loads(&stored.records).regular, 12);
    }

    #[test]
    fn test_save_then_reload_is_clean() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        session.set_status("MAT3", Status::CappedOut).unwrap();
        session.save().unwrap();

        session.reload().unwrap();

        assert!(!session.can_save());
        assert_eq!(
            session.tracker().record("MAT3").unwrap().status,
            Status::CappedOut
        );
    }

    #[test]
    fn test_save_with_nothing_dirty_is_rejected_locally() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);

        let err = session.save().unwrap_err();

        assert!(err.is_local());
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
    }

    #[test]
    fn test_failed_save_leaves_session_unchanged() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        session.set_status("MAT3", Status::Repeat).unwrap();
        let before = session.tracker().clone();

        service.fail_next(TrajectoryError::transport("timeout")).unwrap();
        let err = session.save().unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(session.tracker(), &before);
        assert!(session.can_save());

        assert_eq!(session.save().unwrap(), 1);
    }

    #[test]
    fn test_edit_on_approved_rejected() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        let err = session.set_status("HIS1", Status::FirstTime).unwrap_err();
        assert!(matches!(err, TrajectoryError::Rejected { .. }));
        assert!(!session.can_save());
    }

    #[test]
    fn test_closure_flow() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        assert_eq!(
            session.closure_progress(),
            ClosureProgress { total: 3, missing: 3 }
        );
        assert!(session.submit_closure().unwrap_err().is_local());

        session.toggle_outcome("MAT3", OutcomeChoice::Passed).unwrap();
        session.toggle_outcome("GEO2", OutcomeChoice::Passed).unwrap();
        session.toggle_outcome("LEN2", OutcomeChoice::Failed).unwrap();
        assert!(session.closure_progress().is_ready());

        let receipt = session.submit_closure().unwrap();

        assert_eq!(
            receipt,
            ClosureReceipt {
                outcomes_saved: 3,
                closed: 3
            }
        );
        assert!(!session.can_save());
        assert!(session.is_cycle_closed());
        let classification = session.classification();
        assert_eq!(classification.approved.len(), 3);
        assert!(classification.owed.iter().any(|r| r.subject_id == "LEN2"));
        assert_eq!(
            service.calls().unwrap(),
            vec!["getStudentStatus", "saveStudentStatus", "closeCycle"]
        );
    }

    #[test]
    fn test_closure_refused_with_pending_status_edits() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        for id in ["MAT3", "GEO2", "LEN2"] {
            session.toggle_outcome(id, OutcomeChoice::Passed).unwrap();
        }
        session.set_status("GEO2", Status::FirstTime).unwrap();

        let err = session.submit_closure().unwrap_err();

        assert!(err.is_local());
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
    }

    #[test]
    fn test_closure_with_saved_outcomes_skips_save() {
        let records: Vec<SubjectRecord> = closable_records()
            .into_iter()
            .map(|r| {
                if r.is_engaged() {
                    r.with_outcome(ClosureOutcome::Passed)
                } else {
                    r
                }
            })
            .collect();
        let service = seeded(records, 3);
        let mut session = open(&service);

        let receipt = session.submit_closure().unwrap();

        assert_eq!(receipt.outcomes_saved, 0);
        assert_eq!(
            service.calls().unwrap(),
            vec!["getStudentStatus", "closeCycle"]
        );
    }

    #[test]
    fn test_failed_outcome_save_keeps_edits_and_can_retry() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        for id in ["MAT3", "GEO2", "LEN2"] {
            session.toggle_outcome(id, OutcomeChoice::Failed).unwrap();
        }
        let before = session.tracker().clone();

        service.fail_next(TrajectoryError::remote("sheet locked")).unwrap();
        assert!(session.submit_closure().is_err());
        assert_eq!(session.tracker(), &before);
        assert!(session.closure_progress().is_ready());

        let receipt = session.submit_closure().unwrap();
        assert_eq!(receipt.closed, 3);
        assert_eq!(
            service.calls().unwrap(),
            vec![
                "getStudentStatus",
                "saveStudentStatus",
                "saveStudentStatus",
                "closeCycle"
            ]
        );
    }

    #[test]
    fn test_failed_close_leaves_records_untouched() {
        let records: Vec<SubjectRecord> = closable_records()
            .into_iter()
            .map(|r| {
                if r.is_engaged() {
                    r.with_outcome(ClosureOutcome::Failed)
                } else {
                    r
                }
            })
            .collect();
        let service = seeded(records, 3);
        let mut session = open(&service);
        let before = session.records().to_vec();

        service.fail_next(TrajectoryError::transport("timeout")).unwrap();
        assert!(session.submit_closure().unwrap_err().is_retryable());
        assert_eq!(session.records(), before.as_slice());
        assert!(!session.is_cycle_closed());

        session.submit_closure().unwrap();
        assert!(session.is_cycle_closed());
    }

    #[test]
    fn test_sync_catalog_adds_rows() {
        let service = seeded(closable_records(), 3);
        service
            .set_catalog(vec![crate::core::record::SubjectCatalogEntry::new(
                "BIO1",
                "Biologia I",
                1,
            )])
            .unwrap();
        let mut session = open(&service);

        assert_eq!(session.sync_catalog().unwrap(), 1);
        assert!(session.tracker().record("BIO1").is_some());
        assert!(!session.can_save());
    }

    #[test]
    fn test_sync_refused_with_pending_edits() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        session.set_status("MAT3", Status::Repeat).unwrap();
        assert!(session.sync_catalog().unwrap_err().is_local());
    }

    #[test]
    fn test_discard_changes() {
        let service = seeded(closable_records(), 3);
        let mut session = open(&service);
        session.set_status("MAT3", Status::Repeat).unwrap();
        session.toggle_outcome("LEN2", OutcomeChoice::Passed).unwrap();

        session.discard_changes();

        assert!(!session.can_save());
        assert_eq!(
            session.tracker().record("MAT3").unwrap().status,
            Status::FirstTime
        );
        assert_eq!(
            session.tracker().record("LEN2").unwrap().outcome,
            ClosureOutcome::Unset
        );
    }

    #[test]
    fn test_open_unknown_student_fails() {
        let service = seeded(closable_records(), 3);
        assert!(
            StudentSession::open(Arc::clone(&service), SessionSettings::default(), "2026", "S9")
                .is_err()
        );
    }

    #[test]
    fn test_plan_text_uses_student() {
        let service = seeded(closable_records(), 3);
        let session = open(&service);
        let text = session.plan_text();
        assert!(text.contains("Perez, Ana (2026)"));
        assert!(text.contains("Intensifying: Lengua II"));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.remote.actor = "preceptor".into();
        config.policy.owed = OwedPolicy::BelowCurrentGrade;
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.actor, "preceptor");
        assert_eq!(settings.owed_policy, OwedPolicy::BelowCurrentGrade);
    }
}
