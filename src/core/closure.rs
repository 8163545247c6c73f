//! End-of-cycle closure gating.
//!
//! Closure is only offered once every engaged subject (first-time, repeat or
//! intensification, and not already approved) carries a pass/fail outcome.
//! Outcomes are written through the change tracker like any other edit.

use serde::{Deserialize, Serialize};

use crate::core::record::{display_order, ClosureOutcome, FieldValue, SubjectRecord};
use crate::core::tracker::ChangeTracker;
use crate::error::{Result, TrajectoryError};

/// How far a student is from being closable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureProgress {
    /// Engaged subjects.
    pub total: usize,
    /// Engaged subjects still without an outcome.
    pub missing: usize,
}

impl ClosureProgress {
    /// Closure is enabled iff nothing is missing and there is something to close.
    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.missing == 0
    }

    /// Subjects with an outcome.
    pub fn marked(&self) -> usize {
        self.total - self.missing
    }
}

/// One of the two outcome buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeChoice {
    Passed,
    Failed,
}

impl OutcomeChoice {
    /// The outcome this choice records.
    pub fn outcome(self) -> ClosureOutcome {
        match self {
            Self::Passed => ClosureOutcome::Passed,
            Self::Failed => ClosureOutcome::Failed,
        }
    }
}

/// Engaged records in display order.
pub fn engaged(records: &[SubjectRecord]) -> Vec<&SubjectRecord> {
    let mut out: Vec<&SubjectRecord> = records.iter().filter(|r| r.is_engaged()).collect();
    out.sort_by(|a, b| display_order(a, b));
    out
}

/// Count engaged subjects and those still missing an outcome.
pub fn progress(records: &[SubjectRecord]) -> ClosureProgress {
    records
        .iter()
        .filter(|r| r.is_engaged())
        .fold(ClosureProgress::default(), |mut acc, r| {
            acc.total += 1;
            if !r.outcome.is_set() {
                acc.missing += 1;
            }
            acc
        })
}

/// Press an outcome button: selects it, or clears it when already active.
///
/// Returns the outcome now recorded on the subject.
pub fn toggle(
    tracker: &mut ChangeTracker,
    subject_id: &str,
    choice: OutcomeChoice,
) -> Result<ClosureOutcome> {
    let current = tracker
        .record(subject_id)
        .map(|r| r.outcome)
        .ok_or_else(|| TrajectoryError::unknown_subject(subject_id))?;

    let next = if current == choice.outcome() {
        ClosureOutcome::Unset
    } else {
        choice.outcome()
    };

    tracker.set_field(subject_id, FieldValue::Outcome(next))?;
    Ok(next)
}

/// Fail with a local rejection unless closure is enabled.
pub fn ensure_ready(records: &[SubjectRecord]) -> Result<ClosureProgress> {
    let progress = progress(records);
    if progress.total == 0 {
        return Err(TrajectoryError::rejected(
            "no subjects are being taken this cycle; nothing to close",
        ));
    }
    if progress.missing > 0 {
        return Err(TrajectoryError::rejected(format!(
            "{} of {} subjects still need an outcome",
            progress.missing, progress.total
        )));
    }
    Ok(progress)
}
