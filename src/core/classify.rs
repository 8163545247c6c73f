//! Record classification.
//!
//! Partitions a student's records into display buckets and derives the two
//! load counters. Pure: the same input always yields the same output and
//! nothing is mutated.

use serde::{Deserialize, Serialize};

use crate::core::record::{display_order, AcademicCondition, ClosureOutcome, Status, SubjectRecord};

/// Student attributes the classifier needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Current grade level, if known.
    pub current_grade: Option<u8>,
    /// Whether the student has graduated.
    pub graduated: bool,
}

/// Predicate deciding whether an owed-or-failed record belongs in the owed bucket.
pub type OwedRule = fn(&SubjectRecord, &ClassifyContext) -> bool;

/// Eligibility policy for the owed bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwedPolicy {
    /// Every owed or failed record, whatever its grade.
    #[default]
    AnyGrade,
    /// Only records from a grade below the student's current one, unless graduated.
    BelowCurrentGrade,
}

/// Valid config spellings for [`OwedPolicy`].
pub const VALID_OWED_POLICIES: &[&str] = &["any-grade", "below-current-grade"];

impl OwedPolicy {
    /// Parse a config value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "any-grade" => Some(Self::AnyGrade),
            "below-current-grade" => Some(Self::BelowCurrentGrade),
            _ => None,
        }
    }

    /// Config spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::AnyGrade => "any-grade",
            Self::BelowCurrentGrade => "below-current-grade",
        }
    }

    /// The predicate implementing this policy.
    pub fn rule(self) -> OwedRule {
        match self {
            Self::AnyGrade => owed_any_grade,
            Self::BelowCurrentGrade => owed_below_current_grade,
        }
    }
}

/// Admit every candidate.
pub fn owed_any_grade(_record: &SubjectRecord, _ctx: &ClassifyContext) -> bool {
    true
}

/// Admit candidates from earlier grades; graduates owe everything still open.
///
/// Records with no grade, or students with no current grade, are excluded.
pub fn owed_below_current_grade(record: &SubjectRecord, ctx: &ClassifyContext) -> bool {
    if ctx.graduated {
        return true;
    }
    match (record.grade, ctx.current_grade) {
        (Some(subject), Some(current)) => subject < current,
        _ => false,
    }
}

/// Base owed rule shared by every policy.
fn is_owed_candidate(record: &SubjectRecord) -> bool {
    if record.status == Status::Deferred || record.is_approved() {
        return false;
    }
    record.condition == AcademicCondition::Owed || record.outcome == ClosureOutcome::Failed
}

/// Regular and intensification load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loads {
    /// Subjects taken for the first time or repeated.
    pub regular: usize,
    /// Subjects in intensification.
    pub intensification: usize,
}

/// Compute loads without building buckets.
pub fn loads(records: &[SubjectRecord]) -> Loads {
    records
        .iter()
        .filter(|record| !record.subject_id.is_empty())
        .fold(Loads::default(), |mut acc, record| {
            if record.is_regular() {
                acc.regular += 1;
            }
            if record.is_intensification() {
                acc.intensification += 1;
            }
            acc
        })
}

/// Buckets and counters for one student and cycle.
///
/// Buckets hold clones sorted by grade then name. They may overlap (an owed
/// subject can also be in intensification).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub approved: Vec<SubjectRecord>,
    pub owed: Vec<SubjectRecord>,
    pub first_time: Vec<SubjectRecord>,
    pub repeat: Vec<SubjectRecord>,
    pub intensification: Vec<SubjectRecord>,
    pub capped_out: Vec<SubjectRecord>,
    pub loads: Loads,
}

impl Classification {
    /// Regular load.
    pub fn regular_load(&self) -> usize {
        self.loads.regular
    }

    /// Intensification load.
    pub fn intensification_load(&self) -> usize {
        self.loads.intensification
    }
}

/// Classify records under the given owed policy.
pub fn classify(
    records: &[SubjectRecord],
    ctx: &ClassifyContext,
    policy: OwedPolicy,
) -> Classification {
    classify_with(records, ctx, policy.rule())
}

/// Classify records with an arbitrary owed rule.
pub fn classify_with(
    records: &[SubjectRecord],
    ctx: &ClassifyContext,
    owed_rule: OwedRule,
) -> Classification {
    let mut out = Classification::default();

    for record in records {
        if record.subject_id.is_empty() {
            continue;
        }

        if record.is_approved() {
            out.approved.push(record.clone());
            continue;
        }

        if is_owed_candidate(record) && owed_rule(record, ctx) {
            out.owed.push(record.clone());
        }

        match record.status {
            Status::FirstTime => out.first_time.push(record.clone()),
            Status::Repeat => out.repeat.push(record.clone()),
            Status::Intensification => out.intensification.push(record.clone()),
            Status::CappedOut => out.capped_out.push(record.clone()),
            _ => {}
        }
    }

    for bucket in [
        &mut out.approved,
        &mut out.owed,
        &mut out.first_time,
        &mut out.repeat,
        &mut out.intensification,
        &mut out.capped_out,
    ] {
        bucket.sort_by(display_order);
    }

    out.loads = Loads {
        regular: out.first_time.len() + out.repeat.len(),
        intensification: out.intensification.len(),
    };

    tracing::debug!(
        regular = out.loads.regular,
        intensification = out.loads.intensification,
        owed = out.owed.len(),
        approved = out.approved.len(),
        "classified records"
    );

    out
}
