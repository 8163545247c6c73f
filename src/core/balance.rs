//! Capacity balancing ("auto-adjust").
//!
//! Brings the regular load down to its cap by moving subjects into
//! [`Status::CappedOut`], one at a time, through the change tracker. The
//! intensification cap is reported by the alerts but never corrected here.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::classify::loads;
use crate::core::record::{display_order, FieldValue, Status, SubjectId, SubjectRecord};
use crate::core::tracker::ChangeTracker;
use crate::error::Result;

/// Default regular-load cap.
pub const REGULAR_CAP: usize = 12;

/// Default intensification-load cap.
pub const INTENSIFICATION_CAP: usize = 4;

/// Default terminal grade level.
pub const TERMINAL_GRADE: u8 = 6;

/// Load caps and the grade they pivot on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of first-time plus repeat subjects.
    pub regular_cap: usize,
    /// Maximum number of intensification subjects.
    pub intensification_cap: usize,
    /// Last grade level of the program.
    pub terminal_grade: u8,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            regular_cap: REGULAR_CAP,
            intensification_cap: INTENSIFICATION_CAP,
            terminal_grade: TERMINAL_GRADE,
        }
    }
}

/// Which regular sub-list gives up subjects first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemotionOrder {
    /// Always cap out first-time subjects before repeats.
    #[default]
    FirstTimeFirst,
    /// In the terminal grade, cap out repeats first (highest grade first)
    /// and keep the current year's subjects; in every other grade,
    /// first-time subjects go first and any spill-over takes the
    /// lowest-grade repeats.
    RepeatFirstInTerminalGrade,
}

/// Valid config spellings for [`DemotionOrder`].
pub const VALID_DEMOTION_ORDERS: &[&str] = &["first-time-first", "repeat-first-in-terminal-grade"];

impl DemotionOrder {
    /// Parse a config value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "first-time-first" => Some(Self::FirstTimeFirst),
            "repeat-first-in-terminal-grade" => Some(Self::RepeatFirstInTerminalGrade),
            _ => None,
        }
    }

    /// Config spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::FirstTimeFirst => "first-time-first",
            Self::RepeatFirstInTerminalGrade => "repeat-first-in-terminal-grade",
        }
    }

    /// Whether repeats are demoted before first-time subjects for this student.
    pub fn repeats_first(self, student_grade: Option<u8>, limits: &Limits) -> bool {
        match self {
            Self::FirstTimeFirst => false,
            Self::RepeatFirstInTerminalGrade => student_grade == Some(limits.terminal_grade),
        }
    }

    /// The two sub-lists in the order they give up subjects, each with its
    /// own sort.
    fn queues(self, student_grade: Option<u8>, limits: &Limits) -> [(Status, QueueOrder); 2] {
        match self {
            Self::FirstTimeFirst => [
                (Status::FirstTime, display_order as QueueOrder),
                (Status::Repeat, display_order as QueueOrder),
            ],
            Self::RepeatFirstInTerminalGrade if self.repeats_first(student_grade, limits) => [
                (Status::Repeat, highest_grade_first as QueueOrder),
                (Status::FirstTime, display_order as QueueOrder),
            ],
            Self::RepeatFirstInTerminalGrade => [
                (Status::FirstTime, display_order as QueueOrder),
                (Status::Repeat, lowest_grade_reverse_name as QueueOrder),
            ],
        }
    }

    /// One-line description of the rule in force, for alerts.
    pub fn describe(self, student_grade: Option<u8>, limits: &Limits) -> &'static str {
        if self.repeats_first(student_grade, limits) {
            "In the terminal grade the current year's subjects are kept and repeats are capped out first."
        } else {
            "First-time subjects are capped out first, lowest grade first; repeats are kept."
        }
    }
}

/// One subject moved to capped-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Demotion {
    /// Subject id.
    pub subject_id: SubjectId,
    /// Subject name.
    pub name: String,
    /// Status before the move.
    pub from: Status,
    /// Regular load right after this move.
    pub regular_load_after: usize,
}

/// What a balancing pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalanceReport {
    /// Regular load before the pass.
    pub regular_before: usize,
    /// Regular load after the pass.
    pub regular_after: usize,
    /// Moves in the order they were applied.
    pub moves: Vec<Demotion>,
}

impl BalanceReport {
    /// Number of subjects moved.
    pub fn moved(&self) -> usize {
        self.moves.len()
    }

    /// Whether the pass reached the cap.
    pub fn within_cap(&self, limits: &Limits) -> bool {
        self.regular_after <= limits.regular_cap
    }
}

/// The balancing algorithm with its policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balancer {
    order: DemotionOrder,
    limits: Limits,
}

impl Balancer {
    /// Create a balancer.
    pub fn new(order: DemotionOrder, limits: Limits) -> Self {
        Self { order, limits }
    }

    /// The demotion order in force.
    pub fn order(&self) -> DemotionOrder {
        self.order
    }

    /// The caps in force.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Demote subjects until the regular load is within the cap.
    ///
    /// A no-op (zero moves) when already within the cap. Each move goes
    /// through [`ChangeTracker::set_field`] and the running load is
    /// recomputed from the live records after every move.
    pub fn run(
        &self,
        tracker: &mut ChangeTracker,
        student_grade: Option<u8>,
    ) -> Result<BalanceReport> {
        let cap = self.limits.regular_cap;
        let before = loads(tracker.records()).regular;
        let mut report = BalanceReport {
            regular_before: before,
            regular_after: before,
            moves: Vec::new(),
        };

        if before <= cap {
            return Ok(report);
        }

        let queues = self
            .order
            .queues(student_grade, &self.limits)
            .map(|(status, order)| sub_list(tracker.records(), status, order));

        let mut total = before;
        for queue in queues {
            for (subject_id, name, from) in queue {
                if total <= cap {
                    break;
                }
                tracker.set_field(&subject_id, FieldValue::Status(Status::CappedOut))?;
                let after = loads(tracker.records()).regular;
                if after >= total {
                    tracing::warn!(subject = %subject_id, "capping out did not lower the regular load");
                    continue;
                }
                total = after;
                report.moves.push(Demotion {
                    subject_id,
                    name,
                    from,
                    regular_load_after: total,
                });
            }
        }

        report.regular_after = total;

        tracing::info!(
            before,
            after = total,
            moved = report.moved(),
            order = self.order.name(),
            "balanced regular load"
        );
        if total > cap {
            tracing::warn!(after = total, cap, "regular load still over cap after balancing");
        }

        Ok(report)
    }

    /// What [`run`](Self::run) would do, without touching the tracker.
    pub fn preview(&self, tracker: &ChangeTracker, student_grade: Option<u8>) -> Result<BalanceReport> {
        let mut scratch = tracker.clone();
        self.run(&mut scratch, student_grade)
    }
}

type QueueOrder = fn(&SubjectRecord, &SubjectRecord) -> Ordering;

/// Highest grade first, then name.
fn highest_grade_first(a: &SubjectRecord, b: &SubjectRecord) -> Ordering {
    b.grade
        .unwrap_or(0)
        .cmp(&a.grade.unwrap_or(0))
        .then_with(|| a.display_name().cmp(b.display_name()))
        .then_with(|| a.subject_id.cmp(&b.subject_id))
}

/// Lowest grade first, names in reverse.
fn lowest_grade_reverse_name(a: &SubjectRecord, b: &SubjectRecord) -> Ordering {
    a.grade
        .unwrap_or(0)
        .cmp(&b.grade.unwrap_or(0))
        .then_with(|| b.display_name().cmp(a.display_name()))
        .then_with(|| b.subject_id.cmp(&a.subject_id))
}

/// Regular records with the given status, in demotion order.
///
/// Only the first row of a repeated subject id is listed, since that is the
/// row an edit reaches.
fn sub_list(
    records: &[SubjectRecord],
    status: Status,
    order: QueueOrder,
) -> Vec<(SubjectId, String, Status)> {
    let mut seen = BTreeSet::new();
    let mut matching: Vec<&SubjectRecord> = records
        .iter()
        .filter(|r| !r.subject_id.is_empty())
        .filter(|r| {
            let first = seen.insert(r.subject_id.as_str());
            let wanted = r.is_regular() && r.status == status;
            if !first && wanted {
                tracing::warn!(subject = %r.subject_id, "duplicate subject row skipped by balancing");
            }
            first && wanted
        })
        .collect();
    matching.sort_by(|a, b| order(a, b));
    matching
        .into_iter()
        .map(|r| (r.subject_id.clone(), r.name.clone(), r.status))
        .collect()
}
