//! Core engine: records, classification, change tracking, balancing and
//! closure, plus the per-student session that drives them.

pub mod alerts;
pub mod balance;
pub mod classify;
pub mod closure;
pub mod plan;
pub mod record;
pub mod session;
pub mod tracker;

pub use alerts::{alerts, RuleAlert};
pub use balance::{BalanceReport, Balancer, Demotion, DemotionOrder, Limits};
pub use classify::{
    classify, classify_with, loads, Classification, ClassifyContext, Loads, OwedPolicy, OwedRule,
};
pub use closure::{ClosureProgress, OutcomeChoice};
pub use plan::plan_text;
pub use record::{
    display_order, AcademicCondition, ClosureOutcome, EditableField, FieldValue, Status, Student,
    StudentStatus, StudentSummary, SubjectCatalogEntry, SubjectId, SubjectRecord,
};
pub use session::{ClosureReceipt, SessionSettings, StudentSession};
pub use tracker::{ChangeTracker, DirtyFields, SubjectUpdate};
