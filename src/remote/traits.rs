//! The remote service contract.
//!
//! Every persistent read and write of the engine goes through
//! [`TrajectoryService`]. Calls are blocking and each one is a single
//! request/response round-trip.

use std::sync::Arc;

use crate::core::record::{StudentStatus, StudentSummary};
use crate::error::{Result, TrajectoryError};
use crate::remote::envelope::{
    CloseRequest, DivisionRisk, RolloverReport, RolloverRequest, SaveRequest, SyncRequest,
    SyncResult,
};

/// Trait for remote trajectory services.
pub trait TrajectoryService: Send + Sync {
    /// Human-readable name of the service.
    fn name(&self) -> &'static str;

    /// Connectivity check.
    fn ping(&self) -> Result<()>;

    /// Known cycle labels.
    fn cycles(&self) -> Result<Vec<String>>;

    /// Roster for a cycle.
    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>>;

    /// The authoritative record set for one student.
    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus>;

    /// Persist a dirty map and return the record set afterwards.
    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus>;

    /// Close the cycle for one student and return the record set afterwards.
    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus>;

    /// Add catalog rows the student is missing.
    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult>;

    /// Students at risk per section.
    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>>;

    /// Promote a whole cycle into the next one.
    ///
    /// Not every service supports this.
    fn rollover(&self, _request: &RolloverRequest) -> Result<RolloverReport> {
        Err(TrajectoryError::remote(format!(
            "rollover is not supported by the {} service",
            self.name()
        )))
    }
}

/// Blanket implementation for Arc-wrapped services.
///
/// Lets tests keep a handle on a service they hand to a session.
impl<T: TrajectoryService + ?Sized> TrajectoryService for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn cycles(&self) -> Result<Vec<String>> {
        (**self).cycles()
    }

    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>> {
        (**self).students(cycle)
    }

    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus> {
        (**self).fetch_status(cycle, student_id)
    }

    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus> {
        (**self).save_status(request)
    }

    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus> {
        (**self).close_cycle(request)
    }

    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult> {
        (**self).sync_catalog(request)
    }

    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>> {
        (**self).division_risk_summary(cycle, threshold)
    }

    fn rollover(&self, request: &RolloverRequest) -> Result<RolloverReport> {
        (**self).rollover(request)
    }
}

/// Blanket implementation for boxed services.
impl<T: TrajectoryService + ?Sized> TrajectoryService for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn cycles(&self) -> Result<Vec<String>> {
        (**self).cycles()
    }

    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>> {
        (**self).students(cycle)
    }

    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus> {
        (**self).fetch_status(cycle, student_id)
    }

    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus> {
        (**self).save_status(request)
    }

    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus> {
        (**self).close_cycle(request)
    }

    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult> {
        (**self).sync_catalog(request)
    }

    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>> {
        (**self).division_risk_summary(cycle, threshold)
    }

    fn rollover(&self, request: &RolloverRequest) -> Result<RolloverReport> {
        (**self).rollover(request)
    }
}

/// Blanket implementation for borrowed services.
///
/// Lets a command open sessions against a service it keeps owning.
impl<T: TrajectoryService + ?Sized> TrajectoryService for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn cycles(&self) -> Result<Vec<String>> {
        (**self).cycles()
    }

    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>> {
        (**self).students(cycle)
    }

    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus> {
        (**self).fetch_status(cycle, student_id)
    }

    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus> {
        (**self).save_status(request)
    }

    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus> {
        (**self).close_cycle(request)
    }

    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult> {
        (**self).sync_catalog(request)
    }

    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>> {
        (**self).division_risk_summary(cycle, threshold)
    }

    fn rollover(&self, request: &RolloverRequest) -> Result<RolloverReport> {
        (**self).rollover(request)
    }
}
