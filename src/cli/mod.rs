//! CLI commands for the trajectory engine.
//!
//! Each command follows the same shape: a `XCommand` that owns a service
//! handle, a serializable `XOutput` with `success` and `error`, and a
//! `format_output` that renders JSON or human text.
//!
//! - **Service commands**: ping, cycles, students, summary, rollover
//! - **Student commands**: status, set, adjust, close, sync, plan

use serde::Serialize;

use crate::core::{SessionSettings, StudentSession};
use crate::error::{exit_codes, Result, TrajectoryError};
use crate::remote::TrajectoryService;

// Service commands
pub mod cycles;
pub mod ping;
pub mod rollover;
pub mod students;
pub mod summary;

// Student commands
pub mod adjust;
pub mod close;
pub mod plan;
pub mod set;
pub mod status;
pub mod sync;

pub use adjust::AdjustCommand;
pub use close::CloseCommand;
pub use cycles::CyclesCommand;
pub use ping::PingCommand;
pub use plan::PlanCommand;
pub use rollover::RolloverCommand;
pub use set::SetCommand;
pub use status::StatusCommand;
pub use students::StudentsCommand;
pub use summary::SummaryCommand;
pub use sync::SyncCommand;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Exit code for a failed command.
///
/// Local rejections (nothing to save, closure incomplete, approved subject)
/// are distinguished from remote and configuration failures.
pub fn exit_code_for(error: &TrajectoryError) -> i32 {
    if error.is_local() {
        exit_codes::BLOCKED
    } else {
        exit_codes::FAILURE
    }
}

/// Render an output as JSON, human text, or nothing.
pub(crate) fn render<T: Serialize>(
    output: &T,
    options: &OutputOptions,
    human: impl FnOnce() -> String,
) -> String {
    if options.quiet {
        return String::new();
    }

    if options.json {
        serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
    } else {
        human()
    }
}

/// Open a session borrowing the command's service.
pub(crate) fn open_session<'a, S: TrajectoryService>(
    service: &'a S,
    settings: &SessionSettings,
    cycle: &str,
    student_id: &str,
) -> Result<StudentSession<&'a S>> {
    if student_id.trim().is_empty() {
        return Err(TrajectoryError::rejected("a student id is required"));
    }
    StudentSession::open(service, settings.clone(), cycle, student_id.trim())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared seed data for command tests.

    use std::sync::Arc;

    use crate::core::{AcademicCondition, Status, Student, StudentStatus, SubjectRecord};
    use crate::remote::MemoryService;

    pub fn student() -> Student {
        Student {
            id: "S1".into(),
            surname: "Perez".into(),
            name: "Ana".into(),
            grade: Some(3),
            division: "3A".into(),
            shift: "Manana".into(),
            ..Default::default()
        }
    }

    pub fn records() -> Vec<SubjectRecord> {
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

    pub fn over_cap_records() -> Vec<SubjectRecord> {
        (1..=14)
            .map(|i| {
                SubjectRecord::new(format!("F{i:02}"), format!("Subject {i:02}"), 3)
                    .with_status(Status::FirstTime)
            })
            .collect()
    }

    pub fn service_with(records: Vec<SubjectRecord>) -> Arc<MemoryService> {
        let service = Arc::new(MemoryService::new());
        service
            .insert_status(StudentStatus {
                cycle: "2026".into(),
                student: student(),
                records,
            })
            .unwrap();
        service
    }

    pub fn service() -> Arc<MemoryService> {
        service_with(records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_local_and_remote() {
        assert_eq!(
            exit_code_for(&TrajectoryError::rejected("x")),
            exit_codes::BLOCKED
        );
        assert_eq!(
            exit_code_for(&TrajectoryError::unknown_subject("x")),
            exit_codes::BLOCKED
        );
        assert_eq!(
            exit_code_for(&TrajectoryError::transport("x")),
            exit_codes::FAILURE
        );
    }

    #[test]
    fn test_render_modes() {
        let value = serde_json::json!({"success": true});
        let quiet = OutputOptions {
            json: false,
            quiet: true,
        };
        assert_eq!(render(&value, &quiet, || "text".into()), "");

        let json = OutputOptions {
            json: true,
            quiet: false,
        };
        assert!(render(&value, &json, || "text".into()).contains("\"success\": true"));

        assert_eq!(
            render(&value, &OutputOptions::default(), || "text".into()),
            "text"
        );
    }

    #[test]
    fn test_open_session_requires_student() {
        let service = fixtures::service();
        let err = open_session(&service, &SessionSettings::default(), "2026", " ").unwrap_err();
        assert!(err.is_local());
    }
}
