//! Set command: change subject statuses and save them.

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::{SessionSettings, Status};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the set command.
#[derive(Debug, Clone, Serialize)]
pub struct SetOutput {
    /// Whether the edits were applied and saved.
    pub success: bool,
    /// The student edited.
    pub student_id: String,
    /// Subjects whose status now differs from the stored one.
    pub changed: usize,
    /// Subjects written to the service.
    pub saved: usize,
    /// Cap alerts after the save.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<String>,
    /// Error message if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl SetOutput {
    /// Create a successful output.
    pub fn success(student_id: &str, changed: usize, saved: usize, alerts: Vec<String>) -> Self {
        Self {
            success: true,
            student_id: student_id.to_string(),
            changed,
            saved,
            alerts,
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(student_id: &str, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            student_id: student_id.to_string(),
            changed: 0,
            saved: 0,
            alerts: Vec::new(),
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The set command implementation.
pub struct SetCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> SetCommand<S> {
    /// Create a new set command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Apply `(subject id, status)` edits in order and save them.
    ///
    /// Any rejected edit aborts the whole command before anything is sent.
    pub fn run(&self, student_id: &str, edits: &[(String, Status)]) -> SetOutput {
        let mut session =
            match open_session(&self.service, &self.settings, &self.cycle, student_id) {
                Ok(session) => session,
                Err(e) => return SetOutput::failure(student_id, &e),
            };

        for (subject_id, status) in edits {
            if let Err(e) = session.set_status(subject_id, *status) {
                return SetOutput::failure(student_id, &e);
            }
        }

        let changed = session.tracker().dirty().len();
        if !session.can_save() {
            let alerts = session.alerts().iter().map(|a| a.message()).collect();
            return SetOutput::success(student_id, 0, 0, alerts);
        }

        match session.save() {
            Ok(saved) => {
                let alerts = session.alerts().iter().map(|a| a.message()).collect();
                SetOutput::success(student_id, changed, saved, alerts)
            }
            Err(e) => SetOutput::failure(student_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SetOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if !output.success {
                return format!(
                    "Set failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
            let mut text = if output.saved == 0 {
                "Nothing changed.\n".to_string()
            } else {
                format!("Saved {} subject(s) for {}.\n", output.saved, output.student_id)
            };
            for alert in &output.alerts {
                text.push_str(&format!("! {alert}\n"));
            }
            text
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::fixtures;
    use crate::remote::MemoryService;
    use std::sync::Arc;

    fn command(service: &Arc<MemoryService>) -> SetCommand<Arc<MemoryService>> {
        SetCommand::new(Arc::clone(service), "2026", SessionSettings::default())
    }

    #[test]
    fn test_set_saves_changed_subjects() {
        let service = fixtures::service();
        let output = command(&service).run("S1", &[("MAT3".to_string(), Status::Deferred)]);

        assert!(output.success);
        assert_eq!(output.saved, 1);
        let stored = service.status("2026", "S1").unwrap().unwrap();
        let mat = stored
            .records
            .iter()
            .find(|r| r.subject_id == "MAT3")
            .unwrap();
        assert_eq!(mat.status, Status::Deferred);
    }

    #[test]
    fn test_set_to_same_value_skips_save() {
        let service = fixtures::service();
        let output = command(&service).run("S1", &[("MAT3".to_string(), Status::FirstTime)]);

        assert!(output.success);
        assert_eq!(output.saved, 0);
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
    }

    #[test]
    fn test_set_approved_subject_blocked() {
        let service = fixtures::service();
        let output = command(&service).run(
            "S1",
            &[
                ("MAT3".to_string(), Status::Deferred),
                ("HIS1".to_string(), Status::Repeat),
            ],
        );

        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::BLOCKED);
        let stored = service.status("2026", "S1").unwrap().unwrap();
        assert!(stored
            .records
            .iter()
            .all(|r| r.status != Status::Deferred));
    }

    #[test]
    fn test_set_unknown_subject_blocked() {
        let service = fixtures::service();
        let output = command(&service).run("S1", &[("NOPE".to_string(), Status::Repeat)]);
        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::BLOCKED);
    }
}
