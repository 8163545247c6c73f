//! Sync command: add catalog subjects a student is missing.

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::SessionSettings;
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the sync command.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    /// Whether the sync ran.
    pub success: bool,
    /// The student synced.
    pub student_id: String,
    /// Rows added.
    pub added: usize,
    /// Subjects the student has after the sync.
    pub total: usize,
    /// Error message if the sync failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl SyncOutput {
    /// Create a failed output.
    pub fn failure(student_id: &str, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            student_id: student_id.to_string(),
            added: 0,
            total: 0,
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The sync command implementation.
pub struct SyncCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> SyncCommand<S> {
    /// Create a new sync command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Run the sync for one student.
    pub fn run(&self, student_id: &str) -> SyncOutput {
        let mut session =
            match open_session(&self.service, &self.settings, &self.cycle, student_id) {
                Ok(session) => session,
                Err(e) => return SyncOutput::failure(student_id, &e),
            };

        match session.sync_catalog() {
            Ok(added) => SyncOutput {
                success: true,
                student_id: student_id.to_string(),
                added,
                total: session.records().len(),
                error: None,
                exit_code: exit_codes::SUCCESS,
            },
            Err(e) => SyncOutput::failure(student_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SyncOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if !output.success {
                return format!(
                    "Sync failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
            match output.added {
                0 => format!("{} already has every catalog subject.\n", output.student_id),
                n => format!(
                    "Added {n} subject(s) for {} ({} total).\n",
                    output.student_id, output.total
                ),
            }
        })
    }
}
