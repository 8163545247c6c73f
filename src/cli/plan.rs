//! Plan command: the family-facing annual plan text.

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::SessionSettings;
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the plan command.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutput {
    pub success: bool,
    pub student_id: String,
    /// Plain-text plan, ready to paste into a message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub exit_code: i32,
}

/// The plan command implementation.
pub struct PlanCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> PlanCommand<S> {
    /// Create a new plan command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Render the plan for one student.
    pub fn run(&self, student_id: &str) -> PlanOutput {
        match open_session(&self.service, &self.settings, &self.cycle, student_id) {
            Ok(session) => PlanOutput {
                success: true,
                student_id: student_id.to_string(),
                text: Some(session.plan_text()),
                error: None,
                exit_code: exit_codes::SUCCESS,
            },
            Err(e) => failure(student_id, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &PlanOutput, options: &OutputOptions) -> String {
        render(output, options, || match &output.text {
            Some(text) if text.ends_with('\n') => text.clone(),
            Some(text) => format!("{text}\n"),
            None => format!(
                "Plan failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        })
    }
}

fn failure(student_id: &str, error: &TrajectoryError) -> PlanOutput {
    PlanOutput {
        success: false,
        student_id: student_id.to_string(),
        text: None,
        error: Some(error.to_string()),
        exit_code: exit_code_for(error),
    }
}
