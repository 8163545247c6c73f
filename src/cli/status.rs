//! Status command: one student's buckets, loads and alerts.

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::{
    Classification, ClosureProgress, Loads, RuleAlert, SessionSettings, Student, StudentSession,
    SubjectRecord,
};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    /// Whether the student was loaded.
    pub success: bool,
    /// The cycle shown.
    pub cycle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<Student>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureProgress>,
    /// Caps currently exceeded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<RuleAlert>,
    /// Whether the cycle is closed for this student.
    pub cycle_closed: bool,
    /// Error message if loading failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl StatusOutput {
    /// Build the output from an open session.
    pub fn from_session<S: TrajectoryService>(session: &StudentSession<S>) -> Self {
        Self {
            success: true,
            cycle: session.cycle().to_string(),
            student: Some(session.student().clone()),
            classification: Some(session.classification()),
            closure: Some(session.closure_progress()),
            alerts: session.alerts(),
            cycle_closed: session.is_cycle_closed(),
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(cycle: &str, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            cycle: cycle.to_string(),
            student: None,
            classification: None,
            closure: None,
            alerts: Vec::new(),
            cycle_closed: false,
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }

    /// Load counters, zero when loading failed.
    pub fn loads(&self) -> Loads {
        self.classification
            .as_ref()
            .map(|c| c.loads)
            .unwrap_or_default()
    }
}

/// The status command implementation.
pub struct StatusCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> StatusCommand<S> {
    /// Create a new status command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Run the status command for one student.
    pub fn run(&self, student_id: &str) -> StatusOutput {
        match open_session(&self.service, &self.settings, &self.cycle, student_id) {
            Ok(session) => StatusOutput::from_session(&session),
            Err(e) => StatusOutput::failure(&self.cycle, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatusOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            let (Some(student), Some(c), Some(closure)) =
                (&output.student, &output.classification, &output.closure)
            else {
                return format!(
                    "Loading student failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            };

            let grade = student
                .grade
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut text = format!(
                "{} ({}) - grade {} {} {} - cycle {}{}\n\n",
                student.display_name(),
                student.id,
                grade,
                student.division,
                student.shift,
                output.cycle,
                if output.cycle_closed { " [closed]" } else { "" }
            );

            section(&mut text, "Approved", &c.approved);
            section(&mut text, "Owed", &c.owed);
            section(&mut text, "First time", &c.first_time);
            section(&mut text, "Repeat", &c.repeat);
            section(&mut text, "Intensification", &c.intensification);
            section(&mut text, "Not enrolled (load cap)", &c.capped_out);

            text.push_str(&format!(
                "Regular load: {}  Intensification load: {}\n",
                c.loads.regular, c.loads.intensification
            ));
            text.push_str(&format!(
                "Closure: {}/{} outcomes recorded\n",
                closure.marked(),
                closure.total
            ));
            for alert in &output.alerts {
                text.push_str(&format!("! {}\n", alert.message()));
            }
            text
        })
    }
}

fn section(text: &mut String, title: &str, records: &[SubjectRecord]) {
    if records.is_empty() {
        return;
    }
    text.push_str(&format!("{title} ({}):\n", records.len()));
    for record in records {
        let grade = record
            .grade
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        text.push_str(&format!(
            "  [{grade}] {:<28} {}\n",
            record.display_name(),
            record.subject_id
        ));
    }
    text.push('\n');
}
