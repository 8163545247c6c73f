//! Students command: the roster of a cycle, optionally filtered.

use serde::Serialize;

use crate::cli::{exit_code_for, render, OutputOptions};
use crate::core::StudentSummary;
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the students command.
#[derive(Debug, Clone, Serialize)]
pub struct StudentsOutput {
    /// Whether the listing succeeded.
    pub success: bool,
    /// The cycle listed.
    pub cycle: String,
    /// Number of students shown.
    pub count: usize,
    /// Matching students.
    pub students: Vec<StudentSummary>,
    /// Error message if the listing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl StudentsOutput {
    /// Create a successful output.
    pub fn success(cycle: &str, students: Vec<StudentSummary>) -> Self {
        Self {
            success: true,
            cycle: cycle.to_string(),
            count: students.len(),
            students,
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(cycle: &str, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            cycle: cycle.to_string(),
            count: 0,
            students: Vec::new(),
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The students command implementation.
pub struct StudentsCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
}

impl<S: TrajectoryService> StudentsCommand<S> {
    /// Create a new students command.
    pub fn new(service: S, cycle: impl Into<String>) -> Self {
        Self {
            service,
            cycle: cycle.into(),
        }
    }

    /// Run the students command, keeping rows that match `query`.
    pub fn run(&self, query: Option<&str>) -> StudentsOutput {
        match self.service.students(&self.cycle) {
            Ok(students) => {
                let students = match query {
                    Some(q) => students.into_iter().filter(|s| s.matches(q)).collect(),
                    None => students,
                };
                StudentsOutput::success(&self.cycle, students)
            }
            Err(e) => StudentsOutput::failure(&self.cycle, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StudentsOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if !output.success {
                return format!(
                    "Listing students failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
            if output.students.is_empty() {
                return format!("No students found for {}.\n", output.cycle);
            }

            let mut text = format!("{} students ({}):\n\n", output.count, output.cycle);
            for student in &output.students {
                let grade = student
                    .grade
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let mut flags = Vec::new();
                if student.cycle_closed {
                    flags.push("closed");
                }
                if student.needs_review {
                    flags.push("review");
                }
                let flags = if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                };
                text.push_str(&format!(
                    "  {:<10} {:<28} grade {} {} {}{}\n",
                    student.id,
                    student.display_name(),
                    grade,
                    student.division,
                    student.shift,
                    flags
                ));
            }
            text
        })
    }
}
