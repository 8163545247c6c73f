//! Rollover command: promote a whole cycle into the next one.
//!
//! The promotion runs on the server; this command only validates the
//! request and reports the counters it returns.

use serde::Serialize;

use crate::cli::{exit_code_for, render, OutputOptions};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::{RolloverReport, RolloverRequest, TrajectoryService};

/// Options for the rollover command.
#[derive(Debug, Clone)]
pub struct RolloverOptions {
    /// Advance each student's grade.
    pub update_students: bool,
    /// Carry section assignments over.
    pub update_division: bool,
}

impl Default for RolloverOptions {
    fn default() -> Self {
        Self {
            update_students: true,
            update_division: true,
        }
    }
}

/// Output format for the rollover command.
#[derive(Debug, Clone, Serialize)]
pub struct RolloverOutput {
    /// Whether the rollover ran.
    pub success: bool,
    /// Counters reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RolloverReport>,
    /// Error message if the rollover failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl RolloverOutput {
    /// Create a successful output.
    pub fn success(report: RolloverReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(error: &TrajectoryError) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The rollover command implementation.
pub struct RolloverCommand<S: TrajectoryService> {
    service: S,
    actor: String,
}

impl<S: TrajectoryService> RolloverCommand<S> {
    /// Create a new rollover command.
    pub fn new(service: S, actor: impl Into<String>) -> Self {
        Self {
            service,
            actor: actor.into(),
        }
    }

    /// Run the rollover from `origin` into `destination`.
    pub fn run(&self, origin: &str, destination: &str, options: &RolloverOptions) -> RolloverOutput {
        let request = RolloverRequest {
            origin: origin.trim().to_string(),
            destination: destination.trim().to_string(),
            actor: self.actor.clone(),
            update_students: options.update_students,
            update_division: options.update_division,
        };
        if let Err(e) = request.validate() {
            return RolloverOutput::failure(&e);
        }

        match self.service.rollover(&request) {
            Ok(report) => {
                tracing::info!(
                    origin,
                    destination,
                    created = report.rows_created,
                    promoted = report.students_promoted,
                    "rollover finished"
                );
                RolloverOutput::success(report)
            }
            Err(e) => RolloverOutput::failure(&e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &RolloverOutput, options: &OutputOptions) -> String {
        render(output, options, || match (&output.report, &output.error) {
            (Some(r), _) => {
                let mut text = format!("Rollover {} -> {}\n", r.origin, r.destination);
                if !r.origin_exists {
                    text.push_str("  Warning: the origin cycle had no rows.\n");
                }
                text.push_str(&format!("  Rows created:            {}\n", r.rows_created));
                text.push_str(&format!("  Rows updated:            {}\n", r.rows_updated));
                text.push_str(&format!(
                    "  Rows skipped (in use):   {}\n",
                    r.rows_skipped_in_use
                ));
                text.push_str(&format!(
                    "  Students promoted:       {}\n",
                    r.students_promoted
                ));
                text.push_str(&format!(
                    "  Students flagged:        {}\n",
                    r.students_flagged
                ));
                text
            }
            (None, error) => format!(
                "Rollover failed: {}\n",
                error.as_deref().unwrap_or("unknown error")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::fixtures;

    #[test]
    fn test_same_cycle_blocked_locally() {
        let service = fixtures::service();
        let command = RolloverCommand::new(std::sync::Arc::clone(&service), "web");

        let output = command.run("2026", "2026", &RolloverOptions::default());

        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::BLOCKED);
        assert!(service.calls().unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_service_fails() {
        let command = RolloverCommand::new(fixtures::service(), "web");
        let output = command.run("2026", "2027", &RolloverOptions::default());
        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::FAILURE);
        let text = command.format_output(&output, &OutputOptions::default());
        assert!(text.starts_with("Rollover failed"));
    }

    #[test]
    fn test_report_formatting() {
        let command = RolloverCommand::new(fixtures::service(), "web");
        let output = RolloverOutput::success(RolloverReport {
            origin: "2026".into(),
            destination: "2027".into(),
            origin_exists: true,
            rows_created: 40,
            students_promoted: 10,
            ..Default::default()
        });
        let text = command.format_output(&output, &OutputOptions::default());
        assert!(text.contains("Rollover 2026 -> 2027"));
        assert!(text.contains("Rows created:            40"));
        assert!(!text.contains("Warning"));
    }
}
