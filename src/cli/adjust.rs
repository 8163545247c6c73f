//! Adjust command: cap out subjects until the regular load fits.

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::{BalanceReport, SessionSettings};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the adjust command.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustOutput {
    /// Whether balancing ran.
    pub success: bool,
    /// True when nothing was saved on purpose.
    pub dry_run: bool,
    /// Regular-load cap in force.
    pub cap: usize,
    /// What balancing did or would do.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BalanceReport>,
    /// Subjects written to the service.
    pub saved: usize,
    /// Error message if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl AdjustOutput {
    /// Create a successful output.
    pub fn success(dry_run: bool, cap: usize, report: BalanceReport, saved: usize) -> Self {
        Self {
            success: true,
            dry_run,
            cap,
            report: Some(report),
            saved,
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(dry_run: bool, cap: usize, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            dry_run,
            cap,
            report: None,
            saved: 0,
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The adjust command implementation.
pub struct AdjustCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> AdjustCommand<S> {
    /// Create a new adjust command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Run balancing for one student, saving the moves unless `dry_run`.
    pub fn run(&self, student_id: &str, dry_run: bool) -> AdjustOutput {
        let cap = self.settings.limits.regular_cap;
        let mut session =
            match open_session(&self.service, &self.settings, &self.cycle, student_id) {
                Ok(session) => session,
                Err(e) => return AdjustOutput::failure(dry_run, cap, &e),
            };

        if dry_run {
            return match session.preview_adjust() {
                Ok(report) => AdjustOutput::success(true, cap, report, 0),
                Err(e) => AdjustOutput::failure(true, cap, &e),
            };
        }

        let report = match session.auto_adjust() {
            Ok(report) => report,
            Err(e) => return AdjustOutput::failure(false, cap, &e),
        };
        if !session.can_save() {
            return AdjustOutput::success(false, cap, report, 0);
        }

        match session.save() {
            Ok(saved) => AdjustOutput::success(false, cap, report, saved),
            Err(e) => AdjustOutput::failure(false, cap, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &AdjustOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            let Some(report) = &output.report else {
                return format!(
                    "Adjust failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            };
            if report.moves.is_empty() {
                return format!(
                    "Regular load {}/{} is within the cap; nothing to adjust.\n",
                    report.regular_before, output.cap
                );
            }

            let verb = if output.dry_run { "Would cap out" } else { "Capped out" };
            let mut text = format!(
                "{verb} {} subject(s): regular load {} -> {} (cap {})\n",
                report.moved(),
                report.regular_before,
                report.regular_after,
                output.cap
            );
            for demotion in &report.moves {
                text.push_str(&format!(
                    "  {:<10} {:<28} was {}\n",
                    demotion.subject_id,
                    demotion.name,
                    demotion.from.label()
                ));
            }
            if report.regular_after > output.cap {
                text.push_str("Still over the cap; review the remaining subjects by hand.\n");
            }
            text
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::fixtures;
    use crate::core::Status;
    use std::sync::Arc;

    #[test]
    fn test_adjust_saves_demotions() {
        let service = fixtures::service_with(fixtures::over_cap_records());
        let command = AdjustCommand::new(Arc::clone(&service), "2026", SessionSettings::default());

        let output = command.run("S1", false);

        assert!(output.success);
        assert_eq!(output.saved, 2);
        let report = output.report.as_ref().unwrap();
        assert_eq!(report.regular_before, 14);
        assert_eq!(report.regular_after, 12);
        let stored = service.status("2026", "S1").unwrap().unwrap();
        let capped = stored
            .records
            .iter()
            .filter(|r| r.status == Status::CappedOut)
            .count();
        assert_eq!(capped, 2);
    }

    #[test]
    fn test_adjust_dry_run_saves_nothing() {
        let service = fixtures::service_with(fixtures::over_cap_records());
        let command = AdjustCommand::new(Arc::clone(&service), "2026", SessionSettings::default());

        let output = command.run("S1", true);

        assert!(output.success);
        assert_eq!(output.report.as_ref().unwrap().moved(), 2);
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
        let text = command.format_output(&output, &OutputOptions::default());
        assert!(text.starts_with("Would cap out 2 subject(s)"));
    }

    #[test]
    fn test_adjust_within_cap_is_noop() {
        let service = fixtures::service();
        let command = AdjustCommand::new(Arc::clone(&service), "2026", SessionSettings::default());

        let output = command.run("S1", false);

        assert!(output.success);
        assert_eq!(output.saved, 0);
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
        assert!(command
            .format_output(&output, &OutputOptions::default())
            .contains("nothing to adjust"));
    }
}
