//! Close command: record outcomes and close the cycle for one student.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::cli::{exit_code_for, open_session, render, OutputOptions};
use crate::core::{
    ClosureProgress, ClosureReceipt, OutcomeChoice, SessionSettings, StudentSession,
};
use crate::error::{exit_codes, Result, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the close command.
#[derive(Debug, Clone, Serialize)]
pub struct CloseOutput {
    /// Whether the closure ran (or, for a dry run, could run).
    pub success: bool,
    /// True when nothing was sent on purpose.
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ClosureProgress>,
    /// Engaged subjects still without an outcome.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ClosureReceipt>,
    /// Error message if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl CloseOutput {
    /// Create a failed output.
    pub fn failure(dry_run: bool, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            dry_run,
            progress: None,
            missing: Vec::new(),
            receipt: None,
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The close command implementation.
pub struct CloseCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
    settings: SessionSettings,
}

impl<S: TrajectoryService> CloseCommand<S> {
    /// Create a new close command.
    pub fn new(service: S, cycle: impl Into<String>, settings: SessionSettings) -> Self {
        Self {
            service,
            cycle: cycle.into(),
            settings,
        }
    }

    /// Mark `passed` and `failed` subjects, then close unless `dry_run`.
    pub fn run(
        &self,
        student_id: &str,
        passed: &[String],
        failed: &[String],
        dry_run: bool,
    ) -> CloseOutput {
        let passed_set: BTreeSet<&str> = passed.iter().map(String::as_str).collect();
        if let Some(both) = failed.iter().find(|id| passed_set.contains(id.as_str())) {
            let err = TrajectoryError::rejected(format!(
                "subject {both} cannot be both passed and failed"
            ));
            return CloseOutput::failure(dry_run, &err);
        }

        let mut session =
            match open_session(&self.service, &self.settings, &self.cycle, student_id) {
                Ok(session) => session,
                Err(e) => return CloseOutput::failure(dry_run, &e),
            };

        let marked = mark(&mut session, passed, OutcomeChoice::Passed)
            .and_then(|_| mark(&mut session, failed, OutcomeChoice::Failed));
        if let Err(e) = marked {
            return CloseOutput::failure(dry_run, &e);
        }

        let progress = session.closure_progress();
        let missing: Vec<String> = session
            .records()
            .iter()
            .filter(|r| r.is_engaged() && !r.outcome.is_set())
            .map(|r| r.subject_id.clone())
            .collect();

        if dry_run {
            let exit_code = if progress.is_ready() {
                exit_codes::SUCCESS
            } else {
                exit_codes::BLOCKED
            };
            return CloseOutput {
                success: progress.is_ready(),
                dry_run: true,
                progress: Some(progress),
                missing,
                receipt: None,
                error: None,
                exit_code,
            };
        }

        match session.submit_closure() {
            Ok(receipt) => CloseOutput {
                success: true,
                dry_run: false,
                progress: Some(progress),
                missing: Vec::new(),
                receipt: Some(receipt),
                error: None,
                exit_code: exit_codes::SUCCESS,
            },
            Err(e) => CloseOutput {
                progress: Some(progress),
                missing,
                ..CloseOutput::failure(false, &e)
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CloseOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            let mut text = String::new();
            if let Some(receipt) = &output.receipt {
                text.push_str(&format!(
                    "Cycle closed: {} subject(s), {} outcome(s) saved first.\n",
                    receipt.closed, receipt.outcomes_saved
                ));
                return text;
            }
            if let Some(error) = &output.error {
                text.push_str(&format!("Close failed: {error}\n"));
            }
            if let Some(progress) = &output.progress {
                text.push_str(&format!(
                    "{}/{} outcomes recorded.\n",
                    progress.marked(),
                    progress.total
                ));
                if output.dry_run && progress.is_ready() {
                    text.push_str("Ready to close.\n");
                }
            }
            if !output.missing.is_empty() {
                text.push_str(&format!("Missing: {}\n", output.missing.join(", ")));
            }
            text
        })
    }
}

/// Record `choice` on each subject, pressing the button only when the
/// recorded outcome differs so a repeated mark never clears it.
fn mark<S: TrajectoryService>(
    session: &mut StudentSession<S>,
    subjects: &[String],
    choice: OutcomeChoice,
) -> Result<()> {
    for subject_id in subjects {
        let current = session
            .tracker()
            .record(subject_id)
            .map(|r| r.outcome)
            .ok_or_else(|| TrajectoryError::unknown_subject(subject_id.as_str()))?;
        if current != choice.outcome() {
            session.toggle_outcome(subject_id, choice)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::fixtures;
    use crate::core::{AcademicCondition, ClosureOutcome};
    use crate::remote::MemoryService;
    use std::sync::Arc;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn command(service: &Arc<MemoryService>) -> CloseCommand<Arc<MemoryService>> {
        CloseCommand::new(Arc::clone(service), "2026", SessionSettings::default())
    }

    #[test]
    fn test_close_full_flow() {
        let service = fixtures::service();
        let output = command(&service).run(
            "S1",
            &ids(&["MAT3", "LEN2"]),
            &ids(&["GEO2"]),
            false,
        );

        assert!(output.success, "{:?}", output.error);
        let receipt = output.receipt.unwrap();
        assert_eq!(receipt.closed, 3);
        assert_eq!(receipt.outcomes_saved, 3);

        let stored = service.status("2026", "S1").unwrap().unwrap();
        assert!(stored.is_cycle_closed());
        let mat = stored.records.iter().find(|r| r.subject_id == "MAT3").unwrap();
        assert_eq!(mat.condition, AcademicCondition::Approved);
        assert_eq!(
            service.calls().unwrap(),
            vec!["getStudentStatus", "saveStudentStatus", "closeCycle"]
        );
    }

    #[test]
    fn test_close_incomplete_is_blocked() {
        let service = fixtures::service();
        let output = command(&service).run("S1", &ids(&["MAT3"]), &[], false);

        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::BLOCKED);
        assert_eq!(output.missing, ids(&["GEO2", "LEN2"]));
        assert_eq!(service.calls().unwrap(), vec!["getStudentStatus"]);
    }

    #[test]
    fn test_close_dry_run_reports_progress() {
        let service = fixtures::service();
        let cmd = command(&service);

        let partial = cmd.run("S1", &ids(&["MAT3"]), &ids(&["GEO2"]), true);
        assert!(!partial.success);
        assert_eq!(partial.exit_code, exit_codes::BLOCKED);
        assert_eq!(partial.missing, ids(&["LEN2"]));

        let ready = cmd.run("S1", &ids(&["MAT3", "LEN2"]), &ids(&["GEO2"]), true);
        assert!(ready.success);
        let text = cmd.format_output(&ready, &OutputOptions::default());
        assert!(text.contains("3/3 outcomes recorded."));
        assert!(text.contains("Ready to close."));
        assert_eq!(
            service.calls().unwrap(),
            vec!["getStudentStatus", "getStudentStatus"]
        );
    }

    #[test]
    fn test_close_same_subject_both_ways_rejected() {
        let service = fixtures::service();
        let output = command(&service).run("S1", &ids(&["MAT3"]), &ids(&["MAT3"]), false);
        assert!(!output.success);
        assert_eq!(output.exit_code, exit_codes::BLOCKED);
        assert!(service.calls().unwrap().is_empty());
    }

    #[test]
    fn test_close_keeps_stored_outcome() {
        let records = fixtures::records()
            .into_iter()
            .map(|r| {
                if r.subject_id == "MAT3" {
                    r.with_outcome(ClosureOutcome::Passed)
                } else {
                    r
                }
            })
            .collect();
        let service = fixtures::service_with(records);

        let output = command(&service).run(
            "S1",
            &ids(&["MAT3", "LEN2"]),
            &ids(&["GEO2"]),
            false,
        );

        assert!(output.success, "{:?}", output.error);
        assert_eq!(output.receipt.unwrap().outcomes_saved, 2);
    }
}
