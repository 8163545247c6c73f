//! Summary command: students at risk per section.

use serde::Serialize;

use crate::cli::{exit_code_for, render, OutputOptions};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::{DivisionRisk, TrajectoryService};

/// Output format for the summary command.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    /// Whether the summary was fetched.
    pub success: bool,
    /// The cycle summarized.
    pub cycle: String,
    /// Owed subjects at which a student counts as at risk.
    pub threshold: u32,
    /// One row per section.
    pub divisions: Vec<DivisionRisk>,
    /// Error message if the summary failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl SummaryOutput {
    /// Create a successful output.
    pub fn success(cycle: &str, threshold: u32, divisions: Vec<DivisionRisk>) -> Self {
        Self {
            success: true,
            cycle: cycle.to_string(),
            threshold,
            divisions,
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(cycle: &str, threshold: u32, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            cycle: cycle.to_string(),
            threshold,
            divisions: Vec::new(),
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }

    /// Students at risk across all sections.
    pub fn total_at_risk(&self) -> usize {
        self.divisions.iter().map(|d| d.at_risk).sum()
    }
}

/// The summary command implementation.
pub struct SummaryCommand<S: TrajectoryService> {
    service: S,
    cycle: String,
}

impl<S: TrajectoryService> SummaryCommand<S> {
    /// Create a new summary command.
    pub fn new(service: S, cycle: impl Into<String>) -> Self {
        Self {
            service,
            cycle: cycle.into(),
        }
    }

    /// Run the summary command.
    pub fn run(&self, threshold: u32) -> SummaryOutput {
        match self.service.division_risk_summary(&self.cycle, threshold) {
            Ok(divisions) => SummaryOutput::success(&self.cycle, threshold, divisions),
            Err(e) => SummaryOutput::failure(&self.cycle, threshold, &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SummaryOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if !output.success {
                return format!(
                    "Summary failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
            if output.divisions.is_empty() {
                return format!("No sections found for {}.\n", output.cycle);
            }

            let mut text = format!(
                "Students with {} or more owed subjects ({}):\n\n",
                output.threshold, output.cycle
            );
            text.push_str(&format!(
                "  {:<10} {:<10} {:>8} {:>8}\n",
                "Section", "Shift", "Students", "At risk"
            ));
            for d in &output.divisions {
                let division = if d.division.is_empty() { "-" } else { &d.division };
                text.push_str(&format!(
                    "  {:<10} {:<10} {:>8} {:>8}\n",
                    division, d.shift, d.total_students, d.at_risk
                ));
            }
            text.push_str(&format!("\nTotal at risk: {}\n", output.total_at_risk()));
            text
        })
    }
}
