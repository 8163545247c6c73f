//! Cycles command: list the cycle labels the service knows.

use serde::Serialize;

use crate::cli::{exit_code_for, render, OutputOptions};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the cycles command.
#[derive(Debug, Clone, Serialize)]
pub struct CyclesOutput {
    /// Whether the listing succeeded.
    pub success: bool,
    /// Cycle labels.
    pub cycles: Vec<String>,
    /// Error message if the listing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl CyclesOutput {
    /// Create a successful output.
    pub fn success(cycles: Vec<String>) -> Self {
        Self {
            success: true,
            cycles,
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(error: &TrajectoryError) -> Self {
        Self {
            success: false,
            cycles: Vec::new(),
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The cycles command implementation.
pub struct CyclesCommand<S: TrajectoryService> {
    service: S,
}

impl<S: TrajectoryService> CyclesCommand<S> {
    /// Create a new cycles command.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Run the cycles command.
    pub fn run(&self) -> CyclesOutput {
        match self.service.cycles() {
            Ok(cycles) => CyclesOutput::success(cycles),
            Err(e) => CyclesOutput::failure(&e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CyclesOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if !output.success {
                return format!(
                    "Listing cycles failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
            if output.cycles.is_empty() {
                return "No cycles found.\n".to_string();
            }
            let mut text = String::new();
            for cycle in &output.cycles {
                text.push_str(cycle);
                text.push('\n');
            }
            text
        })
    }
}
