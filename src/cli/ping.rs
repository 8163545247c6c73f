//! Ping command: check that the remote service answers.

use serde::Serialize;

use crate::cli::{exit_code_for, render, OutputOptions};
use crate::error::{exit_codes, TrajectoryError};
use crate::remote::TrajectoryService;

/// Output format for the ping command.
#[derive(Debug, Clone, Serialize)]
pub struct PingOutput {
    /// Whether the service answered.
    pub success: bool,
    /// Which service was asked.
    pub service: String,
    /// Error message if the ping failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl PingOutput {
    /// Create a successful output.
    pub fn success(service: &str) -> Self {
        Self {
            success: true,
            service: service.to_string(),
            error: None,
            exit_code: exit_codes::SUCCESS,
        }
    }

    /// Create a failed output.
    pub fn failure(service: &str, error: &TrajectoryError) -> Self {
        Self {
            success: false,
            service: service.to_string(),
            error: Some(error.to_string()),
            exit_code: exit_code_for(error),
        }
    }
}

/// The ping command implementation.
pub struct PingCommand<S: TrajectoryService> {
    service: S,
}

impl<S: TrajectoryService> PingCommand<S> {
    /// Create a new ping command.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Run the ping command.
    pub fn run(&self) -> PingOutput {
        match self.service.ping() {
            Ok(()) => PingOutput::success(self.service.name()),
            Err(e) => PingOutput::failure(self.service.name(), &e),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &PingOutput, options: &OutputOptions) -> String {
        render(output, options, || {
            if output.success {
                format!("Connected ({}).\n", output.service)
            } else {
                format!(
                    "Ping failed: {}\n",
                    output.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
    }
}
