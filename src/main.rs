//! Trajectory - student trajectory state reconciliation
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trajectory::cli::rollover::RolloverOptions;
use trajectory::cli::{
    AdjustCommand, CloseCommand, CyclesCommand, OutputOptions, PingCommand, PlanCommand,
    RolloverCommand, SetCommand, StatusCommand, StudentsCommand, SummaryCommand, SyncCommand,
};
use trajectory::config::{self, crash_log_path, Config};
use trajectory::core::{SessionSettings, Status};
use trajectory::error::exit_codes;
use trajectory::{HttpService, TrajectoryError};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TRAJECTORY_LOG";

// =============================================================================
// CLI Definition
// =============================================================================

/// Trajectory - plan, balance and close students' yearly subject loads
#[derive(Parser)]
#[command(name = "trajectory")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cycle to work on (defaults to session.cycle from config)
    #[arg(long, global = true)]
    cycle: Option<String>,
    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,
    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the remote service answers
    Ping,

    /// List known cycles
    Cycles,

    /// List the students of a cycle
    Students {
        /// Filter by id, name, section, grade or shift
        #[arg(long)]
        query: Option<String>,
    },

    /// Show a student's subjects, loads and alerts
    Status {
        /// Student id
        #[arg(long, short)]
        student: String,
    },

    /// Change subject statuses and save them
    Set {
        /// Student id
        #[arg(long, short)]
        student: String,
        /// Edit as SUBJECT=STATUS (repeatable)
        #[arg(long = "subject", value_name = "SUBJECT=STATUS", required = true, value_parser = parse_edit)]
        edits: Vec<(String, Status)>,
    },

    /// Cap out subjects until the regular load fits
    Adjust {
        /// Student id
        #[arg(long, short)]
        student: String,
        /// Show the moves without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Record closure outcomes and close the cycle
    Close {
        /// Subjects passed (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        passed: Vec<String>,
        /// Subjects failed (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        failed: Vec<String>,
        /// Student id
        #[arg(long, short)]
        student: String,
        /// Check readiness without closing
        #[arg(long)]
        dry_run: bool,
    },

    /// Add catalog subjects the student is missing
    Sync {
        /// Student id
        #[arg(long, short)]
        student: String,
    },

    /// Print the family-facing plan text
    Plan {
        /// Student id
        #[arg(long, short)]
        student: String,
    },

    /// Students at risk per section
    Summary {
        /// Owed subjects that put a student at risk (defaults to policy.risk_threshold)
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Promote a whole cycle into the next one
    Rollover {
        /// Origin cycle
        #[arg(long)]
        from: String,
        /// Destination cycle
        #[arg(long)]
        to: String,
        /// Keep students' grades as they are
        #[arg(long)]
        skip_students: bool,
        /// Keep section assignments as they are
        #[arg(long)]
        skip_division: bool,
    },
}

/// Parse `SUBJECT=STATUS`.
fn parse_edit(raw: &str) -> Result<(String, Status), String> {
    let (subject, status) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SUBJECT=STATUS, got '{raw}'"))?;
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(format!("missing subject id in '{raw}'"));
    }
    let status = Status::from_name(status).ok_or_else(|| {
        format!(
            "unknown status '{}'; expected one of: first-time, repeat, intensification, \
             capped-out, not-enrolled-other, deferred, unset",
            status.trim()
        )
    })?;
    Ok((subject.to_string(), status))
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("trajectory: {e}");
            ExitCode::from(exit_codes::FAILURE as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, appends to ~/.trajectory/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("trajectory panic: {info}");

        if let Some(crash_log) = crash_log_path() {
            if let Some(parent) = crash_log.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{timestamp}] {info}");
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Log to stderr, filtered by `TRAJECTORY_LOG` (default: warn).
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Build the HTTP service from config and the API key.
fn connect(config: &Config) -> Result<HttpService, TrajectoryError> {
    config.validate()?;
    let remote = config.require_remote()?;
    HttpService::from_config(remote, config::api_key()?)
}

/// Print formatted output and convert a command exit code.
fn emit(formatted: String, exit_code: i32) -> ExitCode {
    if !formatted.is_empty() {
        print!("{formatted}");
        if !formatted.ends_with('\n') {
            println!();
        }
    }
    ExitCode::from(exit_code as u8)
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, TrajectoryError> {
    let cli = Cli::parse();
    let config = Config::load();
    let service = connect(&config)?;

    let options = OutputOptions {
        json: cli.json,
        quiet: cli.quiet,
    };
    let cycle = cli
        .cycle
        .unwrap_or_else(|| config.session.cycle.clone())
        .trim()
        .to_string();
    let settings = SessionSettings::from_config(&config);

    tracing::debug!(cycle = %cycle, url = service.url(), "running command");

    let code = match cli.command {
        Commands::Ping => {
            let cmd = PingCommand::new(service);
            let output = cmd.run();
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Cycles => {
            let cmd = CyclesCommand::new(service);
            let output = cmd.run();
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Students { query } => {
            let cmd = StudentsCommand::new(service, cycle);
            let output = cmd.run(query.as_deref());
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Status { student } => {
            let cmd = StatusCommand::new(service, cycle, settings);
            let output = cmd.run(&student);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Set { student, edits } => {
            let cmd = SetCommand::new(service, cycle, settings);
            let output = cmd.run(&student, &edits);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Adjust { student, dry_run } => {
            let cmd = AdjustCommand::new(service, cycle, settings);
            let output = cmd.run(&student, dry_run);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Close {
            passed,
            failed,
            student,
            dry_run,
        } => {
            let cmd = CloseCommand::new(service, cycle, settings);
            let output = cmd.run(&student, &passed, &failed, dry_run);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Sync { student } => {
            let cmd = SyncCommand::new(service, cycle, settings);
            let output = cmd.run(&student);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Plan { student } => {
            let cmd = PlanCommand::new(service, cycle, settings);
            let output = cmd.run(&student);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Summary { threshold } => {
            let cmd = SummaryCommand::new(service, cycle);
            let output = cmd.run(threshold.unwrap_or(config.policy.risk_threshold));
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
        Commands::Rollover {
            from,
            to,
            skip_students,
            skip_division,
        } => {
            let cmd = RolloverCommand::new(service, settings.actor.clone());
            let rollover_options = RolloverOptions {
                update_students: !skip_students,
                update_division: !skip_division,
            };
            let output = cmd.run(&from, &to, &rollover_options);
            emit(cmd.format_output(&output, &options), output.exit_code)
        }
    };

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::SUCCESS, 0);
        assert_eq!(exit_codes::FAILURE, 1);
        assert_eq!(exit_codes::BLOCKED, 2);
        assert_eq!(exit_codes::CRASH, 3);
    }

    #[test]
    fn test_parse_edit() {
        assert_eq!(
            parse_edit("MAT3=capped-out").unwrap(),
            ("MAT3".to_string(), Status::CappedOut)
        );
        assert_eq!(
            parse_edit(" GEO2 = recursa").unwrap(),
            ("GEO2".to_string(), Status::Repeat)
        );
        assert!(parse_edit("MAT3").is_err());
        assert!(parse_edit("=repeat").is_err());
        assert!(parse_edit("MAT3=bogus").unwrap_err().contains("unknown status"));
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from(["trajectory", "status", "-s", "S1", "--cycle", "2025", "--json"]);
        assert_eq!(cli.cycle.as_deref(), Some("2025"));
        assert!(cli.json);
        assert!(!cli.quiet);
        match cli.command {
            Commands::Status { student } => assert_eq!(student, "S1"),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_set() {
        let cli = Cli::parse_from([
            "trajectory",
            "set",
            "--student",
            "S1",
            "--subject",
            "MAT3=deferred",
            "--subject",
            "GEO2=first-time",
        ]);
        match cli.command {
            Commands::Set { student, edits } => {
                assert_eq!(student, "S1");
                assert_eq!(
                    edits,
                    vec![
                        ("MAT3".to_string(), Status::Deferred),
                        ("GEO2".to_string(), Status::FirstTime),
                    ]
                );
            }
            _ => panic!("Expected Set command"),
        }
    }

    #[test]
    fn test_cli_parse_set_requires_subject() {
        assert!(Cli::try_parse_from(["trajectory", "set", "--student", "S1"]).is_err());
    }

    #[test]
    fn test_cli_parse_close_lists() {
        let cli = Cli::parse_from([
            "trajectory",
            "close",
            "-s",
            "S1",
            "--passed",
            "MAT3,LEN2",
            "--failed",
            "GEO2",
            "--dry-run",
        ]);
        match cli.command {
            Commands::Close {
                passed,
                failed,
                student,
                dry_run,
            } => {
                assert_eq!(passed, vec!["MAT3", "LEN2"]);
                assert_eq!(failed, vec!["GEO2"]);
                assert_eq!(student, "S1");
                assert!(dry_run);
            }
            _ => panic!("Expected Close command"),
        }
    }

    #[test]
    fn test_cli_parse_adjust() {
        let cli = Cli::parse_from(["trajectory", "adjust", "-s", "S1", "--dry-run", "-q"]);
        assert!(cli.quiet);
        match cli.command {
            Commands::Adjust { student, dry_run } => {
                assert_eq!(student, "S1");
                assert!(dry_run);
            }
            _ => panic!("Expected Adjust command"),
        }
    }

    #[test]
    fn test_cli_parse_summary_and_students() {
        let cli = Cli::parse_from(["trajectory", "summary", "--threshold", "3"]);
        match cli.command {
            Commands::Summary { threshold } => assert_eq!(threshold, Some(3)),
            _ => panic!("Expected Summary command"),
        }

        let cli = Cli::parse_from(["trajectory", "students", "--query", "perez"]);
        match cli.command {
            Commands::Students { query } => assert_eq!(query.as_deref(), Some("perez")),
            _ => panic!("Expected Students command"),
        }
    }

    #[test]
    fn test_cli_parse_rollover() {
        let cli = Cli::parse_from([
            "trajectory",
            "rollover",
            "--from",
            "2026",
            "--to",
            "2027",
            "--skip-division",
        ]);
        match cli.command {
            Commands::Rollover {
                from,
                to,
                skip_students,
                skip_division,
            } => {
                assert_eq!(from, "2026");
                assert_eq!(to, "2027");
                assert!(!skip_students);
                assert!(skip_division);
            }
            _ => panic!("Expected Rollover command"),
        }
    }

    #[test]
    fn test_cli_parse_service_commands() {
        assert!(matches!(
            Cli::parse_from(["trajectory", "ping"]).command,
            Commands::Ping
        ));
        assert!(matches!(
            Cli::parse_from(["trajectory", "cycles"]).command,
            Commands::Cycles
        ));
        assert!(matches!(
            Cli::parse_from(["trajectory", "sync", "-s", "S1"]).command,
            Commands::Sync { .. }
        ));
        assert!(matches!(
            Cli::parse_from(["trajectory", "plan", "-s", "S1"]).command,
            Commands::Plan { .. }
        ));
    }
}
