//! Trajectory - student trajectory state reconciliation
//!
//! Loads one student's subject records for a school cycle from a remote
//! spreadsheet-backed service, classifies them, enforces the regular and
//! intensification load caps, tracks unsaved edits, and drives saves and
//! end-of-cycle closure back through the service.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod remote;
pub mod util;

pub use config::Config;
pub use core::{
    BalanceReport, Classification, ClosureReceipt, SessionSettings, StudentSession,
};
pub use error::{Result, TrajectoryError};
pub use remote::{HttpService, MemoryService, TrajectoryService};

// CLI commands
pub use cli::{
    AdjustCommand, CloseCommand, CyclesCommand, PingCommand, PlanCommand, RolloverCommand,
    SetCommand, StatusCommand, StudentsCommand, SummaryCommand, SyncCommand,
};
