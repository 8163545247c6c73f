//! Remote service access.
//!
//! The [`TrajectoryService`] trait is the only way the engine reads or
//! writes persistent data. [`HttpService`] talks to the deployed web app;
//! [`MemoryService`] keeps everything in memory for tests.

pub mod envelope;
pub mod http;
pub mod memory;
pub mod traits;

pub use envelope::{
    CloseRequest, DivisionRisk, Envelope, RolloverReport, RolloverRequest, SaveRequest,
    SyncRequest, SyncResult,
};
pub use http::HttpService;
pub use memory::MemoryService;
pub use traits::TrajectoryService;
