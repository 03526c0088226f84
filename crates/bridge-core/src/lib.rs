//! bridge-core - Backend readiness orchestration for bridge
//!
//! This crate holds everything between "the user picked a mode" and "the
//! coding agent owns the terminal":
//!
//! - **probe**: Timeout-bounded TCP reachability checks
//! - **store**: Key/value configuration persistence (JSON, merge-on-write)
//! - **mode**: Launch modes and their availability
//! - **readiness**: Local service and model remediation
//! - **dispatch**: Agent resolution, environment and foreground launch
//! - **orchestrator**: The session-scoped glue the CLI drives

pub mod dispatch;
pub mod error;
pub mod mode;
pub mod orchestrator;
pub mod probe;
pub mod readiness;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{Error, FailureReason, Result};
pub use mode::{Availability, BackendMode, StatusSnapshot, compute_availability};
pub use orchestrator::{Orchestrator, OrchestratorSettings, SelectOutcome};
pub use store::{ConfigSnapshot, ConfigStore, JsonFileStore, MemoryStore};
