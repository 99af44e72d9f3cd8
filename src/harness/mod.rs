//! Dual-mode test harness
//!
//! ## Modules
//!
//! - `executor` - Bounded-timeout subprocess execution
//! - `case` - Interpret / compile / run-compiled pipeline for one case
//! - `suite` - Toolchain build plus ordered iteration over all cases
//! - `reporter` - Console and JSON presentation of suite events
//! - `config` - Case list, command templates, timeouts
//!
//! Data flows one way: `SuiteDriver` → `CaseRunner` → `CommandExecutor`.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod case;
pub mod config;
pub mod executor;
pub mod reporter;
pub mod suite;

#[cfg(test)]
pub(crate) mod testing;

pub use case::{CaseOutcome, CaseReport, CaseRunner, Phase, PhaseResult, TestCase, remove_artifact};
pub use config::{
    CaseList, CommandSet, CommandTemplate, ConfigError, DEFAULT_CONFIG_FILE, HarnessConfig, find_harness_root,
};
pub use executor::{
    CommandExecutor, CommandSpec, ExecOutput, ProcessExecutor, SIGNALED_EXIT_CODE, SPAWN_FAILURE_EXIT_CODE,
    TIMEOUT_EXIT_CODE, TIMEOUT_MARKER,
};
pub use reporter::{ConsoleReporter, JsonReporter, Reporter};
pub use suite::{SuiteDriver, SuiteError, SuiteSummary, Verdict};
