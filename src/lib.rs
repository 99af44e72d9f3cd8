#![forbid(unsafe_code)]
//! Jimple dual-mode test harness
//!
//! Every test case is run twice: once through the toolchain's interpreter, and once compiled ahead
//! of time with the compiled artifact executed afterwards. Each case is classified as PASS (both
//! modes succeed), PARTIAL (exactly one does) or FAIL (neither does).
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Subprocess failures**: never panics or errors. Timeouts and spawn failures are reported as sentinel exit codes
//!   (see [`harness::executor`]).

pub mod cli;
pub mod harness;

pub use harness::{CaseOutcome, HarnessConfig, SuiteDriver, SuiteSummary};
