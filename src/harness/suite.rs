//! Suite driver
//!
//! Builds the toolchain once, then walks the configured cases in order. A failed build is the
//! only condition that stops the suite; every per-case problem ends up in the case's outcome.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::case::{CaseOutcome, CaseRunner, PhaseResult, TestCase};
use super::config::{ConfigError, HarnessConfig};
use super::executor::{CommandExecutor, SPAWN_FAILURE_EXIT_CODE};
use super::reporter::Reporter;

/// Suite-level fatal errors.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("toolchain build failed with exit code {exit_code}")]
    BuildFailed { exit_code: i32, stderr: String },
}

/// Aggregated case counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub partial: usize,
    pub failed: usize,
}

/// Closing one-line verdict of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AllPassed,
    PassedWithPartial,
    SomeFailed,
}

impl Verdict {
    pub fn message(self) -> &'static str {
        match self {
            Verdict::AllPassed => "All tests passed!",
            Verdict::PassedWithPartial => "All tests passed with some partial results",
            Verdict::SomeFailed => "Some tests failed",
        }
    }
}

impl SuiteSummary {
    pub fn record(&mut self, outcome: CaseOutcome) {
        self.total += 1;
        match outcome {
            CaseOutcome::Pass => self.passed += 1,
            CaseOutcome::Partial => self.partial += 1,
            CaseOutcome::Fail => self.failed += 1,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.failed > 0 {
            Verdict::SomeFailed
        } else if self.partial > 0 {
            Verdict::PassedWithPartial
        } else {
            Verdict::AllPassed
        }
    }

    /// 0 when no case failed (partials are acceptable), 1 otherwise.
    pub fn exit_status(&self) -> i32 {
        if self.failed == 0 { 0 } else { 1 }
    }
}

/// Runs every configured case against one toolchain build.
pub struct SuiteDriver<E, R> {
    config: HarnessConfig,
    root: PathBuf,
    executor: E,
    reporter: R,
    filter: Option<String>,
}

impl<E: CommandExecutor, R: Reporter> SuiteDriver<E, R> {
    /// Create a driver; the configuration is validated up front.
    pub fn new(config: HarnessConfig, root: impl Into<PathBuf>, executor: E, reporter: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            root: root.into(),
            executor,
            reporter,
            filter: None,
        })
    }

    /// Only run cases whose stem contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Build the toolchain, then run every present case in configured order.
    #[tracing::instrument(skip_all, fields(root = %self.root.display(), cases = self.config.cases.len()))]
    pub fn run_suite(&mut self) -> Result<SuiteSummary, SuiteError> {
        self.reporter.on_suite_start(&self.config);
        self.build()?;

        let runner = CaseRunner::new(&self.config, &self.root, &self.executor);
        let mut summary = SuiteSummary::default();

        for case in &self.config.cases {
            if !matches_filter(self.filter.as_deref(), case) {
                continue;
            }
            if !self.config.source_path(&self.root, case).is_file() {
                tracing::warn!(case = %case, "test source missing");
                self.reporter
                    .on_case_missing(case, &self.config.test_dir.join(case.file_name()));
                continue;
            }
            let report = runner.run_case(case, &mut self.reporter);
            summary.record(report.outcome);
        }

        self.reporter.on_run_complete(&summary);
        Ok(summary)
    }

    /// Run the suite and reduce it to a process exit status.
    pub fn run(&mut self) -> i32 {
        match self.run_suite() {
            Ok(summary) => summary.exit_status(),
            Err(e) => {
                tracing::debug!(error = %e, "suite aborted");
                1
            }
        }
    }

    fn build(&mut self) -> Result<(), SuiteError> {
        self.reporter.on_build_start();
        let command = self.config.build_command(&self.root);
        let result = PhaseResult::from(self.executor.execute(&command, self.config.build_timeout()));
        self.reporter.on_build_complete(&result);

        if result.success {
            Ok(())
        } else {
            Err(SuiteError::BuildFailed {
                exit_code: result.exit_code.unwrap_or(SPAWN_FAILURE_EXIT_CODE),
                stderr: result.stderr,
            })
        }
    }
}

fn matches_filter(filter: Option<&str>, case: &TestCase) -> bool {
    filter.is_none_or(|keyword| case.stem().contains(keyword))
}
