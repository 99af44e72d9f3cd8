//! Per-case three-phase pipeline
//!
//! Each case is interpreted, compiled, and (when the compiler left an artifact behind) the compiled
//! program is run. Only the interpret and run-compiled phases decide the outcome; compilation
//! merely gates whether the compiled program can run at all.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use super::config::{ConfigError, HarnessConfig};
use super::executor::{CommandExecutor, CommandSpec, ExecOutput};
use super::reporter::Reporter;

/// One named test input, identified by its source file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    file_name: String,
    stem: String,
}

impl TestCase {
    /// Create a case from a plain file name such as `test_blocks.sim`.
    pub fn new(file_name: impl Into<String>) -> Result<Self, ConfigError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(ConfigError::EmptyCaseName);
        }
        let path = Path::new(&file_name);
        if path.components().count() != 1 || file_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidCaseName(file_name));
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() && stem != ".." => stem.to_string(),
            _ => return Err(ConfigError::InvalidCaseName(file_name)),
        };
        Ok(Self { file_name, stem })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Display name and compiled-artifact base name.
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stem)
    }
}

/// The three per-case phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Interpret,
    Compile,
    RunCompiled,
}

impl Phase {
    /// Progress marker letter shown as `[I]`, `[C]`, `[R]`.
    pub fn marker(self) -> char {
        match self {
            Phase::Interpret => 'I',
            Phase::Compile => 'C',
            Phase::RunCompiled => 'R',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Interpret => "Interpreter",
            Phase::Compile => "Compiler",
            Phase::RunCompiled => "Run compiled",
        }
    }
}

/// Captured result of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PhaseResult {
    pub success: bool,
    /// `None` when the phase was never attempted
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl PhaseResult {
    /// A gated-off phase: no process spawned, counted as failure.
    pub fn not_attempted() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> bool {
        self.exit_code.is_some()
    }
}

impl From<ExecOutput> for PhaseResult {
    fn from(output: ExecOutput) -> Self {
        Self {
            success: output.success(),
            exit_code: Some(output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Classification of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    Pass,
    Partial,
    Fail,
}

impl CaseOutcome {
    /// Pass when both modes succeed, Partial when exactly one does, Fail otherwise.
    pub fn classify(interpreted: bool, executed: bool) -> Self {
        match (interpreted, executed) {
            (true, true) => CaseOutcome::Pass,
            (true, false) | (false, true) => CaseOutcome::Partial,
            (false, false) => CaseOutcome::Fail,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CaseOutcome::Pass => "PASS",
            CaseOutcome::Partial => "PARTIAL",
            CaseOutcome::Fail => "FAIL",
        }
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything observed while running one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub interpret: PhaseResult,
    pub compile: PhaseResult,
    pub execution: PhaseResult,
    pub outcome: CaseOutcome,
}

impl CaseReport {
    pub fn new(interpret: PhaseResult, compile: PhaseResult, execution: PhaseResult) -> Self {
        let outcome = CaseOutcome::classify(interpret.success, execution.success);
        Self {
            interpret,
            compile,
            execution,
            outcome,
        }
    }

    pub fn phases(&self) -> [(Phase, &PhaseResult); 3] {
        [
            (Phase::Interpret, &self.interpret),
            (Phase::Compile, &self.compile),
            (Phase::RunCompiled, &self.execution),
        ]
    }
}

/// Drives a single case through interpret, compile, and run-compiled.
pub struct CaseRunner<'a, E> {
    config: &'a HarnessConfig,
    root: &'a Path,
    executor: E,
}

impl<'a, E: CommandExecutor> CaseRunner<'a, E> {
    pub fn new(config: &'a HarnessConfig, root: &'a Path, executor: E) -> Self {
        Self { config, root, executor }
    }

    /// Run all phases for `case`. Never fails: every problem lands in the report.
    #[tracing::instrument(skip_all, fields(case = %case.stem()))]
    pub fn run_case(&self, case: &TestCase, reporter: &mut dyn Reporter) -> CaseReport {
        reporter.on_case_start(case);

        reporter.on_phase_start(case, Phase::Interpret);
        let interpret = self.run_phase(&self.config.interpret_command(case));

        reporter.on_phase_start(case, Phase::Compile);
        let compile = self.run_phase(&self.config.compile_command(case));

        let artifact = self.config.artifact_path(self.root, case);
        let execution = if compile.success && artifact_exists(&artifact) {
            reporter.on_phase_start(case, Phase::RunCompiled);
            self.run_phase(&self.config.run_command(case))
        } else {
            tracing::debug!(
                compiled = compile.success,
                artifact = %artifact.display(),
                "skipping compiled run"
            );
            PhaseResult::not_attempted()
        };

        remove_artifact(&artifact);

        let report = CaseReport::new(interpret, compile, execution);
        tracing::debug!(outcome = %report.outcome, "case finished");
        reporter.on_case_complete(case, &report);
        report
    }

    fn run_phase(&self, command: &CommandSpec) -> PhaseResult {
        self.executor.execute(command, self.config.phase_timeout()).into()
    }
}

/// Only a regular file counts; a directory of the same name does not.
fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

/// Delete a compiled artifact, discarding any failure.
///
/// Returns whether a file was actually removed. This never reports an error: an artifact that
/// cannot be removed must not abort the suite.
pub fn remove_artifact(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not remove artifact");
            false
        }
    }
}
