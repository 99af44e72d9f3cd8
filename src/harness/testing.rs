//! Shared test doubles for the harness unit tests

use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use super::case::{CaseReport, Phase, PhaseResult, TestCase};
use super::config::{CaseList, CommandSet, CommandTemplate, HarnessConfig};
use super::executor::{CommandExecutor, CommandSpec, ExecOutput};
use super::reporter::Reporter;
use super::suite::SuiteSummary;

/// Executor that answers from a closure and records every invocation.
pub(crate) struct ScriptedExecutor {
    calls: RefCell<Vec<(CommandSpec, Duration)>>,
    respond: Box<dyn Fn(&CommandSpec) -> ExecOutput>,
}

impl ScriptedExecutor {
    pub(crate) fn new(respond: impl Fn(&CommandSpec) -> ExecOutput + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    pub(crate) fn timeouts(&self) -> Vec<Duration> {
        self.calls.borrow().iter().map(|(_, timeout)| *timeout).collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &CommandSpec, timeout: Duration) -> ExecOutput {
        self.calls.borrow_mut().push((command.clone(), timeout));
        (self.respond)(command)
    }
}

pub(crate) fn exit(code: i32) -> ExecOutput {
    ExecOutput {
        exit_code: code,
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub(crate) fn failed(code: i32, stderr: &str) -> ExecOutput {
    ExecOutput {
        exit_code: code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Config whose programs are named after their phase: `build`, `interp`, `compile`, `run`.
pub(crate) fn scripted_config<const N: usize>(cases: [&str; N]) -> HarnessConfig {
    HarnessConfig::default()
        .with_cases(CaseList::new(cases).unwrap_or_default())
        .with_commands(CommandSet {
            build: CommandTemplate::new("build", Vec::<String>::new()),
            interpret: CommandTemplate::new("interp", ["{source}"]),
            compile: CommandTemplate::new("compile", ["{source}"]),
            run: CommandTemplate::new("run", ["{stem}"]),
        })
}

/// Reporter that flattens events into short strings.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub(crate) events: Vec<String>,
}

impl Reporter for RecordingReporter {
    fn on_build_start(&mut self) {
        self.events.push("build".to_string());
    }

    fn on_build_complete(&mut self, result: &PhaseResult) {
        let status = if result.success { "ok" } else { "fail" };
        self.events.push(format!("built {status}"));
    }

    fn on_case_missing(&mut self, _case: &TestCase, path: &Path) {
        self.events.push(format!("missing {}", path.display()));
    }

    fn on_case_start(&mut self, case: &TestCase) {
        self.events.push(format!("start {}", case.stem()));
    }

    fn on_phase_start(&mut self, _case: &TestCase, phase: Phase) {
        self.events.push(format!("[{}]", phase.marker()));
    }

    fn on_case_complete(&mut self, case: &TestCase, report: &CaseReport) {
        self.events.push(format!("done {} {}", case.stem(), report.outcome));
    }

    fn on_run_complete(&mut self, summary: &SuiteSummary) {
        self.events.push(format!(
            "summary {} {} {} {}",
            summary.total, summary.passed, summary.partial, summary.failed
        ));
    }
}
