//! Suite event reporting
//!
//! The driver and case runner never print directly; they emit events to a [`Reporter`]. Two
//! implementations ship with the harness:
//!
//! - [`ConsoleReporter`]: human-readable progress (`Testing x... [I][C][R] PASS`) and summary,
//!   optionally colored
//! - [`JsonReporter`]: one JSON object per event, for automated consumption
//!
//! Write errors on the output sink are ignored; reporting never aborts a run.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use super::case::{CaseOutcome, CaseReport, Phase, PhaseResult, TestCase};
use super::config::HarnessConfig;
use super::suite::{SuiteSummary, Verdict};

const GREEN: &str = "\x1b[0;32m";
const YELLOW: &str = "\x1b[1;33m";
const RED: &str = "\x1b[0;31m";
const RESET: &str = "\x1b[0m";

/// Receives suite progress events.
pub trait Reporter {
    /// Called once before the toolchain build
    fn on_suite_start(&mut self, _config: &HarnessConfig) {}

    fn on_build_start(&mut self) {}

    /// Called with the build result; a failed build ends the run
    fn on_build_complete(&mut self, result: &PhaseResult);

    /// Called for a configured case whose source file does not exist
    fn on_case_missing(&mut self, case: &TestCase, path: &Path);

    fn on_case_start(&mut self, case: &TestCase);

    /// Called as each phase begins
    fn on_phase_start(&mut self, case: &TestCase, phase: Phase);

    fn on_case_complete(&mut self, case: &TestCase, report: &CaseReport);

    /// Called after every case has run
    fn on_run_complete(&mut self, summary: &SuiteSummary);
}

// ============================================================================
// Console reporter
// ============================================================================

/// Plain or ANSI-colored console output.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    color: bool,
    verbose: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(color: bool, verbose: bool) -> Self {
        Self::new(io::stdout(), color, verbose)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, color: bool, verbose: bool) -> Self {
        Self { out, color, verbose }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn print_failed_phases(&mut self, report: &CaseReport) {
        for (phase, result) in report.phases() {
            let Some(code) = result.exit_code else { continue };
            if result.success {
                continue;
            }
            self.line(&format!("    [{}] {} exited with {}", phase.marker(), phase.label(), code));
            for stderr_line in result.stderr.lines() {
                self.line(&format!("        {}", stderr_line));
            }
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_suite_start(&mut self, _config: &HarnessConfig) {
        self.line("Jimple Test Suite");
        self.line("=================");
        self.line("");
    }

    fn on_build_start(&mut self) {
        self.line("Building toolchain...");
    }

    fn on_build_complete(&mut self, result: &PhaseResult) {
        if result.success {
            let msg = self.paint(GREEN, "Toolchain built successfully");
            self.line(&msg);
            self.line("");
            self.line("Running tests:");
            self.line("Legend: [I] = Interpreter, [C] = Compiler, [R] = Run compiled");
            self.line("");
        } else {
            let msg = self.paint(RED, "Failed to build toolchain");
            self.line(&msg);
            self.line(&format!("Error: {}", result.stderr));
        }
    }

    fn on_case_missing(&mut self, _case: &TestCase, path: &Path) {
        self.line(&format!("Warning: Test file {} not found", path.display()));
    }

    fn on_case_start(&mut self, case: &TestCase) {
        let _ = write!(self.out, "Testing {}... ", case.stem());
        let _ = self.out.flush();
    }

    fn on_phase_start(&mut self, _case: &TestCase, phase: Phase) {
        let _ = write!(self.out, "[{}]", phase.marker());
        let _ = self.out.flush();
    }

    fn on_case_complete(&mut self, _case: &TestCase, report: &CaseReport) {
        let color = match report.outcome {
            CaseOutcome::Pass => GREEN,
            CaseOutcome::Partial => YELLOW,
            CaseOutcome::Fail => RED,
        };
        let verdict = self.paint(color, report.outcome.label());
        self.line(&format!(" {}", verdict));
        if self.verbose {
            self.print_failed_phases(report);
        }
    }

    fn on_run_complete(&mut self, summary: &SuiteSummary) {
        self.line("");
        self.line("Test Summary:");
        self.line("=============");
        self.line(&format!("Total tests:  {}", summary.total));
        let passed = self.paint(GREEN, &format!("Passed:       {}", summary.passed));
        let partial = self.paint(YELLOW, &format!("Partial:      {}", summary.partial));
        let failed = self.paint(RED, &format!("Failed:       {}", summary.failed));
        self.line(&passed);
        self.line(&partial);
        self.line(&failed);
        self.line("");

        let verdict = summary.verdict();
        let color = match verdict {
            Verdict::AllPassed => GREEN,
            Verdict::PassedWithPartial => YELLOW,
            Verdict::SomeFailed => RED,
        };
        let msg = self.paint(color, verdict.message());
        self.line(&msg);
        let _ = self.out.flush();
    }
}

// ============================================================================
// JSON reporter
// ============================================================================

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    SuiteStart {
        cases: usize,
    },
    BuildStart,
    BuildComplete {
        result: &'a PhaseResult,
    },
    CaseMissing {
        case: &'a str,
        path: String,
    },
    CaseStart {
        case: &'a str,
    },
    PhaseStart {
        case: &'a str,
        phase: Phase,
    },
    CaseComplete {
        case: &'a str,
        #[serde(flatten)]
        report: &'a CaseReport,
    },
    RunComplete {
        #[serde(flatten)]
        summary: &'a SuiteSummary,
        verdict: Verdict,
        exit_code: i32,
    },
}

/// Newline-delimited JSON events.
pub struct JsonReporter<W: Write = io::Stdout> {
    out: W,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &Event<'_>) {
        match serde_json::to_string(event) {
            Ok(json) => {
                let _ = writeln!(self.out, "{}", json);
                let _ = self.out.flush();
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn on_suite_start(&mut self, config: &HarnessConfig) {
        self.emit(&Event::SuiteStart {
            cases: config.cases.len(),
        });
    }

    fn on_build_start(&mut self) {
        self.emit(&Event::BuildStart);
    }

    fn on_build_complete(&mut self, result: &PhaseResult) {
        self.emit(&Event::BuildComplete { result });
    }

    fn on_case_missing(&mut self, case: &TestCase, path: &Path) {
        self.emit(&Event::CaseMissing {
            case: case.stem(),
            path: path.display().to_string(),
        });
    }

    fn on_case_start(&mut self, case: &TestCase) {
        self.emit(&Event::CaseStart { case: case.stem() });
    }

    fn on_phase_start(&mut self, case: &TestCase, phase: Phase) {
        self.emit(&Event::PhaseStart {
            case: case.stem(),
            phase,
        });
    }

    fn on_case_complete(&mut self, case: &TestCase, report: &CaseReport) {
        self.emit(&Event::CaseComplete {
            case: case.stem(),
            report,
        });
    }

    fn on_run_complete(&mut self, summary: &SuiteSummary) {
        self.emit(&Event::RunComplete {
            summary,
            verdict: summary.verdict(),
            exit_code: summary.exit_status(),
        });
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn on_suite_start(&mut self, config: &HarnessConfig) {
        (**self).on_suite_start(config)
    }

    fn on_build_start(&mut self) {
        (**self).on_build_start()
    }

    fn on_build_complete(&mut self, result: &PhaseResult) {
        (**self).on_build_complete(result)
    }

    fn on_case_missing(&mut self, case: &TestCase, path: &Path) {
        (**self).on_case_missing(case, path)
    }

    fn on_case_start(&mut self, case: &TestCase) {
        (**self).on_case_start(case)
    }

    fn on_phase_start(&mut self, case: &TestCase, phase: Phase) {
        (**self).on_phase_start(case, phase)
    }

    fn on_case_complete(&mut self, case: &TestCase, report: &CaseReport) {
        (**self).on_case_complete(case, report)
    }

    fn on_run_complete(&mut self, summary: &SuiteSummary) {
        (**self).on_run_complete(summary)
    }
}
