//! Bounded-timeout subprocess execution
//!
//! Every external program the harness touches (toolchain build, interpreter, compiler, compiled
//! artifact) goes through [`CommandExecutor`]. Execution never fails from the caller's point of
//! view: timeouts and spawn errors are folded into reserved negative exit codes so the case runner
//! can treat them like any other non-zero exit.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Exit code reported when the child outlived its timeout and was killed.
pub const TIMEOUT_EXIT_CODE: i32 = -1;
/// Exit code reported when the child could not be spawned or waited on.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -2;
/// Exit code reported when the child was terminated by a signal and has no exit status.
pub const SIGNALED_EXIT_CODE: i32 = -3;
/// Stderr contents reported alongside [`TIMEOUT_EXIT_CODE`].
pub const TIMEOUT_MARKER: &str = "Timeout";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A program plus its explicit argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn timed_out() -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: TIMEOUT_MARKER.to_string(),
        }
    }

    pub fn spawn_failure(description: impl Into<String>) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: description.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands.
///
/// Implementations must not panic or return errors: every failure mode maps onto an
/// [`ExecOutput`] exit code. Tests substitute scripted executors through this trait.
pub trait CommandExecutor {
    fn execute(&self, command: &CommandSpec, timeout: Duration) -> ExecOutput;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn execute(&self, command: &CommandSpec, timeout: Duration) -> ExecOutput {
        (**self).execute(command, timeout)
    }
}

/// Spawns real child processes with their working directory pinned to the harness root.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    root: PathBuf,
    poll_interval: Duration,
}

impl ProcessExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how often a running child is checked for exit.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wait_until(&self, child: &mut Child, deadline: Instant) -> WaitOutcome {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return WaitOutcome::Exited(status.code()),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return WaitOutcome::TimedOut;
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return WaitOutcome::Failed(e.to_string());
                }
            }
        }
    }
}

enum WaitOutcome {
    Exited(Option<i32>),
    TimedOut,
    Failed(String),
}

impl CommandExecutor for ProcessExecutor {
    #[tracing::instrument(skip_all, fields(program = %command.program, timeout_ms = timeout.as_millis() as u64))]
    fn execute(&self, command: &CommandSpec, timeout: Duration) -> ExecOutput {
        tracing::debug!(args = ?command.args, root = %self.root.display(), "spawning");

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(error = %e, "spawn failed");
                return ExecOutput::spawn_failure(e.to_string());
            }
        };

        // One deadline covers both the child's exit and draining its pipes.
        let deadline = Instant::now() + timeout;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe buffer.
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        match self.wait_until(&mut child, deadline) {
            WaitOutcome::Exited(code) => {
                // A background grandchild can keep the pipes open after the child exits.
                let (Some(stdout), Some(stderr)) = (collect(stdout_reader, deadline), collect(stderr_reader, deadline))
                else {
                    tracing::warn!(command = %command, "output pipes still open at timeout");
                    return ExecOutput::timed_out();
                };
                let exit_code = code.unwrap_or(SIGNALED_EXIT_CODE);
                tracing::debug!(exit_code, "child exited");
                ExecOutput {
                    exit_code,
                    stdout,
                    stderr,
                }
            }
            WaitOutcome::TimedOut => {
                // Readers are detached: a grandchild may still hold the pipes open.
                tracing::warn!(command = %command, "command timed out");
                ExecOutput::timed_out()
            }
            WaitOutcome::Failed(description) => {
                tracing::debug!(error = %description, "wait failed");
                ExecOutput::spawn_failure(description)
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a drained pipe until `deadline`; `None` means it was still open.
fn collect(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(reader) = reader else {
        return Some(String::new());
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}
