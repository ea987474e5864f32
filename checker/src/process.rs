// process.rs — Child process invocation with an explicit timeout
//
// Every external program (compiler, candidate binary, memory checker) runs
// through here. Output is captured into anonymous temp files rather than
// pipes, so a chatty child can never deadlock against a full pipe while we
// poll for its exit.
//
// Preconditions: `cwd` exists.
// Postconditions: the child has exited (or was killed on timeout) before return.
// Failure modes: launch failure and capture I/O errors are `ProcessError`;
//   a non-zero exit, a signal or a timeout are ordinary `ExitStatus` values.
// Side effects: spawns and possibly kills a child process.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ── Exit status ─────────────────────────────────────────────────────────────

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitStatus {
    /// Normal exit with the given code.
    Exited(i32),
    /// Killed by the given signal number.
    Terminated(i32),
    /// Killed by us after exceeding its time budget.
    TimedOut,
}

impl ExitStatus {
    pub fn success(self) -> bool {
        self == ExitStatus::Exited(0)
    }

    pub fn code(self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(code),
            _ => None,
        }
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitStatus::Exited(code),
            None => ExitStatus::Terminated(signal_of(&status)),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> i32 {
    0
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "return code {}", code),
            ExitStatus::Terminated(sig) => write!(f, "terminated by signal {}", sig),
            ExitStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot open stdin file {}: {source}", path.display())]
    Stdin {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to capture output of '{program}': {source}")]
    Capture {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

// ── Command line ────────────────────────────────────────────────────────────

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a configured command string on whitespace. No shell quoting.
    pub fn parse(command: &str) -> Result<Self, ProcessError> {
        let mut words = command.split_whitespace();
        let program = words.next().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self {
            program: program.to_string(),
            args: words.map(str::to_string).collect(),
        })
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

    fn to_command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(cwd);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// ── Captured output ─────────────────────────────────────────────────────────

/// stdout and stderr interleaved in one text, as a terminal would show them.
#[derive(Debug, Clone)]
pub struct MergedOutput {
    pub status: ExitStatus,
    pub text: String,
}

/// stdout and stderr kept apart, as raw bytes.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `command` in `cwd` with stdout and stderr sharing one capture file.
pub fn run_merged(
    command: &CommandLine,
    cwd: &Path,
    timeout: Duration,
) -> Result<MergedOutput, ProcessError> {
    let capture_err = |source: io::Error| ProcessError::Capture {
        program: command.program.clone(),
        source,
    };
    let mut sink = tempfile::tempfile().map_err(capture_err)?;
    let err_sink = sink.try_clone().map_err(capture_err)?;

    let mut cmd = command.to_command(cwd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(sink.try_clone().map_err(capture_err)?))
        .stderr(Stdio::from(err_sink));

    let status = spawn_and_wait(command, cmd, timeout)?;
    let bytes = read_back(&mut sink).map_err(capture_err)?;
    Ok(MergedOutput {
        status,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Run `command` in `cwd` capturing stdout and stderr separately, with
/// optional stdin redirected from a file.
pub fn run_captured(
    command: &CommandLine,
    cwd: &Path,
    stdin: Option<&Path>,
    timeout: Duration,
) -> Result<CapturedOutput, ProcessError> {
    let capture_err = |source: io::Error| ProcessError::Capture {
        program: command.program.clone(),
        source,
    };
    let mut out_sink = tempfile::tempfile().map_err(capture_err)?;
    let mut err_sink = tempfile::tempfile().map_err(capture_err)?;

    let stdin = match stdin {
        Some(path) => Stdio::from(File::open(path).map_err(|source| ProcessError::Stdin {
            path: path.to_path_buf(),
            source,
        })?),
        None => Stdio::null(),
    };

    let mut cmd = command.to_command(cwd);
    cmd.stdin(stdin)
        .stdout(Stdio::from(out_sink.try_clone().map_err(capture_err)?))
        .stderr(Stdio::from(err_sink.try_clone().map_err(capture_err)?));

    let status = spawn_and_wait(command, cmd, timeout)?;
    Ok(CapturedOutput {
        status,
        stdout: read_back(&mut out_sink).map_err(capture_err)?,
        stderr: read_back(&mut err_sink).map_err(capture_err)?,
    })
}

fn spawn_and_wait(
    command: &CommandLine,
    mut cmd: Command,
    timeout: Duration,
) -> Result<ExitStatus, ProcessError> {
    debug!(
        program = %command.program,
        args = command.args.len(),
        timeout_ms = timeout.as_millis() as u64,
        "launching child"
    );
    let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
        program: command.program.clone(),
        source,
    })?;
    wait_for_child(&mut child, timeout).map_err(|source| ProcessError::Wait {
        program: command.program.clone(),
        source,
    })
}

fn wait_for_child(child: &mut Child, timeout: Duration) -> io::Result<ExitStatus> {
    let started_at = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(ExitStatus::from_std(status));
        }
        if started_at.elapsed() >= timeout {
            warn!(
                pid = child.id(),
                timeout_ms = timeout.as_millis() as u64,
                "child exceeded its time budget, killing"
            );
            // The child may exit on its own between try_wait and kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(ExitStatus::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_back(file: &mut File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
