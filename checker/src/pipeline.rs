// pipeline.rs — Check run orchestration
//
// Sequences one run: compile → (if compiled) signature check → execute →
// memory-check summary → output validation. Each stage's result is kept in
// `RunReport`; stages never share mutable state, and every per-run input
// (commands, paths, timeouts) comes from the `Config` passed in.
//
// Preconditions: `config` passed validation.
// Postconditions: every stage that could run has a result in the report.
// Failure modes: launch failures and unreadable source are `PipelineError`;
//   failed checks are data in the report, not errors.
// Side effects: runs child processes, writes the binary and memory-check log
//   into the working directory, calls `on_stage_complete` after each stage.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::contract::{check_contracts, SignatureMismatch};
use crate::memcheck::{self, MemoryCheckResult};
use crate::normalize::{normalize, CompilationResult, Invocation};
use crate::output::{validate_outputs, OutputCheckResult, Streams};
use crate::process::{self, CommandLine, ExitStatus, ProcessError};
use crate::report::{self, ReportError};
use crate::signature::FunctionTable;

// ── Stages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Compile,
    Signatures,
    Execute,
    MemoryCheck,
    Outputs,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Signatures => "signatures",
            Stage::Execute => "execute",
            Stage::MemoryCheck => "memory_check",
            Stage::Outputs => "outputs",
        }
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Identifies what a report was computed from.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub checker_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.source_hash {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }
}

/// SHA-256 of the raw source text plus the checker version.
pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(&hasher.finalize());

    Provenance {
        source_hash,
        checker_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Results ────────────────────────────────────────────────────────────────

/// Outcome of running the compiled binary once.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub command: String,
    pub status: ExitStatus,
    pub expected_return_code: i32,
    #[serde(skip)]
    pub stdout: Vec<u8>,
    #[serde(skip)]
    pub stderr: Vec<u8>,
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        self.status == ExitStatus::Exited(self.expected_return_code)
    }
}

/// Everything one run found.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub provenance: Provenance,
    pub compilation: CompilationResult,
    /// `None` when compilation failed and the stage was skipped.
    pub mismatches: Option<Vec<SignatureMismatch>>,
    pub execution: Option<ExecutionResult>,
    pub memory: Option<MemoryCheckResult>,
    pub outputs: Vec<OutputCheckResult>,
}

impl RunReport {
    /// True when every check that was configured passed.
    pub fn passed(&self) -> bool {
        self.compilation.compiled()
            && self.mismatches.as_ref().is_some_and(Vec::is_empty)
            && self.execution.as_ref().is_some_and(ExecutionResult::passed)
            && self.memory.as_ref().map_or(true, MemoryCheckResult::is_ok)
            && self.outputs.iter().all(OutputCheckResult::is_ok)
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("cannot read source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} stage: {source}", stage.name())]
    Process {
        stage: Stage,
        #[source]
        source: ProcessError,
    },
    #[error("cannot create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
}

fn in_stage(stage: Stage) -> impl Fn(ProcessError) -> PipelineError {
    move |source| PipelineError::Process { stage, source }
}

fn finish_stage(
    stage: Stage,
    summary: &str,
    elapsed: Duration,
    on_stage_complete: &mut impl FnMut(Stage, &str),
) {
    debug!(
        stage = stage.name(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "stage complete"
    );
    on_stage_complete(stage, summary);
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run every stage for `config`.
///
/// `on_stage_complete` receives each stage's summary text as soon as the
/// stage finishes, for immediate display.
pub fn run_pipeline(
    config: &Config,
    mut on_stage_complete: impl FnMut(Stage, &str),
) -> Result<RunReport, PipelineError> {
    let source = std::fs::read_to_string(&config.source).map_err(|source| {
        PipelineError::Source {
            path: config.source.clone(),
            source,
        }
    })?;
    let provenance = compute_provenance(&source);
    info!(
        source = %config.source.display(),
        hash = %provenance.source_hash_hex(),
        "starting check run"
    );

    // ── Compile ──
    let t = Instant::now();
    let compilation = compile(config)?;
    finish_stage(
        Stage::Compile,
        &report::compilation_summary(&compilation),
        t.elapsed(),
        &mut on_stage_complete,
    );

    let mut run = RunReport {
        provenance,
        compilation,
        mismatches: None,
        execution: None,
        memory: None,
        outputs: Vec::new(),
    };
    if !run.compilation.compiled() {
        return Ok(run);
    }

    // ── Signatures ──
    let t = Instant::now();
    let table = FunctionTable::from_source(&source);
    let mismatches = check_contracts(&table, &config.parsing.functions);
    debug!(functions = table.len(), mismatches = mismatches.len(), "signatures checked");
    finish_stage(
        Stage::Signatures,
        &report::parsing_summary(&mismatches),
        t.elapsed(),
        &mut on_stage_complete,
    );
    run.mismatches = Some(mismatches);

    // ── Execute ──
    let t = Instant::now();
    let execution = execute(config)?;
    finish_stage(
        Stage::Execute,
        &report::execution_summary(&execution),
        t.elapsed(),
        &mut on_stage_complete,
    );

    // ── Memory check ──
    if config.memory_check.enabled {
        let t = Instant::now();
        let memory = memcheck::read_log(
            &config.resolve(&config.memory_check.log_file),
            &config.memory_check.log_file,
        );
        finish_stage(
            Stage::MemoryCheck,
            &report::memory_summary(&memory),
            t.elapsed(),
            &mut on_stage_complete,
        );
        run.memory = Some(memory);
    }

    // ── Outputs ──
    let t = Instant::now();
    let outputs = validate_outputs(
        &config.output,
        Streams {
            stdout: &execution.stdout,
            stderr: &execution.stderr,
        },
        &config.working_dir,
    );
    finish_stage(
        Stage::Outputs,
        &report::output_summary(&outputs),
        t.elapsed(),
        &mut on_stage_complete,
    );
    run.execution = Some(execution);
    run.outputs = outputs;

    Ok(run)
}

/// Regular build into the working directory, then the elevated-warnings
/// build into a throwaway directory so a failing strict build cannot remove
/// the regular binary.
fn compile(config: &Config) -> Result<CompilationResult, PipelineError> {
    let source = config.source.display().to_string();
    let timeout = config.compile_timeout();

    let command = config.compile_command().map_err(in_stage(Stage::Compile))?;
    let full = command
        .clone()
        .arg("-o")
        .arg(config.executable().display().to_string())
        .arg(&source);
    let merged = process::run_merged(&full, &config.working_dir, timeout)
        .map_err(in_stage(Stage::Compile))?;
    let regular = Invocation {
        command: command.to_string(),
        status: merged.status,
        diagnostics: normalize(&merged.text),
    };
    info!(
        status = %regular.status,
        warnings = regular.diagnostics.warnings.len(),
        errors = regular.diagnostics.errors.len(),
        "regular build finished"
    );

    let elevated = match config
        .all_warnings_command()
        .map_err(in_stage(Stage::Compile))?
    {
        Some(command) => {
            let scratch = tempfile::tempdir().map_err(PipelineError::Scratch)?;
            let full = command
                .clone()
                .arg("-o")
                .arg(scratch.path().join("a.out").display().to_string())
                .arg(&source);
            let merged = process::run_merged(&full, &config.working_dir, timeout)
                .map_err(in_stage(Stage::Compile))?;
            Some(Invocation {
                command: command.to_string(),
                status: merged.status,
                diagnostics: normalize(&merged.text),
            })
        }
        None => None,
    };

    Ok(CompilationResult {
        source_file: source,
        regular,
        elevated,
    })
}

/// Run the compiled binary once, under the memory checker when enabled.
fn execute(config: &Config) -> Result<ExecutionResult, PipelineError> {
    let program = CommandLine::new(config.executable().display().to_string())
        .args(config.execution.arguments.split_whitespace());

    let command = if config.memory_check.enabled {
        let log = config.resolve(&config.memory_check.log_file);
        // A stale log from an earlier run must not pass for this one.
        let _ = std::fs::remove_file(&log);
        memcheck::wrap(&config.memory_check, &log, program).map_err(in_stage(Stage::Execute))?
    } else {
        program
    };

    let stdin = config.execution.stdin.as_ref().map(|p| config.resolve(p));
    let captured = process::run_captured(
        &command,
        &config.working_dir,
        stdin.as_deref(),
        config.execution_timeout(),
    )
    .map_err(in_stage(Stage::Execute))?;
    info!(status = %captured.status, "execution finished");

    Ok(ExecutionResult {
        command: command.to_string(),
        status: captured.status,
        expected_return_code: config.execution.expected_return_code,
        stdout: captured.stdout,
        stderr: captured.stderr,
    })
}
