// report.rs — Summaries, report files and the JSON summary
//
// Rendering is pure: every `*_summary` / `render_*` function maps a result to
// text. Only `write_reports` and `write_json_summary` touch the filesystem.
//
// Summary lines go to stdout as each stage finishes. Report files carry the
// itemized detail behind each summary line.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::contract::SignatureMismatch;
use crate::memcheck::MemoryCheckResult;
use crate::normalize::CompilationResult;
use crate::output::OutputCheckResult;
use crate::pipeline::{ExecutionResult, RunReport};

#[derive(Debug, Error)]
#[error("cannot write report {}: {source}", path.display())]
pub struct ReportError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "===== {} =====", title);
}

// ── Summary lines ──────────────────────────────────────────────────────────

pub fn compilation_summary(result: &CompilationResult) -> String {
    let mut s = if result.compiled() {
        format!("Compilation: OK ({} warnings)", result.warnings().len())
    } else {
        format!("Compilation: FAILED ({} error(s))", result.errors().len())
    };
    let elevated = result.elevated_warnings().len();
    if elevated > 0 {
        let _ = write!(
            s,
            "\n\tCompiling with all warnings enabled found {} warnings",
            elevated
        );
    }
    s
}

pub fn parsing_summary(mismatches: &[SignatureMismatch]) -> String {
    if mismatches.is_empty() {
        "Parsing: OK".to_string()
    } else {
        format!("Parsing: FAILED ({} error(s))", mismatches.len())
    }
}

pub fn execution_summary(execution: &ExecutionResult) -> String {
    if execution.passed() {
        format!("Execution: OK ({})", execution.status)
    } else {
        format!(
            "Execution: FAILED (expected return code {}, got {})",
            execution.expected_return_code, execution.status
        )
    }
}

pub fn memory_summary(memory: &MemoryCheckResult) -> String {
    if memory.is_ok() {
        "Memory check: OK".to_string()
    } else {
        format!("Memory check: FAILED ({} error(s))", memory.problem_count())
    }
}

/// One line per configured channel, in configuration order.
pub fn output_summary(outputs: &[OutputCheckResult]) -> String {
    outputs
        .iter()
        .map(|o| {
            if o.is_ok() {
                format!("Output {}: OK", o.channel_name)
            } else {
                format!("Output {}: FAILED ({} errors)", o.channel_name, o.errors.len())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Report bodies ──────────────────────────────────────────────────────────

/// Banner, then errors before warnings for the regular build, then the
/// elevated build's warnings in a section of their own.
pub fn render_compilation_report(result: &CompilationResult) -> String {
    let mut out = String::new();
    out.push_str(if result.compiled() {
        "--> COMPILATION SUCCESSFUL <--\n\n"
    } else {
        "--> COMPILATION FAILED <--\n\n"
    });

    section(&mut out, &format!("OUTPUT FOR '{}'", result.regular.command));
    for entry in result.errors().iter().chain(result.warnings()) {
        let _ = writeln!(out, "{}", entry);
    }

    if let Some(elevated) = &result.elevated {
        section(&mut out, &format!("OUTPUT FOR '{}'", elevated.command));
        for entry in &elevated.diagnostics.warnings {
            let _ = writeln!(out, "{}", entry);
        }
    }
    out
}

pub fn render_parsing_report(mismatches: &[SignatureMismatch]) -> String {
    if mismatches.is_empty() {
        return "OK\n".to_string();
    }
    let mut out = String::new();
    for m in mismatches {
        let _ = writeln!(out, "{}", m);
    }
    out
}

pub fn render_execution_report(
    execution: &ExecutionResult,
    memory: Option<&MemoryCheckResult>,
) -> String {
    let mut out = String::new();
    section(&mut out, "EXECUTION");
    let _ = writeln!(out, "command: {}", execution.command);
    let _ = writeln!(out, "outcome: {}", execution.status);
    let _ = writeln!(
        out,
        "expected: return code {}",
        execution.expected_return_code
    );
    let _ = writeln!(out, "stdout: {} bytes", execution.stdout.len());
    let _ = writeln!(out, "stderr: {} bytes", execution.stderr.len());

    if let Some(memory) = memory {
        section(&mut out, &format!("MEMORY CHECK '{}'", memory.log_file.display()));
        if !memory.log_present {
            out.push_str("log not found\n");
        } else if memory.errors.is_empty() {
            out.push_str("OK\n");
        } else {
            for e in &memory.errors {
                let _ = writeln!(out, "{}", e);
            }
        }
    }
    out
}

pub fn render_output_report(outputs: &[OutputCheckResult]) -> String {
    let mut out = String::new();
    for o in outputs {
        section(&mut out, &format!("OUTPUT {}", o.channel_name));
        let _ = writeln!(out, "{}", o);
    }
    out
}

// ── Files ──────────────────────────────────────────────────────────────────

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    std::fs::write(path, contents).map_err(|source| ReportError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// Write one report file per stage that ran, at the configured paths
/// (relative paths resolve against the working directory).
pub fn write_reports(run: &RunReport, config: &Config) -> Result<(), ReportError> {
    write_file(
        &config.resolve(&config.compilation.report_path),
        &render_compilation_report(&run.compilation),
    )?;
    if let Some(mismatches) = &run.mismatches {
        write_file(
            &config.resolve(&config.parsing.report_path),
            &render_parsing_report(mismatches),
        )?;
    }
    if let Some(execution) = &run.execution {
        write_file(
            &config.resolve(&config.execution.report_path),
            &render_execution_report(execution, run.memory.as_ref()),
        )?;
        write_file(
            &config.resolve(&config.output_report_path),
            &render_output_report(&run.outputs),
        )?;
    }
    Ok(())
}

// ── JSON summary ───────────────────────────────────────────────────────────

/// Machine-readable view of a run, with provenance.
pub fn json_summary(run: &RunReport, config: &Config) -> serde_json::Value {
    json!({
        "checker_version": run.provenance.checker_version,
        "source": config.source,
        "source_sha256": run.provenance.source_hash_hex(),
        "passed": run.passed(),
        "compilation": {
            "compiled": run.compilation.compiled(),
            "regular": run.compilation.regular,
            "elevated": run.compilation.elevated,
        },
        "signature_mismatches": run.mismatches.as_ref().map(|ms| {
            ms.iter()
                .map(|m| json!({ "detail": m, "message": m.to_string() }))
                .collect::<Vec<_>>()
        }),
        "execution": run.execution,
        "memory_check": run.memory,
        "outputs": run.outputs.iter().map(|o| json!({
            "channel": o.channel_name,
            "ok": o.is_ok(),
            "errors": o.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

pub fn write_json_summary(path: &Path, run: &RunReport, config: &Config) -> Result<(), ReportError> {
    let text = serde_json::to_string_pretty(&json_summary(run, config))
        .map_err(|e| ReportError {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
    write_file(path, &(text + "\n"))
}
