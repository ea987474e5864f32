// output.rs — Output channel validation
//
// Checks each declared output channel (stdout, stderr, or a named file)
// against its expectations: emptiness, byte-exact equality with a reference
// file, and a per-line column schema. All checks on a channel run; none
// short-circuits another, except that a missing output file has nothing to
// check.
//
// Preconditions: relative paths are resolved against `base_dir`.
// Postconditions: one result per expectation, in declaration order.
// Failure modes: none — every problem is reported as an `OutputError`.
// Side effects: reads output and reference files.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::column::{check_field, ColumnSpec, FieldError};

// ── Expectations ────────────────────────────────────────────────────────────

/// Where an output comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
    File { name: PathBuf },
}

impl Channel {
    /// Name used in summaries and report sections.
    pub fn display_name(&self) -> String {
        match self {
            Channel::Stdout => "stdout".to_string(),
            Channel::Stderr => "stderr".to_string(),
            Channel::File { name } => name.display().to_string(),
        }
    }
}

/// What one output channel is expected to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputExpectation {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default, rename = "empty")]
    pub empty_expected: Option<bool>,
    #[serde(default)]
    pub equal_to: Option<PathBuf>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnSpec>>,
}

impl OutputExpectation {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            empty_expected: None,
            equal_to: None,
            columns: None,
        }
    }

    pub fn expect_empty(mut self) -> Self {
        self.empty_expected = Some(true);
        self
    }

    pub fn equal_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.equal_to = Some(path.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = Some(columns);
        self
    }
}

// ── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputError {
    NotPresent {
        path: PathBuf,
    },
    Unreadable {
        path: PathBuf,
        reason: String,
    },
    NotEmpty,
    ReferenceMissing {
        path: PathBuf,
    },
    NotEqual {
        path: PathBuf,
    },
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    Field {
        line: usize,
        column: usize,
        error: FieldError,
    },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::NotPresent { path } => {
                write!(f, "File '{}' not present", path.display())
            }
            OutputError::Unreadable { path, reason } => {
                write!(f, "File '{}' cannot be read: {}", path.display(), reason)
            }
            OutputError::NotEmpty => write!(f, "Not empty as it should be"),
            OutputError::ReferenceMissing { path } => {
                write!(f, "'equal_to' file '{}' not found", path.display())
            }
            OutputError::NotEqual { path } => write!(
                f,
                "Not equal to the content of the '{}' file",
                path.display()
            ),
            OutputError::FieldCount {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {}: expected {} columns, found {}",
                line, expected, found
            ),
            OutputError::Field {
                line,
                column,
                error,
            } => write!(f, "line {}, column {}: {}", line, column, error),
        }
    }
}

/// Outcome of validating one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputCheckResult {
    pub channel_name: String,
    pub errors: Vec<OutputError>,
}

impl OutputCheckResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for OutputCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "OK");
        }
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

// ── Validation ──────────────────────────────────────────────────────────────

/// Captured standard streams of the executed binary, as raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct Streams<'a> {
    pub stdout: &'a [u8],
    pub stderr: &'a [u8],
}

/// Validate every expectation, in declaration order.
pub fn validate_outputs(
    expectations: &[OutputExpectation],
    streams: Streams<'_>,
    base_dir: &Path,
) -> Vec<OutputCheckResult> {
    expectations
        .iter()
        .map(|exp| validate_one(exp, streams, base_dir))
        .collect()
}

fn validate_one(exp: &OutputExpectation, streams: Streams<'_>, base_dir: &Path) -> OutputCheckResult {
    let channel_name = exp.channel.display_name();

    let content: Cow<'_, [u8]> = match &exp.channel {
        Channel::Stdout => Cow::Borrowed(streams.stdout),
        Channel::Stderr => Cow::Borrowed(streams.stderr),
        Channel::File { name } => match read_bytes(&base_dir.join(name)) {
            Ok(Some(bytes)) => Cow::Owned(bytes),
            Ok(None) => {
                return OutputCheckResult {
                    channel_name,
                    errors: vec![OutputError::NotPresent { path: name.clone() }],
                }
            }
            Err(reason) => {
                return OutputCheckResult {
                    channel_name,
                    errors: vec![OutputError::Unreadable {
                        path: name.clone(),
                        reason,
                    }],
                }
            }
        },
    };

    let mut errors = Vec::new();

    if exp.empty_expected == Some(true) && !content.is_empty() {
        errors.push(OutputError::NotEmpty);
    }

    if let Some(reference) = &exp.equal_to {
        match read_bytes(&base_dir.join(reference)) {
            Ok(Some(expected)) => {
                if expected.as_slice() != &*content {
                    errors.push(OutputError::NotEqual {
                        path: reference.clone(),
                    });
                }
            }
            Ok(None) => errors.push(OutputError::ReferenceMissing {
                path: reference.clone(),
            }),
            Err(reason) => errors.push(OutputError::Unreadable {
                path: reference.clone(),
                reason,
            }),
        }
    }

    if let Some(columns) = &exp.columns {
        check_columns(&String::from_utf8_lossy(&content), columns, &mut errors);
    }

    OutputCheckResult {
        channel_name,
        errors,
    }
}

/// Check each non-blank line against the column schema. Line and column
/// numbers in the errors are 1-based.
pub fn check_columns(content: &str, columns: &[ColumnSpec], errors: &mut Vec<OutputError>) {
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != columns.len() {
            errors.push(OutputError::FieldCount {
                line: idx + 1,
                expected: columns.len(),
                found: fields.len(),
            });
        }
        for (col, (spec, field)) in columns.iter().zip(&fields).enumerate() {
            errors.extend(check_field(spec, field).into_iter().map(|error| {
                OutputError::Field {
                    line: idx + 1,
                    column: col + 1,
                    error,
                }
            }));
        }
    }
}

/// `Ok(None)` when the file does not exist.
fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, String> {
    if !path.is_file() {
        return Ok(None);
    }
    std::fs::read(path).map(Some).map_err(|e| e.to_string())
}
