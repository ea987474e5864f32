// diag.rs — Unified compiler diagnostic model
//
// One `DiagnosticEntry` per compiler message, independent of which compiler
// (gcc, clang) or version produced it.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

// ── Severity ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Linker,
    Unknown,
}

impl Severity {
    /// Classify the diagnostic-class text captured from a compiler line.
    ///
    /// Only the captured class is inspected, never the message body, so
    /// `warning: 'error' label unused` stays a warning.
    pub fn classify(class: &str) -> Self {
        if class.contains("error") {
            Severity::Error
        } else if class.contains("warning") {
            Severity::Warning
        } else if class.contains("undefined reference") {
            Severity::Linker
        } else {
            Severity::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Linker => "linker",
            Severity::Unknown => "unknown",
        }
    }

    /// Errors and linker failures both count against compilation.
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::Linker)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Diagnostic entry ─────────────────────────────────────────────────────

/// A single normalized compiler message.
///
/// Entries keep the order in which the compiler printed them; nothing
/// downstream re-sorts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub source_file: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl DiagnosticEntry {
    pub fn new(
        source_file: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            severity,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Attach a line number.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a column number.
    pub fn at_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = self.severity.as_str().to_uppercase();
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(
                f,
                "{}: line {}, column {}: {}",
                severity, line, column, self.message
            ),
            (Some(line), None) => write!(f, "{}: line {}: {}", severity, line, self.message),
            _ => write!(f, "{}: {}", severity, self.message),
        }
    }
}
