// normalize.rs — Compiler output normalizer
//
// Turns the merged stdout+stderr text of one compiler invocation into an
// ordered list of `DiagnosticEntry`. Each line is classified by a pure
// function into one of four shapes; unrecognized lines (banners, notes,
// source excerpts, caret lines) are dropped.
//
// Preconditions: none.
// Postconditions: entry order equals line order in the input text.
// Failure modes: none; lines in unknown formats are dropped.
// Side effects: none.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::diag::{DiagnosticEntry, Severity};
use crate::process::ExitStatus;

// ── Line patterns ───────────────────────────────────────────────────────────

fn column_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*):(\d+):(\d+):.*?(warning|error):(.*)$").expect("static pattern")
    })
}

fn line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*):(\d+):.*?(warning|error):(.*)$").expect("static pattern"))
}

fn linker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*):(.*): (undefined reference)(.*)$").expect("static pattern"))
}

// ── Classification ──────────────────────────────────────────────────────────

/// Shape of one compiler output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<'a> {
    /// `path:line:column: ... class: message`
    ColumnDiagnostic {
        file: &'a str,
        line: u32,
        column: u32,
        class: &'a str,
        message: &'a str,
    },
    /// `path:line: ... class: message`
    LineDiagnostic {
        file: &'a str,
        line: u32,
        class: &'a str,
        message: &'a str,
    },
    /// `path:location: undefined reference ...`
    LinkerDiagnostic {
        file: &'a str,
        class: &'a str,
        rest: &'a str,
    },
    NoMatch,
}

/// Classify a single line. Patterns are tried in priority order: column
/// qualified, line only, linker. The first that matches wins.
pub fn classify_line(line: &str) -> LineMatch<'_> {
    let line = line.trim_end();

    // A matched shape whose numbers overflow is dropped, not retried
    // against a looser pattern.
    if let Some(c) = column_pattern().captures(line) {
        return match (c[2].parse(), c[3].parse()) {
            (Ok(lineno), Ok(column)) => LineMatch::ColumnDiagnostic {
                file: c.get(1).map_or("", |m| m.as_str()),
                line: lineno,
                column,
                class: c.get(4).map_or("", |m| m.as_str()),
                message: c.get(5).map_or("", |m| m.as_str()),
            },
            _ => LineMatch::NoMatch,
        };
    }

    if let Some(c) = line_pattern().captures(line) {
        return match c[2].parse() {
            Ok(lineno) => LineMatch::LineDiagnostic {
                file: c.get(1).map_or("", |m| m.as_str()),
                line: lineno,
                class: c.get(3).map_or("", |m| m.as_str()),
                message: c.get(4).map_or("", |m| m.as_str()),
            },
            Err(_) => LineMatch::NoMatch,
        };
    }

    if let Some(c) = linker_pattern().captures(line) {
        return LineMatch::LinkerDiagnostic {
            file: c.get(1).map_or("", |m| m.as_str()),
            class: c.get(3).map_or("", |m| m.as_str()),
            rest: c.get(4).map_or("", |m| m.as_str()),
        };
    }

    LineMatch::NoMatch
}

impl LineMatch<'_> {
    /// Build the entry for a matched line. `NoMatch` yields `None`.
    pub fn into_entry(self) -> Option<DiagnosticEntry> {
        match self {
            LineMatch::ColumnDiagnostic {
                file,
                line,
                column,
                class,
                message,
            } => Some(
                DiagnosticEntry::new(file.trim(), Severity::classify(class), message.trim())
                    .at_line(line)
                    .at_column(column),
            ),
            LineMatch::LineDiagnostic {
                file,
                line,
                class,
                message,
            } => Some(
                DiagnosticEntry::new(file.trim(), Severity::classify(class), message.trim())
                    .at_line(line),
            ),
            LineMatch::LinkerDiagnostic { file, class, rest } => Some(DiagnosticEntry::new(
                file.trim(),
                Severity::classify(class),
                format!("{}{}", class, rest).trim_end(),
            )),
            LineMatch::NoMatch => None,
        }
    }
}

// ── Normalized output ───────────────────────────────────────────────────────

/// All entries of one invocation plus the warning/error partitions.
///
/// Unknown-severity entries stay in `entries` but appear in neither bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub entries: Vec<DiagnosticEntry>,
    pub warnings: Vec<DiagnosticEntry>,
    pub errors: Vec<DiagnosticEntry>,
}

/// Normalize the full text of one compiler invocation.
pub fn normalize(text: &str) -> Diagnostics {
    let mut out = Diagnostics::default();
    for entry in text.lines().filter_map(|l| classify_line(l).into_entry()) {
        match entry.severity {
            Severity::Warning => out.warnings.push(entry.clone()),
            s if s.is_error() => out.errors.push(entry.clone()),
            _ => {}
        }
        out.entries.push(entry);
    }
    out
}

// ── Compilation result ──────────────────────────────────────────────────────

/// Outcome of one compiler invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    /// The command line as configured (without `-o` and the source path).
    pub command: String,
    pub status: ExitStatus,
    pub diagnostics: Diagnostics,
}

/// Regular and (optional) elevated-warnings invocations for one source file.
///
/// Success is decided by the regular invocation's exit status alone, never
/// by how many entries were parsed.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationResult {
    pub source_file: String,
    pub regular: Invocation,
    pub elevated: Option<Invocation>,
}

impl CompilationResult {
    pub fn compiled(&self) -> bool {
        self.regular.status.success()
    }

    pub fn warnings(&self) -> &[DiagnosticEntry] {
        &self.regular.diagnostics.warnings
    }

    pub fn errors(&self) -> &[DiagnosticEntry] {
        &self.regular.diagnostics.errors
    }

    /// Warnings surfaced by the elevated-warnings build (empty if disabled).
    pub fn elevated_warnings(&self) -> &[DiagnosticEntry] {
        self.elevated
            .as_ref()
            .map_or(&[][..], |inv| &inv.diagnostics.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_qualified_line() {
        let m = classify_line("foo.c:3:5: warning: unused variable 'x' [-Wunused-variable]");
        assert_eq!(
            m,
            LineMatch::ColumnDiagnostic {
                file: "foo.c",
                line: 3,
                column: 5,
                class: "warning",
                message: " unused variable 'x' [-Wunused-variable]",
            }
        );
    }

    #[test]
    fn overflowing_numbers_do_not_fall_back_to_a_looser_shape() {
        assert_eq!(
            classify_line("foo.c:4294967296:5: warning: w"),
            LineMatch::NoMatch
        );
        assert_eq!(
            classify_line("foo.c:3:4294967296: warning: w"),
            LineMatch::NoMatch
        );
        assert_eq!(
            classify_line("foo.c:4294967296: error: e"),
            LineMatch::NoMatch
        );
        assert!(normalize("foo.c:4294967296:5: warning: w").entries.is_empty());
    }

    #[test]
    fn line_only_has_no_column() {
        let e = classify_line("foo.c:7: error: expected ';' before '}' token")
            .into_entry()
            .unwrap();
        assert_eq!(e.line, Some(7));
        assert_eq!(e.column, None);
        assert_eq!(e.severity, Severity::Error);
        assert_eq!(e.message, "expected ';' before '}' token");
    }

    #[test]
    fn severity_ignores_message_body() {
        let e = classify_line("foo.c:3:5: warning: 'error' label unused")
            .into_entry()
            .unwrap();
        assert_eq!(e.line, Some(3));
        assert_eq!(e.column, Some(5));
        assert_eq!(e.severity, Severity::Warning);
        assert_eq!(e.message, "'error' label unused");
    }

    #[test]
    fn fatal_error_is_error() {
        let e = classify_line("foo.c:1:10: fatal error: nothere.h: No such file or directory")
            .into_entry()
            .unwrap();
        assert_eq!(e.severity, Severity::Error);
        assert_eq!(e.message, "nothere.h: No such file or directory");
    }

    #[test]
    fn linker_line() {
        let e = classify_line("/tmp/ccAbc.o:mycode.c:(.text+0x1a): undefined reference to `foo'")
            .into_entry()
            .unwrap();
        assert_eq!(e.severity, Severity::Linker);
        assert_eq!(e.message, "undefined reference to `foo'");
        assert_eq!(e.line, None);
        assert_eq!(e.source_file, "/tmp/ccAbc.o:mycode.c");
    }

    #[test]
    fn banners_are_dropped() {
        assert_eq!(
            classify_line("foo.c: In function 'main':"),
            LineMatch::NoMatch
        );
        assert_eq!(
            classify_line("collect2: error: ld returned 1 exit status"),
            LineMatch::NoMatch
        );
        assert_eq!(classify_line("    3 |   int x;"), LineMatch::NoMatch);
        assert_eq!(classify_line(""), LineMatch::NoMatch);
    }

    #[test]
    fn partitions_preserve_order() {
        let text = "\
foo.c: In function 'main':
foo.c:3:5: warning: unused variable 'x'
foo.c:4:1: error: expected ';'
foo.c:9:2: warning: implicit declaration
main.c:(.text+0x5): undefined reference to `bar'
";
        let d = normalize(text);
        assert_eq!(d.entries.len(), 4);
        assert_eq!(d.warnings.len(), 2);
        assert_eq!(d.warnings[0].line, Some(3));
        assert_eq!(d.warnings[1].line, Some(9));
        assert_eq!(d.errors.len(), 2);
        assert_eq!(d.errors[0].severity, Severity::Error);
        assert_eq!(d.errors[1].severity, Severity::Linker);
    }

    #[test]
    fn elevated_keeps_only_warnings() {
        let result = CompilationResult {
            source_file: "foo.c".into(),
            regular: Invocation {
                command: "gcc".into(),
                status: ExitStatus::Exited(0),
                diagnostics: Diagnostics::default(),
            },
            elevated: Some(Invocation {
                command: "gcc -Wall".into(),
                status: ExitStatus::Exited(1),
                diagnostics: normalize("foo.c:3:5: warning: a\nfoo.c:4:5: error: b\n"),
            }),
        };
        let w = result.elevated_warnings();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].message, "a");
    }

    #[test]
    fn success_is_independent_of_entries() {
        let with_warnings = CompilationResult {
            source_file: "foo.c".into(),
            regular: Invocation {
                command: "gcc".into(),
                status: ExitStatus::Exited(0),
                diagnostics: normalize("foo.c:3:5: warning: a\n"),
            },
            elevated: None,
        };
        assert!(with_warnings.compiled());
        assert_eq!(with_warnings.warnings().len(), 1);

        let silent_failure = CompilationResult {
            source_file: "foo.c".into(),
            regular: Invocation {
                command: "gcc".into(),
                status: ExitStatus::Exited(1),
                diagnostics: normalize("gcc: internal compiler error\n"),
            },
            elevated: None,
        };
        assert!(!silent_failure.compiled());
        assert!(silent_failure.errors().is_empty());
        assert!(silent_failure.elevated_warnings().is_empty());
    }
}
