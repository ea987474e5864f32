// memcheck.rs — Memory checker wrapping and log summary
//
// When enabled, the single execution of the binary runs under the memory
// checker (valgrind by default). The checker writes an XML log; its own text
// commentary goes to a side file so the captured stdout/stderr stay those of
// the binary alone. The log is summarized lexically: one entry per
// `<error>` record.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::MemoryCheckConfig;
use crate::process::{CommandLine, ProcessError};

/// Wrap `program` so it runs under the configured memory checker, writing
/// its XML log to `log_path`.
pub fn wrap(
    config: &MemoryCheckConfig,
    log_path: &Path,
    program: CommandLine,
) -> Result<CommandLine, ProcessError> {
    let log = log_path.display();
    Ok(CommandLine::parse(&config.command)?
        .arg("--xml=yes")
        .arg(format!("--xml-file={}", log))
        .arg(format!("--log-file={}.txt", log))
        .arg(program.program)
        .args(program.args))
}

// ── Log summary ─────────────────────────────────────────────────────────────

/// One error record from the checker's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryError {
    pub kind: String,
    pub what: String,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.what.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.what)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryCheckResult {
    pub log_file: PathBuf,
    /// `false` when the checker left no log behind.
    pub log_present: bool,
    pub errors: Vec<MemoryError>,
}

impl MemoryCheckResult {
    pub fn is_ok(&self) -> bool {
        self.log_present && self.errors.is_empty()
    }

    /// Number of reported problems; a missing log counts as one.
    pub fn problem_count(&self) -> usize {
        self.errors.len() + usize::from(!self.log_present)
    }
}

/// Read and summarize the log at `path`.
pub fn read_log(path: &Path, display_path: &Path) -> MemoryCheckResult {
    match std::fs::read(path) {
        Ok(bytes) => MemoryCheckResult {
            log_file: display_path.to_path_buf(),
            log_present: true,
            errors: summarize(&String::from_utf8_lossy(&bytes)),
        },
        Err(_) => MemoryCheckResult {
            log_file: display_path.to_path_buf(),
            log_present: false,
            errors: Vec::new(),
        },
    }
}

fn error_record() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<error>(.*?)</error>").expect("static pattern"))
}

fn kind_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<kind>(.*?)</kind>").expect("static pattern"))
}

fn what_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Plain errors carry <what>; leak records carry <xwhat><text>.
    RE.get_or_init(|| {
        Regex::new(r"(?s)<what>(.*?)</what>|<xwhat>\s*<text>(.*?)</text>").expect("static pattern")
    })
}

/// Extract every `<error>` record, in log order.
pub fn summarize(xml: &str) -> Vec<MemoryError> {
    error_record()
        .captures_iter(xml)
        .map(|record| {
            let body = &record[1];
            let kind = kind_tag()
                .captures(body)
                .map(|c| unescape(c[1].trim()))
                .unwrap_or_else(|| "Unknown".to_string());
            let what = what_tag()
                .captures(body)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| unescape(m.as_str().trim()))
                .unwrap_or_default();
            MemoryError { kind, what }
        })
        .collect()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
