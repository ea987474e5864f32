// config.rs — Run configuration
//
// Loads the TOML run description into an explicit structure. Optional tables
// fall back to their defaults; the few cross-field rules serde cannot express
// are checked in `validate`.
//
// Preconditions: none.
// Postconditions: a returned `Config` names an existing source file inside an
//   existing working directory, and every declared column is well-formed.
// Failure modes: all problems are `ConfigError` and fatal to the run.
// Side effects: reads the config file and checks paths on disk.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::column::Datatype;
use crate::contract::RequiredFunctionContract;
use crate::output::{Channel, OutputExpectation};
use crate::process::{CommandLine, ProcessError};

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("required key '{key}' not found in '{}'", path.display())]
    MissingKey { key: &'static str, path: PathBuf },
    #[error("working directory '{}' does not exist", path.display())]
    WorkingDir { path: PathBuf },
    #[error("source file '{}' does not exist or it is not accessible", path.display())]
    SourceMissing { path: PathBuf },
    #[error("'{key}' must not be empty")]
    EmptyCommand { key: &'static str },
    #[error("output #{index}: {reason}")]
    InvalidChannel { index: usize, reason: String },
    #[error("output '{channel}', column {column}: {reason}")]
    InvalidColumn {
        channel: String,
        column: usize,
        reason: String,
    },
}

// ── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilationConfig {
    pub command: String,
    pub all_warnings_command: String,
    #[serde(alias = "all_warnings")]
    pub enable_all_warnings: bool,
    pub report_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            command: "gcc".to_string(),
            all_warnings_command: "gcc -Wall".to_string(),
            enable_all_warnings: true,
            report_path: PathBuf::from("compilation_report.txt"),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub report_path: PathBuf,
    pub functions: Vec<RequiredFunctionContract>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("parsing_report.txt"),
            functions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub arguments: String,
    /// File fed to the binary's standard input.
    pub stdin: Option<PathBuf>,
    pub expected_return_code: i32,
    pub timeout_secs: u64,
    pub report_path: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            arguments: String::new(),
            stdin: None,
            expected_return_code: 0,
            timeout_secs: 10,
            report_path: PathBuf::from("execution_report.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryCheckConfig {
    #[serde(alias = "enable")]
    pub enabled: bool,
    pub command: String,
    #[serde(alias = "xml_file")]
    pub log_file: PathBuf,
}

impl Default for MemoryCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "valgrind --leak-check=full --show-leak-kinds=all".to_string(),
            log_file: PathBuf::from("valgrind_log.xml"),
        }
    }
}

// ── Top level ───────────────────────────────────────────────────────────────

/// On-disk shape, before paths are resolved.
#[derive(Debug, Deserialize)]
struct RawConfig {
    filename: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    #[serde(default)]
    compilation: CompilationConfig,
    #[serde(default)]
    parsing: ParsingConfig,
    #[serde(default)]
    execution: ExecutionConfig,
    #[serde(default, alias = "valgrind")]
    memory_check: MemoryCheckConfig,
    #[serde(default = "default_output_report_path")]
    output_report_path: PathBuf,
    #[serde(default)]
    output: Vec<OutputExpectation>,
}

fn default_output_report_path() -> PathBuf {
    PathBuf::from("output_report.txt")
}

/// A validated run description. All relative paths inside resolve against
/// `working_dir`.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub working_dir: PathBuf,
    pub compilation: CompilationConfig,
    pub parsing: ParsingConfig,
    pub execution: ExecutionConfig,
    pub memory_check: MemoryCheckConfig,
    pub output_report_path: PathBuf,
    pub output: Vec<OutputExpectation>,
}

impl Config {
    /// Load and validate a config file. A relative `working_dir` (and the
    /// default, when absent) is taken relative to the config file's
    /// directory; `working_dir_override` replaces it entirely.
    pub fn load(path: &Path, working_dir_override: Option<&Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, path, base, working_dir_override)
    }

    /// Parse TOML text. `origin` is only used in error messages.
    pub fn from_toml(
        text: &str,
        origin: &Path,
        base: &Path,
        working_dir_override: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let filename = raw.filename.ok_or_else(|| ConfigError::MissingKey {
            key: "filename",
            path: origin.to_path_buf(),
        })?;

        let working_dir = match (working_dir_override, raw.working_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => base.join(dir),
            (None, None) => base.to_path_buf(),
        };
        let working_dir = if working_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            working_dir
        };
        // Children run with this as their cwd, so it must not stay relative.
        let working_dir = working_dir
            .canonicalize()
            .map_err(|_| ConfigError::WorkingDir { path: working_dir })?;

        let config = Config {
            source: working_dir.join(filename),
            working_dir,
            compilation: raw.compilation,
            parsing: raw.parsing,
            execution: raw.execution,
            memory_check: raw.memory_check,
            output_report_path: raw.output_report_path,
            output: raw.output,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.working_dir.is_dir() {
            return Err(ConfigError::WorkingDir {
                path: self.working_dir.clone(),
            });
        }
        if !self.source.is_file() {
            return Err(ConfigError::SourceMissing {
                path: self.source.clone(),
            });
        }

        if self.compilation.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand {
                key: "compilation.command",
            });
        }
        if self.compilation.enable_all_warnings
            && self.compilation.all_warnings_command.trim().is_empty()
        {
            return Err(ConfigError::EmptyCommand {
                key: "compilation.all_warnings_command",
            });
        }
        if self.memory_check.enabled && self.memory_check.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand {
                key: "memory_check.command",
            });
        }

        for (index, exp) in self.output.iter().enumerate() {
            if let Channel::File { name } = &exp.channel {
                if name.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidChannel {
                        index: index + 1,
                        reason: "file output needs a non-empty 'name'".to_string(),
                    });
                }
            }
            for (col, spec) in exp.columns.iter().flatten().enumerate() {
                if spec.decimal_positions.is_some() && spec.datatype != Some(Datatype::Float) {
                    return Err(ConfigError::InvalidColumn {
                        channel: exp.channel.display_name(),
                        column: col + 1,
                        reason: "'decimal_positions' needs datatype = \"float\"".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Resolve a configured path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.working_dir.join(path)
    }

    /// Where the regular build puts the binary: the source stem, in the
    /// working directory.
    pub fn executable(&self) -> PathBuf {
        let stem = self
            .source
            .file_stem()
            .map_or_else(|| "a.out".into(), |s| s.to_os_string());
        self.working_dir.join(stem)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compilation.timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.timeout_secs)
    }

    /// Regular compiler command, with debug info added for the memory checker.
    pub fn compile_command(&self) -> Result<CommandLine, ProcessError> {
        CommandLine::parse(&self.compilation.command).map(|cmd| self.with_debug_info(cmd))
    }

    /// Elevated-warnings compiler command, or `None` when disabled.
    pub fn all_warnings_command(&self) -> Result<Option<CommandLine>, ProcessError> {
        if !self.compilation.enable_all_warnings {
            return Ok(None);
        }
        CommandLine::parse(&self.compilation.all_warnings_command)
            .map(|cmd| Some(self.with_debug_info(cmd)))
    }

    fn with_debug_info(&self, cmd: CommandLine) -> CommandLine {
        if self.memory_check.enabled {
            cmd.arg("-g2")
        } else {
            cmd
        }
    }
}
