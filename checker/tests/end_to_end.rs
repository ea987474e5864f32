// End-to-end tests: drive the ccheck binary against a real C compiler.
//
// Each test writes a C source and a check configuration into its own temp
// directory, runs `ccheck` there, and inspects the summary lines, exit code
// and report files.
// Skipped automatically if no C compiler is found.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn ccheck_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ccheck"))
}

fn find_c_compiler() -> Option<String> {
    for compiler in &["cc", "gcc", "clang"] {
        if Command::new(compiler)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            return Some(compiler.to_string());
        }
    }
    None
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// A temp directory holding `prog.c` and `check.toml`.
struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(cc: &str, source: &str, extra_config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prog.c"), source).unwrap();
        let config = format!(
            "filename = \"prog.c\"\n\n\
             [compilation]\n\
             command = \"{cc}\"\n\
             all_warnings_command = \"{cc} -Wall\"\n\n\
             {extra_config}\n"
        );
        std::fs::write(dir.path().join("check.toml"), config).unwrap();
        Fixture { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, extra_args: &[&str]) -> Output {
        Command::new(ccheck_binary())
            .arg(self.path("check.toml"))
            .args(extra_args)
            .env("RUST_LOG", "warn")
            .output()
            .expect("failed to run ccheck")
    }

    fn report(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name))
            .unwrap_or_else(|e| panic!("missing report {}: {}", name, e))
    }
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

macro_rules! require_cc {
    () => {
        match find_c_compiler() {
            Some(c) => c,
            None => {
                eprintln!("SKIP: no C compiler found");
                return;
            }
        }
    };
}

const ADD_PROGRAM: &str = r#"#include <stdio.h>

int add(int a, int b) {
    return a + b;
}

int main(void) {
    int i;
    for (i = 0; i < 3; i++) {
        printf("%d %d\n", i, add(i, i));
    }
    return 0;
}
"#;

const ADD_CONTRACT: &str = r#"
[[parsing.functions]]
name = "add"
return_type = "int"
arg_types = ["int", "int"]
"#;

// ── Passing run ─────────────────────────────────────────────────────────────

#[test]
fn passing_program_exits_zero() {
    let cc = require_cc!();
    let config = format!(
        "{ADD_CONTRACT}\n\
         [[output]]\n\
         type = \"stdout\"\n\
         columns = [{{ datatype = \"int\" }}, {{ datatype = \"int\", max_length = 1 }}]\n\n\
         [[output]]\n\
         type = \"stderr\"\n\
         empty = true\n"
    );
    let fx = Fixture::new(&cc, ADD_PROGRAM, &config);
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(0), "stdout:\n{}", stdout);
    assert!(stdout.contains("Compilation: OK (0 warnings)"), "{}", stdout);
    assert!(stdout.contains("Parsing: OK"), "{}", stdout);
    assert!(stdout.contains("Execution: OK (return code 0)"), "{}", stdout);
    assert!(stdout.contains("Output stdout: OK"), "{}", stdout);
    assert!(stdout.contains("Output stderr: OK"), "{}", stdout);

    assert!(fx
        .report("compilation_report.txt")
        .starts_with("--> COMPILATION SUCCESSFUL <--"));
    assert_eq!(fx.report("parsing_report.txt"), "OK\n");
    assert!(fx.report("execution_report.txt").contains("outcome: return code 0"));
    assert!(fx.path("prog").exists(), "binary should sit in the working dir");
}

#[test]
fn json_summary_carries_provenance() {
    let cc = require_cc!();
    let fx = Fixture::new(&cc, ADD_PROGRAM, ADD_CONTRACT);
    let json_path = fx.path("summary.json");
    let out = fx.run(&["--json", json_path.to_str().unwrap(), "--no-reports"]);
    assert_eq!(out.status.code(), Some(0));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(summary["passed"], true);
    assert_eq!(summary["compilation"]["compiled"], true);
    assert_eq!(summary["execution"]["status"]["kind"], "exited");
    assert_eq!(summary["execution"]["status"]["value"], 0);
    assert_eq!(summary["source_sha256"].as_str().unwrap().len(), 64);
    assert_eq!(summary["checker_version"], env!("CARGO_PKG_VERSION"));
    assert!(!fx.path("compilation_report.txt").exists());
}

// ── Failing checks ──────────────────────────────────────────────────────────

#[test]
fn compile_error_skips_later_stages() {
    let cc = require_cc!();
    let fx = Fixture::new(&cc, "int main(void) {\n    return 0\n}\n", ADD_CONTRACT);
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout.starts_with("Compilation: FAILED ("), "{}", stdout);
    assert!(!stdout.contains("Parsing:"), "{}", stdout);
    assert!(!stdout.contains("Execution:"), "{}", stdout);

    let report = fx.report("compilation_report.txt");
    assert!(report.starts_with("--> COMPILATION FAILED <--"), "{}", report);
    assert!(report.contains("ERROR: line "), "{}", report);
    assert!(!fx.path("execution_report.txt").exists());
}

#[test]
fn signature_mismatch_is_reported() {
    let cc = require_cc!();
    let contract = r#"
[[parsing.functions]]
name = "add"
return_type = "float"
arg_types = ["float", "int"]

[[parsing.functions]]
name = "sub"
return_type = "int"
"#;
    let fx = Fixture::new(&cc, ADD_PROGRAM, contract);
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout.contains("Parsing: FAILED (3 error(s))"), "{}", stdout);
    assert_eq!(
        fx.report("parsing_report.txt"),
        "Function add: return type int != float\n\
         Function add: missing argument of type float\n\
         Function sub not found\n"
    );
}

#[test]
fn wrong_return_code_and_dirty_stderr() {
    let cc = require_cc!();
    let source = r#"#include <stdio.h>
int main(void) {
    fprintf(stderr, "oops\n");
    return 3;
}
"#;
    let config = "[[output]]\ntype = \"stderr\"\nempty = true\n";
    let fx = Fixture::new(&cc, source, config);
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(1));
    assert!(
        stdout.contains("Execution: FAILED (expected return code 0, got return code 3)"),
        "{}",
        stdout
    );
    assert!(stdout.contains("Output stderr: FAILED (1 errors)"), "{}", stdout);
    assert!(fx
        .report("output_report.txt")
        .contains("Not empty as it should be"));
}

#[test]
fn hung_program_times_out() {
    let cc = require_cc!();
    let source = "int main(void) {\n    for (;;) {}\n    return 0;\n}\n";
    let fx = Fixture::new(&cc, source, "[execution]\ntimeout_secs = 1\n");
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(1));
    assert!(
        stdout.contains("Execution: FAILED (expected return code 0, got timed out)"),
        "{}",
        stdout
    );
}

#[test]
fn file_output_and_stdin() {
    let cc = require_cc!();
    let source = r#"#include <stdio.h>
int main(void) {
    double x;
    FILE *out = fopen("values.dat", "w");
    while (scanf("%lf", &x) == 1) {
        fprintf(out, "%.2f\n", x * 2);
    }
    fclose(out);
    return 0;
}
"#;
    let config = r#"
[execution]
stdin = "input.txt"

[[output]]
type = "file"
name = "values.dat"
equal_to = "expected.dat"
columns = [{ datatype = "float", decimal_positions = 2 }]

[[output]]
type = "file"
name = "never_written.dat"
"#;
    let fx = Fixture::new(&cc, source, config);
    std::fs::write(fx.path("input.txt"), "1.5\n2\n").unwrap();
    std::fs::write(fx.path("expected.dat"), "3.00\n4.00\n").unwrap();
    let out = fx.run(&[]);
    let stdout = stdout_of(&out);

    assert!(stdout.contains("Output values.dat: OK"), "{}", stdout);
    assert!(
        stdout.contains("Output never_written.dat: FAILED (1 errors)"),
        "{}",
        stdout
    );
    assert!(fx
        .report("output_report.txt")
        .contains("File 'never_written.dat' not present"));
}

// ── Fatal input ─────────────────────────────────────────────────────────────

#[test]
fn missing_filename_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("check.toml");
    std::fs::write(&config, "[compilation]\ncommand = \"cc\"\n").unwrap();
    let out = Command::new(ccheck_binary()).arg(&config).output().unwrap();

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("filename"), "{}", stderr);
}

#[test]
fn missing_compiler_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("prog.c"), "int main(void) { return 0; }\n").unwrap();
    let config = dir.path().join("check.toml");
    std::fs::write(
        &config,
        "filename = \"prog.c\"\n[compilation]\ncommand = \"no-such-compiler-xyz\"\n",
    )
    .unwrap();
    let out = Command::new(ccheck_binary()).arg(&config).output().unwrap();

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no-such-compiler-xyz"), "{}", stderr);
}

// ── Bundled demo ────────────────────────────────────────────────────────────

#[test]
fn demo_flags_debug_output_on_stderr() {
    // The demo configuration names `cc` explicitly.
    if find_c_compiler().as_deref() != Some("cc") {
        eprintln!("SKIP: `cc` not found");
        return;
    }
    let demo = project_root().join("demos").join("full");
    let work = tempfile::tempdir().unwrap();
    std::fs::copy(demo.join("mycode.c"), work.path().join("mycode.c")).unwrap();

    let out = Command::new(ccheck_binary())
        .arg(demo.join("check.toml"))
        .arg("--working-dir")
        .arg(work.path())
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    let stdout = stdout_of(&out);

    assert_eq!(out.status.code(), Some(1), "{}", stdout);
    assert!(stdout.contains("Compilation: OK"), "{}", stdout);
    assert!(
        stdout.contains("Compiling with all warnings enabled found"),
        "{}",
        stdout
    );
    assert!(stdout.contains("Parsing: OK"), "{}", stdout);
    assert!(stdout.contains("Execution: OK (return code 0)"), "{}", stdout);
    assert!(stdout.contains("Output stdout: OK"), "{}", stdout);
    assert!(stdout.contains("Output stderr: FAILED (1 errors)"), "{}", stdout);
    assert!(stdout.contains("Output output.dat: OK"), "{}", stdout);
    assert!(work.path().join("compilation_report.txt").exists());
}
