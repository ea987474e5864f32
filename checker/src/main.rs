use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ccheck::config::Config;
use ccheck::pipeline::{run_pipeline, PipelineError};
use ccheck::report;

#[derive(Parser, Debug)]
#[command(
    name = "ccheck",
    version,
    about = "C Check — compiles a single-file C program and checks its diagnostics, signatures and outputs"
)]
struct Cli {
    /// Check configuration (TOML)
    config: PathBuf,

    /// Working directory; overrides `working_dir` from the configuration
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Also write a JSON summary of the run to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print summaries only; skip the per-stage report files
    #[arg(long)]
    no_reports: bool,

    /// Log stage timing and child-process launches
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<bool, PipelineError> {
    let config = Config::load(&cli.config, cli.working_dir.as_deref())?;

    let run = run_pipeline(&config, |_, summary| println!("{}", summary))?;

    if !cli.no_reports {
        report::write_reports(&run, &config)?;
    }
    if let Some(path) = &cli.json {
        report::write_json_summary(path, &run, &config)?;
    }
    Ok(run.passed())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("ccheck: error: {}", e);
            ExitCode::from(2)
        }
    }
}
