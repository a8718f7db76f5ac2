mod config;
mod error;
mod run_log;
mod runner;
mod scan;

use std::{
    fs,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, error::ErrorKind};
use colored::Colorize;

use crate::{config::HarnessConfig, error::HarnessError, run_log::RunLog, runner::Runner};

const DEFAULT_NAME: &str = "vsl-codegen-tester";

fn main() -> ExitCode {
    let name = program_name();
    match run(&name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&name, &err);
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "vsl-codegen-tester",
    version,
    about = "Runs the //TESTCASE: blocks of a VSL file against its compiled binary"
)]
struct Cli {
    /// Annotated source file; its compiled binary sits next to it.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
    /// TOML configuration file (default: codegen-tester.toml next to FILE).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seconds each invocation may run before the whole run is aborted.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// Append a timestamped run log to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Print the binary's standard error when its output does not match.
    #[arg(long)]
    show_stderr: bool,
}

fn run(name: &str) -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            return Err(HarnessError::Usage {
                message: clap_message(&err),
                usage: usage(name),
            }
            .into());
        }
    };

    let [input] = cli.files.as_slice() else {
        return Err(HarnessError::Usage {
            message: "expected one input .vsl file".into(),
            usage: usage(name),
        }
        .into());
    };

    if !input.is_file() {
        return Err(HarnessError::InputNotFound(input.clone()).into());
    }
    let config = HarnessConfig::load(cli.config.as_deref(), input, cli.timeout)?;
    let companion = config.companion_path(input);
    if !companion.is_file() {
        return Err(HarnessError::CompanionNotFound(companion).into());
    }

    let mut log = match &cli.log_file {
        Some(path) => RunLog::open(path)?,
        None => RunLog::disabled(),
    };

    let source = read_source(input)?;
    let cases = scan::scan(&source, config.syntax());

    let runner = Runner {
        companion: &companion,
        timeout: config.timeout,
        show_stderr: cli.show_stderr,
    };
    runner.run_all(input, &cases, &mut log)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// First line of clap's rendered error, without its own `error: ` label.
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments");
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn stderr_colors(is_terminal: bool, no_color: bool) -> bool {
    is_terminal && !no_color
}

fn report(name: &str, err: &anyhow::Error) {
    colored::control::set_override(stderr_colors(
        io::stderr().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    ));
    eprintln!("{}: {} {:#}", name, "error:".red().bold(), err);
    if let Some(detail) = err.downcast_ref::<HarnessError>().and_then(HarnessError::detail) {
        eprintln!("{detail}");
    }
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| DEFAULT_NAME.to_string())
}

fn usage(name: &str) -> String {
    format!(
        "Usage: {name} [OPTIONS] <file.vsl>

For each occurrence of a VSL comment block starting with
//TESTCASE: <args>
the compiled executable file.out is run with the given <args>.
Its output is compared against the rest of the comment block.
If they differ, both are printed and the test fails.

Run `{name} --help` for the list of options."
    )
}
