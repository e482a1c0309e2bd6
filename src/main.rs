//! cipherloom CLI entry point.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use cipherloom::diagnostics::print_parse_error;
use cipherloom::pipeline::{PipelineConfig, PipelineError, check_builtin_ruleset, optimize_source};
use clap::Parser;
use cli::{Cli, Command};
use loom_ir::print_program;
use loom_trs::RewriteConfig;
use tracing_subscriber::{EnvFilter, fmt};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("CIPHERLOOM_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Optimize {
            file,
            ruleset,
            traversal,
            max_iterations,
            no_cse,
            circuit_saving,
        } => {
            let config = PipelineConfig {
                ruleset,
                rewrite: RewriteConfig {
                    traversal: traversal.into(),
                    max_iterations,
                    circuit_saving,
                },
                cse: !no_cse,
            };
            optimize_file(&file, &config)
        }
        Command::CheckRuleset {
            ruleset,
            order,
            strict,
        } => check(&ruleset, order.order_name(), strict),
    }
}

fn optimize_file(path: &Path, config: &PipelineConfig) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    match optimize_source(&source, config) {
        Ok((program, report)) => {
            print!("{}", print_program(&program));
            eprintln!("{report}");
            ExitCode::SUCCESS
        }
        Err(PipelineError::Parse(err)) => {
            print_parse_error(&err, &source, &path.display().to_string());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn check(ruleset: &str, order: &str, strict: bool) -> ExitCode {
    // Print the full report before failing in strict mode
    match check_builtin_ruleset(ruleset, order, false) {
        Ok(report) => {
            println!("{report}");
            if strict && !report.is_sound() {
                for failure in report.failures() {
                    eprintln!("error: rule `{}` is {}", failure.name, failure.verdict);
                }
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
