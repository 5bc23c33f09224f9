#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the search harness.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io;
use std::num::NonZero;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use argh::FromArgs;
use search_harness::{
    Arguments, BenchSettings, CommandProgram, Comparator, Configuration, Rounds,
    assert_no_failures, compare_files,
};
use tracing::Level;

/// Benchmarks and verifies search index driver programs.
#[derive(FromArgs)]
struct Args {
    /// log every benchmark round to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Compare(CompareArgs),
    Check(CheckArgs),
    Diff(DiffArgs),
}

/// Benchmark two argument configurations of a program and report the speedup.
#[derive(FromArgs)]
#[argh(subcommand, name = "compare")]
struct CompareArgs {
    /// executable to benchmark
    #[argh(option)]
    program: PathBuf,

    /// name of the operation being benchmarked, used in the report
    #[argh(option)]
    name: String,

    /// label of the first configuration ("Single" marks a single-threaded baseline)
    #[argh(option)]
    label1: String,

    /// whitespace-separated arguments of the first configuration
    #[argh(option)]
    args1: String,

    /// label of the second configuration
    #[argh(option)]
    label2: String,

    /// whitespace-separated arguments of the second configuration
    #[argh(option)]
    args2: String,

    /// warmup rounds per configuration (defaults depend on the CI environment)
    #[argh(option)]
    warmup: Option<usize>,

    /// timed rounds per configuration (defaults depend on the CI environment)
    #[argh(option)]
    timed: Option<NonZero<usize>>,

    /// directory that receives the report file
    #[argh(option)]
    artifact_dir: Option<PathBuf>,

    /// fail unless the second configuration is at least this many times faster
    #[argh(option)]
    target: Option<f64>,

    /// give up after this many seconds (defaults to the long timeout)
    #[argh(option)]
    timeout_secs: Option<u64>,
}

/// Run a program once with its output visible and fail if it fails or does not finish in time.
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckArgs {
    /// executable to run
    #[argh(option)]
    program: PathBuf,

    /// whitespace-separated arguments to run it with
    #[argh(option, default = "String::new()")]
    args: String,

    /// give up after this many seconds (defaults to the short timeout)
    #[argh(option)]
    timeout_secs: Option<u64>,
}

/// Compare two text files, ignoring trailing whitespace and trailing blank lines.
#[derive(FromArgs)]
#[argh(subcommand, name = "diff")]
struct DiffArgs {
    /// the file that was produced
    #[argh(positional)]
    actual: PathBuf,

    /// the file it must match
    #[argh(positional)]
    expected: PathBuf,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    match args.command {
        Command::Compare(compare) => run_compare(compare),
        Command::Check(check) => run_check(check),
        Command::Diff(diff) => run_diff(&diff),
    }
}

#[cfg_attr(test, mutants::skip)]
fn run_compare(args: CompareArgs) -> ExitCode {
    let mut settings = BenchSettings::from_env();

    let defaults = settings.rounds();
    settings = settings.with_rounds(Rounds::new(
        args.warmup.unwrap_or(defaults.warmup()),
        args.timed.unwrap_or(defaults.timed()),
    ));

    if let Some(dir) = args.artifact_dir {
        settings = settings.with_artifact_dir(dir);
    }

    if let Some(secs) = args.timeout_secs {
        settings = settings.with_long_timeout(Duration::from_secs(secs));
    }

    let program = Arc::new(CommandProgram::new(args.program));
    let first = Configuration::new(args.label1, Arguments::split_whitespace(&args.args1));
    let second = Configuration::new(args.label2, Arguments::split_whitespace(&args.args2));

    let comparator = Comparator::from_settings(&settings);

    let comparison = match comparator.compare_with_timeout(program, &args.name, &first, &second) {
        Ok(comparison) => comparison,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} is a {} speedup over {}",
        comparison.second().label(),
        comparison.verdict(),
        comparison.first().label()
    );

    match args.target.map(|target| comparison.ensure_speedup(target)) {
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

#[cfg_attr(test, mutants::skip)]
fn run_check(args: CheckArgs) -> ExitCode {
    let mut settings = BenchSettings::from_env();

    if let Some(secs) = args.timeout_secs {
        settings = settings.with_short_timeout(Duration::from_secs(secs));
    }

    let program = Arc::new(CommandProgram::new(args.program));

    match assert_no_failures(
        program,
        &Arguments::split_whitespace(&args.args),
        settings.short_timeout(),
    ) {
        Ok(elapsed) => {
            println!("Finished without failures in {} ms", elapsed.as_millis());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg_attr(test, mutants::skip)]
fn run_diff(args: &DiffArgs) -> ExitCode {
    match compare_files(&args.actual, &args.expected) {
        Ok(diff) => match diff.mismatch_line() {
            None => {
                println!("Files match");
                ExitCode::SUCCESS
            }
            Some(line) => {
                println!(
                    "Files differ on line {line}\n\tat {}\n\tat {}",
                    args.actual.display(),
                    args.expected.display()
                );
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
