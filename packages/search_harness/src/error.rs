use std::collections::BTreeSet;
use std::env;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::Arguments;

/// Errors reported by the harness.
///
/// Every error is local to the scenario that produced it. The harness itself keeps working
/// after any of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The program under test failed during a benchmarked or verified call.
    #[error("{}", invocation_report(.arguments, .message, .trace))]
    Invocation {
        /// The arguments the program was called with.
        arguments: Arguments,

        /// The failure as reported by the program, or the panic message.
        message: String,

        /// Trace lines restricted to frames of the program under test. May be empty.
        trace: String,
    },

    /// An operation did not finish within its wall-clock budget and was abandoned.
    ///
    /// Whatever the operation was doing may still be running in the background.
    #[error("operation did not finish within {limit:?} and was abandoned")]
    Timeout {
        /// The budget that was exceeded.
        limit: Duration,
    },

    /// No worker threads were observed while the action was running.
    ///
    /// Thread detection is a sampling heuristic, so this can be a false negative when every
    /// worker starts and stops between two samples.
    #[error("{}", inconclusive_report(.before, .after, .workers))]
    DetectionInconclusive {
        /// Thread names observed before the action started.
        before: BTreeSet<String>,

        /// Thread names observed at any sample while the action was running.
        after: BTreeSet<String>,

        /// The difference of the two, minus harness threads.
        workers: BTreeSet<String>,
    },

    /// Two text files differ.
    #[error(
        "unexpected output on line {line}\n\tat {} and\n\tat {}",
        .actual.display(),
        .expected.display()
    )]
    Mismatch {
        /// The file the program produced.
        actual: PathBuf,

        /// The file it was expected to match.
        expected: PathBuf,

        /// The first 1-based line at which the files diverge.
        line: u64,
    },

    /// One or more output files did not match after a successful program run.
    #[error("{}", output_report(.arguments, .failures))]
    OutputMismatch {
        /// The arguments the program was called with.
        arguments: Arguments,

        /// Every problem found, one per offending file.
        failures: Vec<Error>,
    },

    /// The second configuration was not sufficiently faster than the first.
    #[error(
        "{second} has a {speedup:.2}x speedup (less than the {target:.1}x required) compared to {first}."
    )]
    InsufficientSpeedup {
        /// Label of the baseline configuration.
        first: String,

        /// Label of the configuration expected to be faster.
        second: String,

        /// The measured speedup.
        speedup: f64,

        /// The speedup that was required.
        target: f64,
    },

    /// A thread-activity action panicked instead of completing.
    #[error("the observed action panicked: {message}")]
    ActionPanicked {
        /// The panic message.
        message: String,
    },

    /// The harness could not start one of its own threads.
    #[error("unable to start a harness thread: {source}")]
    ThreadSpawn {
        /// The underlying operating system error.
        source: io::Error,
    },

    /// The process-wide output streams could not be redirected.
    #[error("unable to suppress standard output: {source}")]
    Redirect {
        /// The underlying operating system error.
        source: io::Error,
    },

    /// A file could not be read, written or deleted.
    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,

        /// The underlying I/O error.
        source: io::Error,
    },
}

/// A specialized `Result` type for harness operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Returns a closure that wraps an I/O error with the path it happened at.
pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Io { path, source }
}

/// Renders the common header of failure reports: what went wrong, with which arguments and
/// from which working directory.
pub(crate) fn error_header(arguments: &Arguments, message: &str) -> String {
    let mut header = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(header, "\nError Message:\n{message}\n");
    let _ = writeln!(header, "Arguments ({}):\n{arguments}\n", arguments.len());
    let _ = writeln!(header, "Working Directory:\n{}\n", working_directory_name());

    header
}

fn working_directory_name() -> String {
    env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| ".".to_string())
}

fn invocation_report(arguments: &Arguments, message: &str, trace: &str) -> String {
    let mut report = error_header(arguments, "Unexpected failure while running the program.");

    let _ = writeln!(report, "Error Details:\n{message}");

    if !trace.is_empty() {
        let _ = writeln!(report, "{trace}");
    }

    report
}

fn inconclusive_report(
    before: &BTreeSet<String>,
    after: &BTreeSet<String>,
    workers: &BTreeSet<String>,
) -> String {
    format!(
        "Unable to detect any worker threads. Thread detection samples the live threads while \
         the action runs and can miss workers that start and stop between samples; if you are \
         sure threads are created, give them distinct names or register them explicitly.\n\
         \nThreads Before: {before:?}\nThreads After: {after:?}\nWorker Threads: {workers:?}\n"
    )
}

fn output_report(arguments: &Arguments, failures: &[Error]) -> String {
    let mut report = error_header(arguments, "Found error(s) while comparing file output.");

    let _ = write!(report, "Error Details ({}):", failures.len());

    for failure in failures {
        let _ = write!(report, "\n{failure}\n");
    }

    report
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn invocation_report_lists_arguments_and_trace() {
        let error = Error::Invocation {
            arguments: Arguments::new(["-text", "input/text", "-threads", "3"]),
            message: "index build failed".to_string(),
            trace: "   3: driver::index::build".to_string(),
        };

        let report = error.to_string();

        assert!(report.contains("Arguments (4):\n-text input/text -threads 3"));
        assert!(report.contains("Error Details:\nindex build failed"));
        assert!(report.contains("driver::index::build"));
        assert!(report.contains("Working Directory:"));
    }

    #[test]
    fn invocation_report_without_arguments_says_none() {
        let error = Error::Invocation {
            arguments: Arguments::default(),
            message: "boom".to_string(),
            trace: String::new(),
        };

        assert!(error.to_string().contains("Arguments (0):\n(none)"));
    }

    #[test]
    fn inconclusive_report_shows_all_sets() {
        let error = Error::DetectionInconclusive {
            before: BTreeSet::from(["main".to_string()]),
            after: BTreeSet::from(["main".to_string(), "harness-probe".to_string()]),
            workers: BTreeSet::new(),
        };

        let report = error.to_string();

        assert!(report.contains("Threads Before: {\"main\"}"));
        assert!(report.contains("Threads After: {\"harness-probe\", \"main\"}"));
        assert!(report.contains("Worker Threads: {}"));
    }

    #[test]
    fn insufficient_speedup_names_both_sides() {
        let error = Error::InsufficientSpeedup {
            first: "Single".to_string(),
            second: "3 Workers".to_string(),
            speedup: 1.234,
            target: 1.5,
        };

        assert_eq!(
            error.to_string(),
            "3 Workers has a 1.23x speedup (less than the 1.5x required) compared to Single."
        );
    }

    #[test]
    fn output_report_counts_failures() {
        let error = Error::OutputMismatch {
            arguments: Arguments::new(["-index"]),
            failures: vec![
                Error::Mismatch {
                    actual: PathBuf::from("actual/index.json"),
                    expected: PathBuf::from("expected/index.json"),
                    line: 4,
                },
                Error::Io {
                    path: PathBuf::from("actual/counts.json"),
                    source: io::Error::new(io::ErrorKind::NotFound, "missing"),
                },
            ],
        };

        let report = error.to_string();

        assert!(report.contains("Error Details (2):"));
        assert!(report.contains("unexpected output on line 4"));
        assert!(report.contains("actual/counts.json"));
    }
}
