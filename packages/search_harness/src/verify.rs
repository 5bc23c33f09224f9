use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::io_at;
use crate::{Arguments, Error, Invoker, Program, Result, ensure_files_match, with_timeout};

/// Runs `program` once with visible output and checks that it does not fail within `limit`.
///
/// Returns how long the program took.
///
/// # Errors
///
/// Returns [`Error::Invocation`] if the program fails or panics and [`Error::Timeout`] if it does
/// not finish in time. In the latter case, the program keeps running in the background.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use search_harness::{Arguments, ProgramError, SHORT_TIMEOUT, assert_no_failures};
///
/// let program = Arc::new(|_: &[String]| -> Result<(), ProgramError> { Ok(()) });
///
/// assert_no_failures(program, &Arguments::new(["-text", "input"]), SHORT_TIMEOUT).unwrap();
/// ```
pub fn assert_no_failures(
    program: Arc<dyn Program>,
    arguments: &Arguments,
    limit: Duration,
) -> Result<Duration> {
    let owned = arguments.clone();

    let elapsed =
        with_timeout(limit, move || Invoker::new().invoke_visible(&*program, &owned))??;

    tracing::debug!(%arguments, ?elapsed, "program finished without failures");

    Ok(elapsed)
}

/// An output file the program is expected to produce, with the file it must match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExpectedOutput {
    actual: PathBuf,
    expected: PathBuf,
}

impl ExpectedOutput {
    /// Creates a pair of the file the program writes and the file it must match.
    #[must_use]
    pub fn new(actual: impl Into<PathBuf>, expected: impl Into<PathBuf>) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    /// The file the program writes.
    #[must_use]
    pub fn actual(&self) -> &Path {
        &self.actual
    }

    /// The file it must match.
    #[must_use]
    pub fn expected(&self) -> &Path {
        &self.expected
    }
}

/// Runs `program` and checks every file it produced against the expected file.
///
/// Stale actual files are deleted and their directories created before the run. All pairs are
/// compared even if an early one fails. Actual files that match are deleted; those that do not
/// are kept for inspection.
///
/// # Errors
///
/// Returns [`Error::OutputMismatch`] listing every problem if any file is missing, unreadable or
/// different, and the error of [`assert_no_failures()`] if the program itself fails.
pub fn check_output(
    program: Arc<dyn Program>,
    arguments: &Arguments,
    outputs: &[ExpectedOutput],
    limit: Duration,
) -> Result<()> {
    for output in outputs {
        remove_stale(&output.actual)?;

        if let Some(parent) = output.actual.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
    }

    assert_no_failures(program, arguments, limit)?;

    let failures = outputs
        .iter()
        .filter_map(|output| {
            if let Err(e) = ensure_files_match(&output.actual, &output.expected) {
                return Some(e);
            }

            fs::remove_file(&output.actual)
                .map_err(io_at(&output.actual))
                .err()
        })
        .collect::<Vec<_>>();

    if !failures.is_empty() {
        tracing::debug!(%arguments, failures = failures.len(), "program output did not match");

        return Err(Error::OutputMismatch {
            arguments: arguments.clone(),
            failures,
        });
    }

    tracing::debug!(%arguments, files = outputs.len(), "program output matched");

    Ok(())
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(io_at(path)(e)),
        _ => Ok(()),
    }
}
