use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::io_at;
use crate::runner::millis_to_seconds;
use crate::{
    Arguments, BenchSettings, BenchmarkRunner, Error, Invoker, LONG_TIMEOUT, Program, Result,
    Rounds, RunSeries, SpeedupVerdict, with_timeout,
};

/// The label that marks a single-threaded baseline configuration. Matched case-sensitively.
pub const SINGLE_LABEL: &str = "Single";

/// A labeled argument vector, one side of a comparison.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Configuration {
    label: String,
    arguments: Arguments,
}

impl Configuration {
    /// Creates a configuration.
    #[must_use]
    pub fn new(label: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            label: label.into(),
            arguments,
        }
    }

    /// The label shown in reports.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The arguments the program is run with.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Whether this is the single-threaded configuration, which is recognized by the exact
    /// label [`SINGLE_LABEL`].
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.label == SINGLE_LABEL
    }
}

/// Benchmarks two configurations of the program under test against each other.
///
/// The first configuration is the baseline. Each comparison is written as a report file to the
/// artifact directory, replacing the report of any earlier comparison with the same name.
///
/// # Example
///
/// ```
/// use new_zealand::nz;
/// use search_harness::{
///     Arguments, BenchmarkRunner, Comparator, Configuration, Invoker, ProgramError, Rounds,
/// };
///
/// let dir = tempfile::tempdir().unwrap();
/// let program = |_: &[String]| -> Result<(), ProgramError> { Ok(()) };
///
/// let comparator = Comparator::new(
///     BenchmarkRunner::new(Invoker::new()),
///     Rounds::new(1, nz!(2)),
///     dir.path(),
/// );
///
/// let comparison = comparator
///     .compare(
///         &program,
///         "Build",
///         &Configuration::new("Single", Arguments::new(["-text", "input"])),
///         &Configuration::new("Multi", Arguments::new(["-text", "input", "-threads", "3"])),
///     )
///     .unwrap();
///
/// assert!(dir.path().join("bench-build-single.txt").exists());
/// println!("speedup: {}", comparison.speedup());
/// ```
#[derive(Clone, Debug)]
pub struct Comparator {
    runner: BenchmarkRunner,
    rounds: Rounds,
    artifact_dir: PathBuf,
    time_limit: Duration,
}

impl Comparator {
    /// Creates a comparator that runs `rounds` per configuration and writes reports to
    /// `artifact_dir`.
    ///
    /// [`compare_with_timeout()`][Self::compare_with_timeout] gives up after [`LONG_TIMEOUT`]
    /// unless another limit is set with [`with_time_limit()`][Self::with_time_limit].
    #[must_use]
    pub fn new(runner: BenchmarkRunner, rounds: Rounds, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            rounds,
            artifact_dir: artifact_dir.into(),
            time_limit: LONG_TIMEOUT,
        }
    }

    /// Creates a comparator from the rounds, artifact directory and long timeout of `settings`.
    #[must_use]
    pub fn from_settings(settings: &BenchSettings) -> Self {
        Self::new(
            BenchmarkRunner::new(Invoker::new()),
            settings.rounds(),
            settings.artifact_dir(),
        )
        .with_time_limit(settings.long_timeout())
    }

    /// Sets how long [`compare_with_timeout()`][Self::compare_with_timeout] waits.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    /// The directory that receives the reports.
    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// How long [`compare_with_timeout()`][Self::compare_with_timeout] waits.
    #[must_use]
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Same as [`compare()`][Self::compare] but gives up once the time limit of this comparator
    /// has passed. The abandoned comparison keeps running in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the comparison does not finish in time, otherwise the same
    /// errors as [`compare()`][Self::compare].
    pub fn compare_with_timeout(
        &self,
        program: Arc<dyn Program>,
        name: &str,
        first: &Configuration,
        second: &Configuration,
    ) -> Result<Comparison> {
        let comparator = self.clone();
        let name = name.to_string();
        let first = first.clone();
        let second = second.clone();

        with_timeout(self.time_limit, move || {
            comparator.compare(&*program, &name, &first, &second)
        })?
    }

    /// Benchmarks `first`, then `second`, prints the report and saves it under a name derived
    /// from `name`.
    ///
    /// # Errors
    ///
    /// Returns the failure of any round (no report is written in that case) or
    /// [`Error::Io`] if the report cannot be saved.
    pub fn compare(
        &self,
        program: &dyn Program,
        name: &str,
        first: &Configuration,
        second: &Configuration,
    ) -> Result<Comparison> {
        self.runner.release_free_memory();

        let first_series = self.runner.run(program, first.arguments(), self.rounds)?;
        let second_series = self.runner.run(program, second.arguments(), self.rounds)?;

        let comparison = Comparison {
            name: name.to_string(),
            first: ComparisonSide::new(first.label(), first_series),
            second: ComparisonSide::new(second.label(), second_series),
            single: first.is_single(),
        };

        let report = comparison.to_string();
        print!("{report}");

        fs::create_dir_all(&self.artifact_dir).map_err(io_at(&self.artifact_dir))?;
        let path = self.artifact_dir.join(comparison.artifact_file_name());
        fs::write(&path, report).map_err(io_at(&path))?;

        tracing::info!(
            name,
            first = first.label(),
            second = second.label(),
            speedup = comparison.speedup(),
            verdict = %comparison.verdict(),
            report = %path.display(),
            "comparison finished"
        );

        Ok(comparison)
    }
}

/// One benchmarked configuration within a [`Comparison`].
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonSide {
    label: String,
    series: RunSeries,
}

impl ComparisonSide {
    fn new(label: &str, series: RunSeries) -> Self {
        Self {
            label: label.to_string(),
            series,
        }
    }

    /// The label of the configuration.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Every round of the configuration.
    #[must_use]
    pub fn series(&self) -> &RunSeries {
        &self.series
    }

    /// The fastest round, warmup rounds included, in seconds.
    #[must_use]
    pub fn minimum_seconds(&self) -> f64 {
        millis_to_seconds(self.series.min_millis())
    }

    /// The mean of the timed rounds in seconds.
    #[must_use]
    pub fn average_seconds(&self) -> f64 {
        self.series.timed_average_millis() / 1000.0
    }
}

/// The outcome of benchmarking two configurations against each other.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    name: String,
    first: ComparisonSide,
    second: ComparisonSide,
    single: bool,
}

impl Comparison {
    /// The name of the compared scenario.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The baseline configuration.
    #[must_use]
    pub fn first(&self) -> &ComparisonSide {
        &self.first
    }

    /// The configuration expected to be faster.
    #[must_use]
    pub fn second(&self) -> &ComparisonSide {
        &self.second
    }

    /// How many times faster the second configuration is, by fastest round.
    ///
    /// Values above 1 mean the second configuration is faster. If the fastest round of the second
    /// configuration took less than a millisecond, this is infinite (or not a number if the same
    /// holds for the first configuration).
    #[must_use]
    pub fn speedup(&self) -> f64 {
        #[expect(
            clippy::cast_precision_loss,
            reason = "durations in milliseconds are far below 2^52"
        )]
        let (min1, min2) = (
            self.first.series.min_millis() as f64,
            self.second.series.min_millis() as f64,
        );

        min1 / min2
    }

    /// The informational classification of [`speedup()`][Self::speedup].
    #[must_use]
    pub fn verdict(&self) -> SpeedupVerdict {
        SpeedupVerdict::classify(self.speedup())
    }

    /// Checks that the second configuration is at least `target` times faster.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientSpeedup`] if it is not.
    pub fn ensure_speedup(&self, target: f64) -> Result<()> {
        let speedup = self.speedup();

        if speedup >= target {
            return Ok(());
        }

        Err(Error::InsufficientSpeedup {
            first: self.first.label.clone(),
            second: self.second.label.clone(),
            speedup,
            target,
        })
    }

    /// The file name the report is saved under, e.g. `bench-build-single.txt`.
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        let kind = if self.single { "single" } else { "multi" };

        format!("bench-{}-{kind}.txt", self.name.to_lowercase())
    }

    /// Prints the report to standard output.
    pub fn print_to_stdout(&self) {
        print!("{self}");
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        name: &str,
        first: (&str, RunSeries),
        second: (&str, RunSeries),
    ) -> Self {
        Self {
            name: name.to_string(),
            single: first.0 == SINGLE_LABEL,
            first: ComparisonSide::new(first.0, first.1),
            second: ComparisonSide::new(second.0, second.1),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use new_zealand::nz;

    use super::*;
    use crate::pal::{MockPlatform, PlatformFacade, SavedOutput};
    use crate::ProgramError;

    fn quiet_comparator(dir: &Path, rounds: Rounds) -> Comparator {
        let mut mock = MockPlatform::new();
        mock.expect_redirect_output_to_null()
            .returning(|| Ok(SavedOutput::default()));
        mock.expect_restore_output().return_const(());
        mock.expect_memory_in_use().return_const(None::<u64>);
        mock.expect_release_free_memory().times(1).return_const(());

        let runner = BenchmarkRunner::new(Invoker::with_platform(PlatformFacade::from_mock(mock)));

        Comparator::new(runner, rounds, dir)
    }

    #[test]
    fn single_label_must_match_exactly() {
        assert!(Configuration::new("Single", Arguments::default()).is_single());
        assert!(!Configuration::new("single", Arguments::default()).is_single());
        assert!(!Configuration::new("SINGLE", Arguments::default()).is_single());
        assert!(!Configuration::new("Single ", Arguments::default()).is_single());
        assert!(!Configuration::new("1 Worker", Arguments::default()).is_single());
    }

    #[test]
    fn lowercase_single_label_is_saved_as_multi() {
        let dir = tempfile::tempdir().unwrap();
        let program = |_: &[String]| -> std::result::Result<(), ProgramError> { Ok(()) };

        quiet_comparator(dir.path(), Rounds::new(0, nz!(1)))
            .compare(
                &program,
                "Query",
                &Configuration::new("single", Arguments::default()),
                &Configuration::new("Multi", Arguments::default()),
            )
            .unwrap();

        assert!(dir.path().join("bench-query-multi.txt").exists());
        assert!(!dir.path().join("bench-query-single.txt").exists());
    }

    #[test]
    fn speedup_is_ratio_of_minimums() {
        let comparison = Comparison::from_parts(
            "Build",
            ("Single", RunSeries::from_millis(&[100, 500, 400], 1)),
            ("Multi", RunSeries::from_millis(&[300, 200, 250], 1)),
        );

        // Minimums include the warmup round on both sides: 100 / 200.
        assert!(testing::f64_diff_abs(comparison.speedup(), 0.5, 0.000_001) <= 0.0);
        assert_eq!(comparison.verdict(), SpeedupVerdict::Regression);
    }

    #[test]
    fn ensure_speedup_reports_shortfall() {
        let comparison = Comparison::from_parts(
            "Search",
            ("1 Worker", RunSeries::from_millis(&[300, 300], 0)),
            ("3 Workers", RunSeries::from_millis(&[250, 250], 0)),
        );

        comparison.ensure_speedup(1.1).unwrap();

        let error = comparison.ensure_speedup(1.5).unwrap_err();
        assert_eq!(
            error.to_string(),
            "3 Workers has a 1.20x speedup (less than the 1.5x required) compared to 1 Worker."
        );
    }

    #[test]
    fn artifact_name_depends_on_first_label() {
        let single = Comparison::from_parts(
            "Build",
            ("Single", RunSeries::from_millis(&[1], 0)),
            ("Multi", RunSeries::from_millis(&[1], 0)),
        );
        let multi = Comparison::from_parts(
            "Build",
            ("1 Worker", RunSeries::from_millis(&[1], 0)),
            ("3 Workers", RunSeries::from_millis(&[1], 0)),
        );

        assert_eq!(single.artifact_file_name(), "bench-build-single.txt");
        assert_eq!(multi.artifact_file_name(), "bench-build-multi.txt");
    }

    #[test]
    fn compare_runs_first_side_completely_before_second() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = quiet_comparator(dir.path(), Rounds::new(1, nz!(2)));
        let order = Arc::new(Mutex::new(Vec::new()));

        let program = {
            let order = Arc::clone(&order);
            move |args: &[String]| -> std::result::Result<(), ProgramError> {
                order.lock().unwrap().push(args.join(" "));
                Ok(())
            }
        };

        comparator
            .compare(
                &program,
                "Build",
                &Configuration::new("Single", Arguments::new(["a"])),
                &Configuration::new("Multi", Arguments::new(["b"])),
            )
            .unwrap();

        assert_eq!(*order.lock().unwrap(), ["a", "a", "a", "b", "b", "b"]);
    }

    #[test]
    fn compare_writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = quiet_comparator(dir.path(), Rounds::new(0, nz!(2)));
        let program = |_: &[String]| -> std::result::Result<(), ProgramError> {
            thread::sleep(Duration::from_millis(5));
            Ok(())
        };

        let comparison = comparator
            .compare(
                &program,
                "Search",
                &Configuration::new("1 Worker", Arguments::default()),
                &Configuration::new("3 Workers", Arguments::default()),
            )
            .unwrap();

        let report = fs::read_to_string(dir.path().join("bench-search-multi.txt")).unwrap();
        assert_eq!(report, comparison.to_string());
        assert!(report.contains("## Testing Search - 1 Worker versus 3 Workers"));
    }

    #[test]
    fn comparator_takes_its_time_limit_from_settings() {
        let settings =
            BenchSettings::from_lookup(|_| None).with_long_timeout(Duration::from_secs(7));

        let comparator = Comparator::from_settings(&settings);

        assert_eq!(comparator.time_limit(), Duration::from_secs(7));
        assert_eq!(
            Comparator::new(BenchmarkRunner::default(), Rounds::new(0, nz!(1)), ".").time_limit(),
            LONG_TIMEOUT
        );
    }

    #[test]
    fn compare_within_time_limit_returns_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = quiet_comparator(dir.path(), Rounds::new(0, nz!(1)))
            .with_time_limit(Duration::from_secs(30));
        let program: Arc<dyn Program> =
            Arc::new(|_: &[String]| -> std::result::Result<(), ProgramError> { Ok(()) });

        let comparison = comparator
            .compare_with_timeout(
                program,
                "Build",
                &Configuration::new("Single", Arguments::default()),
                &Configuration::new("Multi", Arguments::default()),
            )
            .unwrap();

        assert_eq!(comparison.name(), "Build");
        assert!(dir.path().join("bench-build-single.txt").exists());
    }

    #[test]
    fn slow_comparison_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = quiet_comparator(dir.path(), Rounds::new(0, nz!(1)))
            .with_time_limit(Duration::from_millis(50));
        let program: Arc<dyn Program> =
            Arc::new(|_: &[String]| -> std::result::Result<(), ProgramError> {
                thread::sleep(Duration::from_millis(300));
                Ok(())
            });

        let result = comparator.compare_with_timeout(
            program,
            "Build",
            &Configuration::new("Single", Arguments::default()),
            &Configuration::new("Multi", Arguments::default()),
        );

        assert!(
            matches!(result, Err(Error::Timeout { limit }) if limit == Duration::from_millis(50))
        );
    }

    #[test]
    fn failed_round_writes_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let comparator = quiet_comparator(dir.path(), Rounds::new(0, nz!(1)));
        let calls = Arc::new(AtomicUsize::new(0));

        let program = {
            let calls = Arc::clone(&calls);
            move |_: &[String]| -> std::result::Result<(), ProgramError> {
                if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err("second side failed".into());
                }
                Ok(())
            }
        };

        let result = comparator.compare(
            &program,
            "Build",
            &Configuration::new("Single", Arguments::default()),
            &Configuration::new("Multi", Arguments::new(["-threads", "3"])),
        );

        let Err(Error::Invocation { arguments, .. }) = result else {
            panic!("expected an invocation failure");
        };
        assert_eq!(arguments.as_slice(), ["-threads", "3"]);
        assert!(!dir.path().join("bench-build-single.txt").exists());
    }
}
