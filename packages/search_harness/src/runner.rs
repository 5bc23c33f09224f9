use std::num::NonZero;
use std::thread;
use std::time::Duration;

use crate::pal::Platform;
use crate::{Arguments, Invoker, Program, Result};

/// How many rounds a benchmark runs: warmup rounds first, then timed rounds.
///
/// Warmup rounds are reported and count towards the minimum, but are excluded from averages.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Rounds {
    warmup: usize,
    timed: NonZero<usize>,
}

impl Rounds {
    /// Creates a round configuration.
    #[must_use]
    pub const fn new(warmup: usize, timed: NonZero<usize>) -> Self {
        Self { warmup, timed }
    }

    /// Number of warmup rounds.
    #[must_use]
    pub const fn warmup(&self) -> usize {
        self.warmup
    }

    /// Number of timed rounds.
    #[must_use]
    pub const fn timed(&self) -> NonZero<usize> {
        self.timed
    }

    /// Number of rounds in total.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.warmup.saturating_add(self.timed.get())
    }
}

/// The duration of one benchmark round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunRecord {
    index: usize,
    duration_millis: u64,
}

impl RunRecord {
    pub(crate) fn new(index: usize, duration: Duration) -> Self {
        Self {
            index,
            duration_millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The 1-based position of the round in its series, counting warmup rounds.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The wall-clock duration of the round in whole milliseconds.
    #[must_use]
    pub fn duration_millis(&self) -> u64 {
        self.duration_millis
    }

    /// The wall-clock duration of the round in seconds, for display.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        millis_to_seconds(self.duration_millis)
    }
}

/// All rounds of one benchmark, warmup rounds first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSeries {
    records: Vec<RunRecord>,
    warmup: usize,
}

impl RunSeries {
    pub(crate) fn from_records(records: Vec<RunRecord>, warmup: usize) -> Self {
        Self { records, warmup }
    }

    #[cfg(test)]
    pub(crate) fn from_millis(millis: &[u64], warmup: usize) -> Self {
        Self::from_records(
            millis
                .iter()
                .zip(1..)
                .map(|(ms, index)| RunRecord::new(index, Duration::from_millis(*ms)))
                .collect(),
            warmup,
        )
    }

    /// Every round in order.
    #[must_use]
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// The warmup rounds.
    #[must_use]
    pub fn warmup(&self) -> &[RunRecord] {
        self.records.get(..self.warmup).unwrap_or(&[])
    }

    /// The timed rounds.
    #[must_use]
    pub fn timed(&self) -> &[RunRecord] {
        self.records.get(self.warmup..).unwrap_or(&[])
    }

    /// The fastest round, warmup rounds included.
    #[must_use]
    pub fn min_millis(&self) -> u64 {
        self.records
            .iter()
            .map(RunRecord::duration_millis)
            .min()
            .unwrap_or(0)
    }

    /// The sum of all timed rounds.
    #[must_use]
    pub fn timed_total_millis(&self) -> u64 {
        self.timed()
            .iter()
            .map(RunRecord::duration_millis)
            .fold(0, u64::saturating_add)
    }

    /// The mean of the timed rounds.
    #[must_use]
    pub fn timed_average_millis(&self) -> f64 {
        #[expect(
            clippy::cast_precision_loss,
            reason = "round counts and millisecond totals are far below 2^52"
        )]
        let (total, count) = (self.timed_total_millis() as f64, self.timed().len() as f64);

        if count == 0.0 { 0.0 } else { total / count }
    }
}

/// Runs the program under test repeatedly with the same arguments and records each duration.
///
/// Rounds run strictly one after another. Any failing round aborts the whole run.
///
/// # Example
///
/// ```
/// use new_zealand::nz;
/// use search_harness::{Arguments, BenchmarkRunner, Invoker, ProgramError, Rounds};
///
/// let program = |_: &[String]| -> Result<(), ProgramError> { Ok(()) };
/// let runner = BenchmarkRunner::new(Invoker::new());
///
/// let series = runner
///     .run(&program, &Arguments::default(), Rounds::new(1, nz!(3)))
///     .unwrap();
///
/// assert_eq!(series.records().len(), 4);
/// assert_eq!(series.timed().len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct BenchmarkRunner {
    invoker: Invoker,
}

impl BenchmarkRunner {
    /// Creates a runner that invokes the program with `invoker`.
    #[must_use]
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    /// Runs `rounds.total()` rounds of `program` with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first round that fails. No partial series is returned.
    pub fn run(
        &self,
        program: &dyn Program,
        arguments: &Arguments,
        rounds: Rounds,
    ) -> Result<RunSeries> {
        let mut records = Vec::with_capacity(rounds.total());

        for index in 1..=rounds.total() {
            let elapsed = self.invoker.invoke(program, arguments)?;
            let record = RunRecord::new(index, elapsed);

            tracing::debug!(
                round = index,
                warmup = index <= rounds.warmup(),
                millis = record.duration_millis(),
                "benchmark round finished"
            );

            records.push(record);
        }

        let series = RunSeries::from_records(records, rounds.warmup());

        tracing::info!(
            %arguments,
            rounds = rounds.total(),
            min_millis = series.min_millis(),
            average_millis = series.timed_average_millis(),
            "benchmark finished"
        );

        Ok(series)
    }

    /// Asks the allocator to hand free memory back to the operating system, so that one
    /// benchmark is not charged for the garbage of the previous one.
    ///
    /// The processor count and the memory in use before and after are logged where the platform
    /// can report them.
    pub fn release_free_memory(&self) {
        let platform = self.invoker.platform();

        let before = platform.memory_in_use();
        platform.release_free_memory();
        let after = platform.memory_in_use();

        let processors = thread::available_parallelism().map_or(1, NonZero::get);

        tracing::info!(
            processors,
            before_bytes = ?before,
            after_bytes = ?after,
            "released free memory"
        );
    }
}

pub(crate) fn millis_to_seconds(millis: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "durations in milliseconds are far below 2^52"
    )]
    let millis = millis as f64;

    millis / 1000.0
}
