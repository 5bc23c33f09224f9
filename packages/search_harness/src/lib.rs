#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A harness for benchmarking and verifying search index driver programs.
//!
//! The program under test is anything implementing [`Program`]: an in-process closure or an
//! external executable wrapped in [`CommandProgram`]. The harness offers four kinds of checks:
//!
//! * [`Comparator`] runs two argument configurations of the same program for a number of warmup
//!   and timed rounds each, prints a Markdown report and saves it as an artifact. The resulting
//!   [`Comparison`] knows its speedup and can insist on a minimum.
//! * [`ThreadActivityDetector`] reports which threads appeared while an action was running, to
//!   check that a supposedly multithreaded configuration really starts worker threads.
//! * [`compare_files()`] compares produced output against expected output, tolerating trailing
//!   whitespace and trailing blank lines. [`check_output()`] applies it to every file a run
//!   produces.
//! * [`assert_no_failures()`] runs a program once under a timeout and turns any failure into a
//!   diagnostic that names the arguments and a filtered trace.
//!
//! # Example
//!
//! ```no_run
//! use search_harness::{
//!     Arguments, BenchSettings, CommandProgram, Comparator, Configuration, MIN_SPEEDUP,
//! };
//!
//! let settings = BenchSettings::from_env();
//! settings.prepare_artifact_dir().unwrap();
//!
//! let program = CommandProgram::new("target/release/indexer");
//! let comparator = Comparator::from_settings(&settings);
//!
//! let comparison = comparator
//!     .compare(
//!         &program,
//!         "Index",
//!         &Configuration::new("Single", Arguments::split_whitespace("-docs data -single")),
//!         &Configuration::new("Multi", Arguments::split_whitespace("-docs data -threads 4")),
//!     )
//!     .unwrap();
//!
//! comparison.ensure_speedup(MIN_SPEEDUP).unwrap();
//! ```

mod arguments;
mod comparison;
mod detector;
mod diff;
mod error;
mod invoker;
mod output_gate;
mod pal;
mod program;
pub mod registry;
mod report;
mod runner;
mod settings;
mod timeout;
mod trace;
mod verdict;
mod verify;

pub use arguments::*;
pub use comparison::*;
pub use detector::*;
pub use diff::{FileDiff, compare_files, ensure_files_match};
pub use error::Error;
pub(crate) use error::Result;
pub use invoker::*;
pub use program::*;
pub use runner::{BenchmarkRunner, Rounds, RunRecord, RunSeries};
pub use settings::*;
pub use timeout::*;
pub use trace::TraceFilter;
pub use verdict::*;
pub use verify::*;
