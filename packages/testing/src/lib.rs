#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the search harness.
//!
//! These stand in for the program under test: fixture files to compare, and workloads that
//! take a predictable amount of time or start a predictable set of threads.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Writes `contents` to `name` inside `dir`, returning the full path of the new file.
///
/// # Panics
///
/// Panics if the file cannot be written. Test fixtures have no sensible recovery path.
pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("test fixture file must be writable");
    path
}

/// Starts one thread per name, lets each of them sleep for `work`, then joins them all.
///
/// This is the smallest possible "multithreaded program": the threads are alive for a known
/// period and are gone by the time this function returns.
///
/// # Panics
///
/// Panics if a thread cannot be started or if any of them panicked.
pub fn run_named_workers(names: &[&str], work: Duration) {
    let handles = names
        .iter()
        .map(|name| {
            thread::Builder::new()
                .name((*name).to_string())
                .spawn(move || thread::sleep(work))
                .expect("test worker thread must start")
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().expect("test worker thread must not panic");
    }
}

/// The absolute difference of two timings, or zero if it is within `close_enough`.
///
/// Use as `assert!(f64_diff_abs(actual, expected, tolerance) <= 0.0)` to compare seconds and
/// speedups without tripping over float rounding.
#[must_use]
pub fn f64_diff_abs(a: f64, b: f64, close_enough: f64) -> f64 {
    let diff = (a - b).abs();

    if diff <= close_enough { 0.0 } else { diff }
}
