//! Tolerant line-by-line comparison of text files.
//!
//! Two files are equivalent if they contain the same lines after trailing whitespace is removed
//! from every line, ignoring any blank lines at the very end of either file. Lines may end with
//! `\n`, `\r\n` or a lone `\r`.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::io_at;
use crate::{Error, Result};

/// The outcome of comparing two text files.
///
/// The raw [`value()`][Self::value] is a signed step counter. The comparison advances one step
/// per compared line pair plus one final step for the end-of-input check. A positive value means
/// the files are equivalent and says how many steps that took: two identical files of `n` lines
/// give `n + 1` and two empty files give `1`. A negative value is the negated 1-based line at
/// which the files were found to differ.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FileDiff {
    value: i64,
}

impl FileDiff {
    /// The raw signed step counter.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Whether the files are equivalent.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.value > 0
    }

    /// The 1-based line at which the files differ, if they do.
    #[must_use]
    pub fn mismatch_line(&self) -> Option<u64> {
        if self.is_match() {
            None
        } else {
            Some(self.value.unsigned_abs())
        }
    }

    /// The number of comparison steps taken to establish equivalence, if the files match.
    #[must_use]
    pub fn steps(&self) -> Option<u64> {
        if self.is_match() {
            Some(self.value.unsigned_abs())
        } else {
            None
        }
    }
}

/// Compares the files at `actual` and `expected`.
///
/// # Errors
///
/// Returns [`Error::Io`] naming the offending path if either file cannot be opened or read,
/// including when it is not valid UTF-8.
///
/// # Example
///
/// ```
/// use search_harness::compare_files;
///
/// let dir = tempfile::tempdir().unwrap();
/// let actual = dir.path().join("actual.txt");
/// let expected = dir.path().join("expected.txt");
/// std::fs::write(&actual, "apple  \nbanana\n\n\n").unwrap();
/// std::fs::write(&expected, "apple\nbanana\n").unwrap();
///
/// assert!(compare_files(&actual, &expected).unwrap().is_match());
/// ```
pub fn compare_files(actual: &Path, expected: &Path) -> Result<FileDiff> {
    let first = open_lines(actual)?;
    let second = open_lines(expected)?;

    compare_lines(
        first.map(|line| line.map_err(io_at(actual))),
        second.map(|line| line.map_err(io_at(expected))),
    )
}

/// Same as [`compare_files()`] but fails with [`Error::Mismatch`] if the files differ.
///
/// Returns the number of comparison steps on success.
///
/// # Errors
///
/// Returns [`Error::Mismatch`] if the files differ and [`Error::Io`] if either file cannot be
/// read.
pub fn ensure_files_match(actual: &Path, expected: &Path) -> Result<u64> {
    let diff = compare_files(actual, expected)?;

    match diff.mismatch_line() {
        None => Ok(diff.steps().unwrap_or_default()),
        Some(line) => Err(Error::Mismatch {
            actual: actual.to_path_buf(),
            expected: expected.to_path_buf(),
            line,
        }),
    }
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).map_err(io_at(path))?;
    Ok(Lines::new(BufReader::new(file)))
}

/// Like [`BufRead::lines()`] but also ends a line at a lone `\r`.
#[derive(Debug)]
struct Lines<R> {
    reader: R,

    // The previous line ended with `\r`, so a `\n` right after it belongs to that line.
    after_cr: bool,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            after_cr: false,
        }
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        let mut read_any = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            };

            if available.is_empty() {
                self.after_cr = false;
                return read_any.then(|| into_string(line));
            }

            if self.after_cr {
                self.after_cr = false;

                if available.first() == Some(&b'\n') {
                    self.reader.consume(1);
                    continue;
                }
            }

            read_any = true;

            let Some(end) = available.iter().position(|&b| b == b'\n' || b == b'\r') else {
                line.extend_from_slice(available);
                let used = available.len();
                self.reader.consume(used);
                continue;
            };

            let (content, terminator) = available.split_at(end);
            line.extend_from_slice(content);
            self.after_cr = terminator.first() == Some(&b'\r');
            self.reader.consume(end.saturating_add(1));

            return Some(into_string(line));
        }
    }
}

fn into_string(bytes: Vec<u8>) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Compares two line sources with the tolerant rules of [`compare_files()`].
pub(crate) fn compare_lines<A, B, E>(
    mut first: A,
    mut second: B,
) -> std::result::Result<FileDiff, E>
where
    A: Iterator<Item = std::result::Result<String, E>>,
    B: Iterator<Item = std::result::Result<String, E>>,
{
    let mut step: i64 = 0;

    loop {
        step = step.saturating_add(1);

        match (first.next().transpose()?, second.next().transpose()?) {
            (Some(a), Some(b)) => {
                if a.trim_end() != b.trim_end() {
                    return Ok(FileDiff {
                        value: step.saturating_neg(),
                    });
                }
            }
            (a, b) => {
                // At least one side has ended; only blank lines may remain on either side.
                let a_done = a.is_none_or(|line| is_blank(&line)) && skip_blank(&mut first)?;
                let b_done = b.is_none_or(|line| is_blank(&line)) && skip_blank(&mut second)?;

                let value = if a_done && b_done {
                    step
                } else {
                    step.saturating_neg()
                };
                return Ok(FileDiff { value });
            }
        }
    }
}

/// Consumes blank lines, returning whether the source is exhausted afterwards.
fn skip_blank<I, E>(lines: &mut I) -> std::result::Result<bool, E>
where
    I: Iterator<Item = std::result::Result<String, E>>,
{
    while let Some(line) = lines.next().transpose()? {
        if !is_blank(&line) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
