//! Trimming of failure traces down to the frames of the program under test.

use std::any::Any;

/// Frames from these crates and runtime glue are noise when diagnosing the program under test.
const DEFAULT_EXCLUDES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "search_harness::",
    "backtrace::",
    "test::",
    "__rust",
    "rust_begin_unwind",
    "rust_panic",
    "__libc",
    "_start",
    "start_thread",
    "clone",
    "__clone",
];

/// How many lines of an unstructured trace are kept.
const UNSTRUCTURED_TAIL_LINES: usize = 20;

/// Selects the frames of a failure trace that belong to the program under test.
///
/// A frame is kept if its symbol starts with one of the include prefixes (or no include prefixes
/// are configured) and with none of the exclude prefixes. If no frame survives, the first frame is
/// kept so the trace never becomes empty.
///
/// # Example
///
/// ```
/// use search_harness::TraceFilter;
///
/// let trace = "   0: std::panicking::begin_panic\n   1: driver::index::build\n             at src/index.rs:10:5\n";
///
/// let filtered = TraceFilter::default().filter(trace);
///
/// assert!(filtered.contains("driver::index::build"));
/// assert!(filtered.contains("src/index.rs"));
/// assert!(!filtered.contains("std::panicking"));
/// ```
#[derive(Clone, Debug)]
pub struct TraceFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TraceFilter {
    /// Creates a filter with no include prefixes and no exclude prefixes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Only keeps frames whose symbol starts with `prefix` (or another include prefix).
    #[must_use]
    pub fn include(mut self, prefix: impl Into<String>) -> Self {
        self.include.push(prefix.into());
        self
    }

    /// Drops frames whose symbol starts with `prefix`.
    #[must_use]
    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.exclude.push(prefix.into());
        self
    }

    /// Trims `trace` down to the interesting frames, keeping their source locations.
    ///
    /// Text that does not look like a numbered frame listing is reduced to its last few lines.
    #[must_use]
    pub fn filter(&self, trace: &str) -> String {
        let frames = parse_frames(trace);

        if frames.is_empty() {
            let lines = trace.lines().collect::<Vec<_>>();
            let skip = lines.len().saturating_sub(UNSTRUCTURED_TAIL_LINES);

            return lines
                .into_iter()
                .skip(skip)
                .collect::<Vec<_>>()
                .join("\n");
        }

        let kept = frames
            .iter()
            .filter(|frame| self.keeps(frame.symbol))
            .collect::<Vec<_>>();

        let kept = if kept.is_empty() {
            frames.iter().take(1).collect()
        } else {
            kept
        };

        kept.iter()
            .flat_map(|frame| frame.lines.iter().copied())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn keeps(&self, symbol: &str) -> bool {
        // Trait method symbols look like `<driver::Index as Trait>::method`.
        let symbol = symbol.trim_start_matches('<');

        let included = self.include.is_empty()
            || self
                .include
                .iter()
                .any(|prefix| symbol.starts_with(prefix.as_str()));

        included
            && !self
                .exclude
                .iter()
                .any(|prefix| symbol.starts_with(prefix.as_str()))
    }
}

impl Default for TraceFilter {
    fn default() -> Self {
        DEFAULT_EXCLUDES
            .iter()
            .fold(Self::empty(), |filter, prefix| filter.exclude(*prefix))
    }
}

#[derive(Debug)]
struct Frame<'a> {
    symbol: &'a str,
    lines: Vec<&'a str>,
}

/// Parses frames in the `N: symbol` + `at location` layout used by Rust backtraces.
fn parse_frames(trace: &str) -> Vec<Frame<'_>> {
    let mut frames: Vec<Frame<'_>> = Vec::new();

    for line in trace.lines() {
        if let Some(symbol) = frame_symbol(line) {
            frames.push(Frame {
                symbol,
                lines: vec![line],
            });
        } else if line.trim_start().starts_with("at ") {
            if let Some(frame) = frames.last_mut() {
                frame.lines.push(line);
            }
        }
    }

    frames
}

fn frame_symbol(line: &str) -> Option<&str> {
    let (number, symbol) = line.trim_start().split_once(": ")?;

    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(symbol.trim())
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
