use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::output_gate::OutputGate;
use crate::pal::PlatformFacade;
use crate::trace::panic_message;
use crate::{
    Arguments, CommandFailed, Error, HARNESS_THREAD_PREFIX, Program, Result, TraceFilter,
};

const THREADS_PANICKED: &str = "one or more threads panicked";

/// Runs the program under test once and measures how long it took.
///
/// While the program runs, process-wide standard output and standard error are suppressed so
/// that benchmark timings are not dominated by terminal output. Failures are never swallowed:
/// a returned error or a panic becomes [`Error::Invocation`] carrying the arguments and a trace
/// trimmed by the configured [`TraceFilter`].
///
/// A panic on any other thread while the program runs also fails the invocation, even if the
/// program itself returns normally. This catches worker threads that die without anyone joining
/// them. Panics are process-global, so a panic on an unrelated thread at the same time is
/// attributed to every invocation in flight. Threads named with [`HARNESS_THREAD_PREFIX`] are
/// never counted.
///
/// # Example
///
/// ```
/// use search_harness::{Arguments, Invoker, ProgramError};
///
/// let program = |_: &[String]| -> Result<(), ProgramError> { Ok(()) };
///
/// let elapsed = Invoker::new()
///     .invoke(&program, &Arguments::new(["-text", "input"]))
///     .unwrap();
///
/// println!("took {elapsed:?}");
/// ```
#[derive(Clone, Debug)]
pub struct Invoker {
    platform: PlatformFacade,
    trace_filter: TraceFilter,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum OutputMode {
    Suppressed,
    Visible,
}

impl Invoker {
    /// Creates an invoker with the default trace filter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::target())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            platform,
            trace_filter: TraceFilter::default(),
        }
    }

    /// Uses `filter` to trim failure traces.
    #[must_use]
    pub fn trace_filter(mut self, filter: TraceFilter) -> Self {
        self.trace_filter = filter;
        self
    }

    pub(crate) fn platform(&self) -> &PlatformFacade {
        &self.platform
    }

    /// Runs `program` with `arguments` while output is suppressed, returning the elapsed
    /// wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] if the program fails or panics and [`Error::Redirect`] if
    /// output cannot be suppressed.
    pub fn invoke(&self, program: &dyn Program, arguments: &Arguments) -> Result<Duration> {
        self.invoke_with(program, arguments, OutputMode::Suppressed)
    }

    /// Same as [`invoke()`][Self::invoke] but leaves the program's output visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] if the program fails or panics.
    pub fn invoke_visible(&self, program: &dyn Program, arguments: &Arguments) -> Result<Duration> {
        self.invoke_with(program, arguments, OutputMode::Visible)
    }

    fn invoke_with(
        &self,
        program: &dyn Program,
        arguments: &Arguments,
        mode: OutputMode,
    ) -> Result<Duration> {
        let gate = match mode {
            OutputMode::Suppressed => Some(
                OutputGate::close(&self.platform).map_err(|source| Error::Redirect { source })?,
            ),
            OutputMode::Visible => None,
        };

        let watch = PanicWatch::start();

        let outcome = catch_with_backtrace(|| {
            let start = Instant::now();
            let result = program.run(arguments.as_slice());
            (start.elapsed(), result)
        });

        let strays = watch.panics();
        drop(watch);

        // Output is back before any diagnostics are assembled.
        drop(gate);

        match outcome {
            Ok((elapsed, Ok(()))) if strays.is_empty() => Ok(elapsed),
            Ok((_, Ok(()))) => Err(Error::Invocation {
                arguments: arguments.clone(),
                message: THREADS_PANICKED.to_string(),
                trace: strays.join("\n"),
            }),
            Ok((_, Err(e))) => Err(Error::Invocation {
                arguments: arguments.clone(),
                message: e.to_string(),
                trace: self.failure_trace(&*e),
            }),
            Err(caught) => Err(Error::Invocation {
                arguments: arguments.clone(),
                message: format!("panicked: {}", caught.message),
                trace: self.trace_filter.filter(&caught.backtrace),
            }),
        }
    }

    /// The cause chain of a returned error, plus the filtered standard error of a failed
    /// external command.
    fn failure_trace(&self, error: &(dyn StdError + 'static)) -> String {
        let mut trace = String::new();
        let mut current = Some(error);

        while let Some(e) = current {
            if let Some(failed) = e.downcast_ref::<CommandFailed>() {
                let filtered = self.trace_filter.filter(failed.stderr());

                if !filtered.is_empty() {
                    let _ = writeln!(trace, "{filtered}");
                }
            }

            current = e.source();

            if let Some(source) = current {
                let _ = writeln!(trace, "Caused by: {source}");
            }
        }

        trace.trim_end().to_string()
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct CaughtPanic {
    message: String,
    backtrace: String,
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Panics on threads other than the invoking one, kept while any invocation is in flight.
#[derive(Debug)]
struct StrayPanics {
    in_flight: usize,

    // How many panics were discarded before the first one in `panics`.
    discarded: usize,
    panics: Vec<String>,
}

static STRAY_PANICS: Mutex<StrayPanics> = Mutex::new(StrayPanics {
    in_flight: 0,
    discarded: 0,
    panics: Vec::new(),
});

fn stray_panics() -> MutexGuard<'static, StrayPanics> {
    // Only plain data is mutated under the lock, so a poisoned lock carries no broken state.
    STRAY_PANICS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collects the panics on other threads that happen while it is alive.
#[derive(Debug)]
struct PanicWatch {
    mark: usize,
}

impl PanicWatch {
    fn start() -> Self {
        install_capturing_hook();

        let mut strays = stray_panics();
        strays.in_flight = strays.in_flight.saturating_add(1);

        Self {
            mark: strays.discarded.saturating_add(strays.panics.len()),
        }
    }

    /// The panics seen since `start()`, one line per panic.
    fn panics(&self) -> Vec<String> {
        let strays = stray_panics();

        strays
            .panics
            .iter()
            .skip(self.mark.saturating_sub(strays.discarded))
            .cloned()
            .collect()
    }
}

impl Drop for PanicWatch {
    fn drop(&mut self) {
        let mut strays = stray_panics();
        strays.in_flight = strays.in_flight.saturating_sub(1);

        if strays.in_flight == 0 {
            strays.discarded = strays.discarded.saturating_add(strays.panics.len());
            strays.panics.clear();
        }
    }
}

fn record_stray_panic(info: &PanicHookInfo<'_>) {
    let current = thread::current();
    let name = current.name().unwrap_or("<unnamed>");

    if name.starts_with(HARNESS_THREAD_PREFIX) {
        return;
    }

    let mut strays = stray_panics();

    if strays.in_flight > 0 {
        let message = panic_message(info.payload());
        strays
            .panics
            .push(format!("thread '{name}' panicked: {message}"));
    }
}

/// Installs, once per process, a panic hook that records a backtrace for panics on threads that
/// are inside `catch_with_backtrace()`. Every other panic is recorded for any invocation in
/// flight and forwarded to the previous hook.
fn install_capturing_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            if CAPTURING.get() {
                CAPTURED.with_borrow_mut(|captured| {
                    // The first panic is the interesting one.
                    if captured.is_none() {
                        *captured = Some(Backtrace::force_capture().to_string());
                    }
                });
            } else {
                record_stray_panic(info);
                previous(info);
            }
        }));
    });
}

fn catch_with_backtrace<R>(f: impl FnOnce() -> R) -> std::result::Result<R, CaughtPanic> {
    install_capturing_hook();

    CAPTURED.take();
    CAPTURING.set(true);
    let _capturing = scopeguard::guard((), |()| CAPTURING.set(false));

    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| CaughtPanic {
        message: panic_message(&*payload),
        backtrace: CAPTURED.take().unwrap_or_default(),
    })
}
