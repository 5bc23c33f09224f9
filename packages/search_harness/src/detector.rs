use std::collections::BTreeSet;
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use oneshot::RecvTimeoutError;

use crate::pal::{LiveThread, Platform, PlatformFacade, TRUNCATED_NAME_LEN};
use crate::trace::panic_message;
use crate::{Error, Result, registry, with_timeout};

/// How often the live threads are sampled while the observed action runs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Threads whose names start with this prefix belong to the harness and never count as workers.
pub const HARNESS_THREAD_PREFIX: &str = "harness-";

const PROBE_THREAD_NAME: &str = "harness-probe";

/// Observes which threads come to life while an action runs.
///
/// The action runs on a dedicated probe thread. The live threads are sampled once before the
/// action starts and then repeatedly until it finishes; every thread seen in any sample during
/// the action but not before it is a worker of the action.
///
/// This is a sampling heuristic. Worker threads that start and stop between two samples are
/// missed, so an empty result is not proof that no threads were used. Threads started by
/// anything else in the process at the same time are wrongly attributed to the action.
///
/// On Linux, the operating system thread listing is used together with the
/// [thread registry][crate::registry]. Elsewhere, only registered threads are visible.
///
/// # Example
///
/// ```
/// use std::thread;
/// use std::time::Duration;
///
/// use search_harness::ThreadActivityDetector;
///
/// let activity = ThreadActivityDetector::new()
///     .detect(|| {
///         search_harness::registry::spawn("index-worker", || {
///             thread::sleep(Duration::from_millis(500));
///         })
///         .unwrap()
///         .join()
///         .unwrap();
///     })
///     .unwrap();
///
/// assert!(activity.workers().contains("index-worker"));
/// ```
#[derive(Clone, Debug)]
pub struct ThreadActivityDetector {
    platform: PlatformFacade,
    poll_interval: Duration,
    ignored_prefixes: Vec<String>,
}

impl ThreadActivityDetector {
    /// Creates a detector that samples every [`DEFAULT_POLL_INTERVAL`] and ignores harness
    /// threads.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::target())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            platform,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ignored_prefixes: vec![HARNESS_THREAD_PREFIX.to_string()],
        }
    }

    /// Samples the live threads every `interval` while the action runs.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Additionally ignores threads whose names start with `prefix`.
    #[must_use]
    pub fn ignore_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_prefixes.push(prefix.into());
        self
    }

    /// Runs `action` on a probe thread and reports the threads that appeared while it ran.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionPanicked`] if the action panics and [`Error::ThreadSpawn`] if the
    /// probe thread cannot be started. An empty worker set is not an error here; see
    /// [`ThreadActivity::ensure_workers()`].
    pub fn detect<F>(&self, action: F) -> Result<ThreadActivity>
    where
        F: FnOnce() + Send,
    {
        let (started_tx, started_rx) = oneshot::channel::<BTreeSet<LiveThread>>();
        let (finished_tx, finished_rx) = oneshot::channel::<()>();

        thread::scope(|scope| {
            let probe = thread::Builder::new()
                .name(PROBE_THREAD_NAME.to_string())
                .spawn_scoped(scope, move || {
                    if !self.platform.elevate_current_thread_priority() {
                        tracing::debug!("unable to raise the priority of the probe thread");
                    }

                    // If the receivers are gone, the coordinator has already given up.
                    drop(started_tx.send(self.snapshot()));
                    action();
                    drop(finished_tx.send(()));
                })
                .map_err(|source| Error::ThreadSpawn { source })?;

            let Ok(before) = started_rx.recv() else {
                return Err(probe_failure(probe));
            };

            let mut after = self.snapshot();
            let mut samples: usize = 1;

            loop {
                match finished_rx.recv_timeout(self.poll_interval) {
                    Ok(()) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        after.extend(self.snapshot());
                        samples = samples.saturating_add(1);
                    }
                    Err(RecvTimeoutError::Disconnected) => return Err(probe_failure(probe)),
                }
            }

            // The action has completed, so the probe only has to return.
            if let Err(payload) = probe.join() {
                return Err(Error::ActionPanicked {
                    message: panic_message(&*payload),
                });
            }

            let activity = ThreadActivity::from_samples(&before, &after, &self.ignored_prefixes);

            tracing::debug!(
                samples,
                workers = ?activity.workers,
                "thread activity detection finished"
            );

            Ok(activity)
        })
    }

    /// The live threads: the operating system listing merged with the thread registry.
    ///
    /// Operating system names that are merely the truncated form of a registered name are
    /// replaced by the registered name.
    fn snapshot(&self) -> BTreeSet<LiveThread> {
        let registered = registry::snapshot();

        let mut threads = self
            .platform
            .live_threads()
            .into_iter()
            .filter(|os| {
                !registered
                    .iter()
                    .any(|r| is_truncation_of(&os.name, &r.name))
            })
            .collect::<BTreeSet<_>>();

        threads.extend(registered);
        threads
    }
}

impl Default for ThreadActivityDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn is_truncation_of(short: &str, long: &str) -> bool {
    short.len() == TRUNCATED_NAME_LEN && long.len() > short.len() && long.starts_with(short)
}

fn probe_failure(probe: ScopedJoinHandle<'_, ()>) -> Error {
    let message = match probe.join() {
        Err(payload) => panic_message(&*payload),
        Ok(()) => "probe thread ended without reporting".to_string(),
    };

    Error::ActionPanicked { message }
}

/// The threads observed by [`ThreadActivityDetector::detect()`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadActivity {
    before: BTreeSet<String>,
    after: BTreeSet<String>,
    workers: BTreeSet<String>,
}

impl ThreadActivity {
    fn from_samples(
        before: &BTreeSet<LiveThread>,
        after: &BTreeSet<LiveThread>,
        ignored_prefixes: &[String],
    ) -> Self {
        // Threads are told apart by ID as well as name, so a new thread that reuses the name
        // of an old one (or inherits it, as unnamed threads do on Linux) still counts.
        let workers = after
            .difference(before)
            .map(|thread| thread.name.clone())
            .filter(|name| {
                !ignored_prefixes
                    .iter()
                    .any(|prefix| name.starts_with(prefix.as_str()))
            })
            .collect();

        let names = |threads: &BTreeSet<LiveThread>| {
            threads
                .iter()
                .map(|thread| thread.name.clone())
                .collect::<BTreeSet<_>>()
        };

        Self {
            before: names(before),
            after: names(after),
            workers,
        }
    }

    /// Names of the threads that were alive before the action started.
    #[must_use]
    pub fn before(&self) -> &BTreeSet<String> {
        &self.before
    }

    /// Names of the threads seen in any sample while the action ran.
    #[must_use]
    pub fn after(&self) -> &BTreeSet<String> {
        &self.after
    }

    /// Names of the threads that appeared while the action ran, harness threads excluded.
    #[must_use]
    pub fn workers(&self) -> &BTreeSet<String> {
        &self.workers
    }

    /// Whether any worker thread was observed.
    #[must_use]
    pub fn is_multithreaded(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Returns `self` if any worker thread was observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetectionInconclusive`] with every observed set if none was.
    pub fn ensure_workers(self) -> Result<Self> {
        if self.is_multithreaded() {
            return Ok(self);
        }

        Err(Error::DetectionInconclusive {
            before: self.before,
            after: self.after,
            workers: self.workers,
        })
    }
}

/// Runs `action` under thread-activity detection and checks that it used worker threads, giving
/// up after `limit`.
///
/// Returns the names of the worker threads.
///
/// # Errors
///
/// Returns [`Error::DetectionInconclusive`] if no worker was observed, [`Error::Timeout`] if the
/// action did not finish in time and [`Error::ActionPanicked`] if it panicked.
pub fn assert_multithreaded<F>(action: F, limit: Duration) -> Result<BTreeSet<String>>
where
    F: FnOnce() + Send + 'static,
{
    let activity = with_timeout(limit, move || ThreadActivityDetector::new().detect(action))??
        .ensure_workers()?;

    tracing::info!(workers = ?activity.workers(), "worker threads detected");

    Ok(activity.workers)
}
