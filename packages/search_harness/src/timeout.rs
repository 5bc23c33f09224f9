use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::{Error, Result};

/// Budget for quick operations such as a single verified program run.
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for long operations such as a full comparison or thread-activity detection.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const TIMEOUT_THREAD_NAME: &str = "harness-timeout";

/// Runs `f` on a separate thread and waits at most `limit` for it to finish.
///
/// If the limit is exceeded, [`Error::Timeout`] is returned and the thread is abandoned. It keeps
/// running in the background and its result is discarded whenever it arrives. A panic in `f` is
/// propagated to the caller.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if `f` does not finish in time and [`Error::ThreadSpawn`] if the
/// thread cannot be started.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use search_harness::with_timeout;
///
/// let answer = with_timeout(Duration::from_secs(5), || 6 * 7).unwrap();
/// assert_eq!(answer, 42);
/// ```
pub fn with_timeout<F, R>(limit: Duration, f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name(TIMEOUT_THREAD_NAME.to_string())
        .spawn(move || {
            // If this fails, the caller has already given up on us.
            drop(tx.send(f()));
        })
        .map_err(|source| Error::ThreadSpawn { source })?;

    match rx.recv_timeout(limit) {
        Ok(result) => {
            // The result is only sent at the very end, so this returns promptly.
            drop(handle.join());
            Ok(result)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(?limit, "operation exceeded its time limit and was abandoned");
            Err(Error::Timeout { limit })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Ok(()) => Err(Error::ActionPanicked {
                message: "operation ended without producing a result".to_string(),
            }),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}
