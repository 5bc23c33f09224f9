//! Explicit registry of live threads.
//!
//! The operating system thread listing is only available on some platforms and truncates thread
//! names. Threads that register here are visible to the thread-activity detector everywhere and
//! under their full name.
//!
//! # Example
//!
//! ```
//! use search_harness::registry;
//!
//! let worker = registry::spawn("index-worker-1", || 2 + 2).unwrap();
//!
//! assert_eq!(worker.join().unwrap(), 4);
//! ```

use std::collections::BTreeMap;
use std::io;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::pal::LiveThread;

// Registry IDs live far above any operating system thread ID so the two never collide.
const FIRST_REGISTRY_ID: u64 = 1 << 62;

static NEXT_ID: AtomicU64 = AtomicU64::new(FIRST_REGISTRY_ID);

static THREADS: Mutex<BTreeMap<u64, String>> = Mutex::new(BTreeMap::new());

fn threads() -> MutexGuard<'static, BTreeMap<u64, String>> {
    // The map is always left consistent, so a poisoned lock is still usable.
    THREADS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the current thread registered until dropped.
///
/// Must be dropped on the thread that created it.
#[derive(Debug)]
#[must_use = "the thread is only registered while the registration is alive"]
pub struct Registration {
    id: u64,

    // Bound to the registering thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        threads().remove(&self.id);
    }
}

/// Registers the current thread under `name` until the returned value is dropped.
///
/// A thread may register more than once, for example to describe nested phases of its work.
pub fn register_current(name: impl Into<String>) -> Registration {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

    threads().insert(id, name.into());

    Registration {
        id,
        _not_send: PhantomData,
    }
}

/// Spawns a thread that has `name` both as its operating system name and in the registry.
///
/// # Errors
///
/// Returns an error if the operating system refuses to create the thread.
pub fn spawn<F, T>(name: impl Into<String>, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();

    thread::Builder::new().name(name.clone()).spawn(move || {
        let _registration = register_current(name);
        f()
    })
}

/// The currently registered threads.
pub(crate) fn snapshot() -> Vec<LiveThread> {
    threads()
        .iter()
        .map(|(id, name)| LiveThread {
            id: *id,
            name: name.clone(),
        })
        .collect()
}
