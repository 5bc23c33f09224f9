// Linux implementation: the shared Unix descriptor handling for output suppression, `/proc` for
// the thread listing and memory usage, `setpriority` for the probe thread and glibc
// `malloc_trim` for memory release.

use std::ffi::c_int;
use std::fs;
use std::io;

use crate::pal::{LiveThread, Platform, SavedOutput, unix};

const TASK_DIR: &str = "/proc/self/task";
const STATM: &str = "/proc/self/statm";

/// Niceness of the most favorable scheduling priority.
const HIGHEST_PRIORITY: c_int = -20;

#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn redirect_output_to_null(&self) -> io::Result<SavedOutput> {
        unix::redirect_output_to_null()
    }

    fn restore_output(&self, saved: SavedOutput) {
        unix::restore_output(saved);
    }

    fn live_threads(&self) -> Vec<LiveThread> {
        let entries = match fs::read_dir(TASK_DIR) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "unable to list threads in {TASK_DIR}");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| {
                // Threads may exit while we are listing them, so any entry can vanish.
                let entry = entry.ok()?;
                let id = entry.file_name().to_str()?.parse::<u64>().ok()?;
                let comm = fs::read_to_string(entry.path().join("comm")).ok()?;

                let name = comm.trim_end_matches('\n');
                let name = if name.is_empty() {
                    format!("thread-{id}")
                } else {
                    name.to_string()
                };

                Some(LiveThread { id, name })
            })
            .collect()
    }

    #[cfg_attr(test, mutants::skip)] // Outcome depends on process privileges.
    fn elevate_current_thread_priority(&self) -> bool {
        // SAFETY: No safety requirements.
        let tid = unsafe { libc::gettid() };

        let Ok(tid) = libc::id_t::try_from(tid) else {
            return false;
        };

        // SAFETY: No safety requirements; an invalid thread ID or insufficient privileges are
        // reported through the return value.
        let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, HIGHEST_PRIORITY) };

        result == 0
    }

    fn memory_in_use(&self) -> Option<u64> {
        // The second field is the resident set size in pages.
        let statm = fs::read_to_string(STATM).ok()?;
        let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;

        // SAFETY: No safety requirements.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

        pages.checked_mul(u64::try_from(page_size).ok()?)
    }

    #[cfg_attr(test, mutants::skip)] // No observable outcome to test.
    fn release_free_memory(&self) {
        #[cfg(target_env = "gnu")]
        {
            // SAFETY: No safety requirements; the return value only says whether anything was
            // released.
            unsafe {
                libc::malloc_trim(0);
            }
        }
    }
}
