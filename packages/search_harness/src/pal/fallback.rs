// Fallback implementation for platforms without file descriptors to redirect. Output cannot be
// suppressed and the operating system offers no thread listing, so thread detection relies
// entirely on the thread registry.

use std::io;

use crate::pal::{LiveThread, Platform, SavedOutput};

#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn redirect_output_to_null(&self) -> io::Result<SavedOutput> {
        Ok(SavedOutput::default())
    }

    fn restore_output(&self, _saved: SavedOutput) {}

    fn live_threads(&self) -> Vec<LiveThread> {
        Vec::new()
    }

    fn elevate_current_thread_priority(&self) -> bool {
        false
    }

    fn memory_in_use(&self) -> Option<u64> {
        None
    }

    fn release_free_memory(&self) {}
}
