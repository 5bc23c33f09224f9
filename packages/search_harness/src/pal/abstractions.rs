// Platform trait abstraction for mocking in tests.

use std::ffi::c_int;
use std::fmt::Debug;
use std::io;

/// Operating system threads report names truncated to this many bytes.
pub(crate) const TRUNCATED_NAME_LEN: usize = 15;

/// Abstraction over the process-global operating system facilities used by the harness.
///
/// This trait is automatically mocked by mockall in test builds, generating `MockPlatform`.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Points the process-wide standard output and standard error at the null device.
    ///
    /// Returns whatever is needed to undo the redirection with `restore_output()`. On failure,
    /// nothing has been changed.
    fn redirect_output_to_null(&self) -> io::Result<SavedOutput>;

    /// Undoes a previous `redirect_output_to_null()`.
    fn restore_output(&self, saved: SavedOutput);

    /// Lists the threads of the current process that the operating system knows about.
    ///
    /// May be empty if the platform offers no such listing.
    fn live_threads(&self) -> Vec<LiveThread>;

    /// Raises the scheduling priority of the calling thread as far as permitted.
    ///
    /// Returns whether the priority was changed.
    fn elevate_current_thread_priority(&self) -> bool;

    /// How many bytes of memory the process currently occupies, if the platform can tell.
    fn memory_in_use(&self) -> Option<u64>;

    /// Asks the allocator to return free memory to the operating system.
    fn release_free_memory(&self);
}

/// The original standard output and standard error, saved while they are redirected.
///
/// `None` means the stream was not redirected.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct SavedOutput {
    pub(crate) stdout: Option<c_int>,
    pub(crate) stderr: Option<c_int>,
}

/// One thread as seen by the operating system or the thread registry.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct LiveThread {
    /// Operating system thread ID, or a registry ID for registered threads.
    pub(crate) id: u64,

    /// The thread name. Unnamed threads get a name derived from their ID.
    pub(crate) name: String,
}
