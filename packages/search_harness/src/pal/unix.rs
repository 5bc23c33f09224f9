// Unix implementation: standard output and standard error are suppressed by pointing file
// descriptors 1 and 2 at `/dev/null`. Linux builds on these helpers in `linux.rs`; every other
// Unix uses the `BuildTargetPlatform` defined here.

use std::ffi::c_int;
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

#[cfg(not(target_os = "linux"))]
use crate::pal::{LiveThread, Platform};
use crate::pal::SavedOutput;

const NULL_DEVICE: &str = "/dev/null";

pub(crate) fn redirect_output_to_null() -> io::Result<SavedOutput> {
    let null = File::options().write(true).open(NULL_DEVICE)?;

    let stdout = duplicate(libc::STDOUT_FILENO)?;

    let stderr = match duplicate(libc::STDERR_FILENO) {
        Ok(fd) => fd,
        Err(e) => {
            close(stdout);
            return Err(e);
        }
    };

    let saved = SavedOutput {
        stdout: Some(stdout),
        stderr: Some(stderr),
    };

    if let Err(e) = replace(null.as_raw_fd(), libc::STDOUT_FILENO)
        .and_then(|()| replace(null.as_raw_fd(), libc::STDERR_FILENO))
    {
        restore_output(saved);
        return Err(e);
    }

    // Dropping `null` closes only our own descriptor; 1 and 2 keep pointing at it.
    Ok(saved)
}

pub(crate) fn restore_output(saved: SavedOutput) {
    for (original, target) in [
        (saved.stdout, libc::STDOUT_FILENO),
        (saved.stderr, libc::STDERR_FILENO),
    ] {
        let Some(original) = original else {
            continue;
        };

        if let Err(e) = replace(original, target) {
            // Nothing left to report it on but the log.
            tracing::error!(fd = target, error = %e, "unable to restore output stream");
        }

        close(original);
    }
}

fn duplicate(fd: c_int) -> io::Result<c_int> {
    // Child processes must not inherit the saved streams, or they would keep the real output
    // open after the harness has exited.
    // SAFETY: No safety requirements; an invalid descriptor is reported as an error.
    let copy = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };

    if copy < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(copy)
}

fn replace(source: c_int, target: c_int) -> io::Result<()> {
    // SAFETY: No safety requirements; `dup2` atomically closes and replaces `target`.
    let result = unsafe { libc::dup2(source, target) };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

fn close(fd: c_int) {
    // SAFETY: We only close descriptors we created ourselves in `duplicate()`.
    unsafe {
        libc::close(fd);
    }
}

/// Unix without a dedicated implementation: output suppression works, but there is no thread
/// listing, so thread detection relies on the thread registry.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

#[cfg(not(target_os = "linux"))]
impl Platform for BuildTargetPlatform {
    fn redirect_output_to_null(&self) -> io::Result<SavedOutput> {
        redirect_output_to_null()
    }

    fn restore_output(&self, saved: SavedOutput) {
        restore_output(saved);
    }

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

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fs;
    use std::os::fd::BorrowedFd;
    use std::os::unix::fs::MetadataExt;

    use serial_test::serial;

    use super::*;

    /// Device and inode of whatever standard output currently points at.
    fn stdout_identity() -> (u64, u64) {
        // SAFETY: Descriptor 1 stays open for the whole test; we only borrow it to clone it.
        let stdout = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
        let metadata = File::from(stdout.try_clone_to_owned().unwrap())
            .metadata()
            .unwrap();

        (metadata.dev(), metadata.ino())
    }

    fn null_identity() -> (u64, u64) {
        let metadata = fs::metadata(NULL_DEVICE).unwrap();

        (metadata.dev(), metadata.ino())
    }

    #[test]
    #[serial]
    fn redirect_points_stdout_at_null_and_restore_undoes_it() {
        let original = stdout_identity();

        let saved = redirect_output_to_null().unwrap();
        assert_eq!(stdout_identity(), null_identity());

        restore_output(saved);
        assert_eq!(stdout_identity(), original);
    }

    #[test]
    fn saved_streams_are_not_inherited_by_children() {
        let copy = duplicate(libc::STDOUT_FILENO).unwrap();
        // SAFETY: No safety requirements; `copy` is a descriptor we own.
        let flags = unsafe { libc::fcntl(copy, libc::F_GETFD) };
        close(copy);

        assert!(flags >= 0);
        assert_ne!(flags & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn restoring_nothing_is_harmless() {
        restore_output(SavedOutput::default());
    }
}
