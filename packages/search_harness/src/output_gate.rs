use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::pal::{Platform, PlatformFacade, SavedOutput};

// Standard output and standard error are process-global, so at most one gate may be closed at a
// time.
static GATE: Mutex<()> = Mutex::new(());

/// Suppresses process-wide standard output and standard error while alive.
///
/// The original streams are restored when the gate is dropped, whether the guarded code returned
/// normally or unwound.
#[derive(Debug)]
pub(crate) struct OutputGate<'p> {
    platform: &'p PlatformFacade,
    saved: Option<SavedOutput>,

    // Released only after the streams have been restored in `drop()`.
    _exclusive: MutexGuard<'static, ()>,
}

impl<'p> OutputGate<'p> {
    /// Waits for any other gate to open, then suppresses output.
    pub(crate) fn close(platform: &'p PlatformFacade) -> io::Result<Self> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        let exclusive = GATE.lock().unwrap_or_else(PoisonError::into_inner);

        flush_std_streams();

        let saved = platform.redirect_output_to_null()?;

        Ok(Self {
            platform,
            saved: Some(saved),
            _exclusive: exclusive,
        })
    }
}

impl Drop for OutputGate<'_> {
    fn drop(&mut self) {
        // Anything still buffered was written while suppressed and belongs in the null device.
        flush_std_streams();

        if let Some(saved) = self.saved.take() {
            self.platform.restore_output(saved);
        }
    }
}

fn flush_std_streams() {
    drop(io::stdout().flush());
    drop(io::stderr().flush());
}
