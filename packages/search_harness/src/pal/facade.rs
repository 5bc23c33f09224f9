// Facade that dispatches to either the build target platform or a mock in tests.

use std::fmt::{self, Debug, Formatter};
use std::io;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BuildTargetPlatform, LiveThread, Platform, SavedOutput};

/// Facade over platform operations, dispatching to the real or mock implementation.
///
/// In production, this always uses `BuildTargetPlatform`. In tests, it can also wrap a
/// `MockPlatform` so callers can be tested without touching the real process state.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(_) => f.debug_struct("PlatformFacade::Target").finish(),
            #[cfg(test)]
            Self::Mock(_) => f.debug_struct("PlatformFacade::Mock").finish(),
        }
    }
}

static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl PlatformFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Platform for PlatformFacade {
    fn redirect_output_to_null(&self) -> io::Result<SavedOutput> {
        match self {
            Self::Target(p) => p.redirect_output_to_null(),
            #[cfg(test)]
            Self::Mock(mock) => mock.redirect_output_to_null(),
        }
    }

    fn restore_output(&self, saved: SavedOutput) {
        match self {
            Self::Target(p) => p.restore_output(saved),
            #[cfg(test)]
            Self::Mock(mock) => mock.restore_output(saved),
        }
    }

    fn live_threads(&self) -> Vec<LiveThread> {
        match self {
            Self::Target(p) => p.live_threads(),
            #[cfg(test)]
            Self::Mock(mock) => mock.live_threads(),
        }
    }

    fn elevate_current_thread_priority(&self) -> bool {
        match self {
            Self::Target(p) => p.elevate_current_thread_priority(),
            #[cfg(test)]
            Self::Mock(mock) => mock.elevate_current_thread_priority(),
        }
    }

    fn memory_in_use(&self) -> Option<u64> {
        match self {
            Self::Target(p) => p.memory_in_use(),
            #[cfg(test)]
            Self::Mock(mock) => mock.memory_in_use(),
        }
    }

    fn release_free_memory(&self) {
        match self {
            Self::Target(p) => p.release_free_memory(),
            #[cfg(test)]
            Self::Mock(mock) => mock.release_free_memory(),
        }
    }
}
