// Platform abstraction layer.
//
// Everything that touches process-global operating system state goes through the `Platform`
// trait so the code driving it can be tested against a mock: the abstraction (trait), a facade
// (enum) that dispatches to the build target or a mock, and one implementation per platform.
//
// Output suppression is shared by every Unix (`unix`). Linux adds thread listing, priorities and
// memory statistics on top (`linux`). Everything else gets the no-op `fallback`.

mod abstractions;
pub(crate) use abstractions::*;

mod facade;
pub(crate) use facade::*;

#[cfg(all(unix, not(miri)))]
mod unix;
#[cfg(all(unix, not(target_os = "linux"), not(miri)))]
pub(crate) use unix::BuildTargetPlatform;

#[cfg(all(target_os = "linux", not(miri)))]
mod linux;
#[cfg(all(target_os = "linux", not(miri)))]
pub(crate) use linux::*;

// The fallback module is compiled in test mode on all platforms, under Miri, and as the primary
// implementation on non-Unix platforms. It is only glob-imported when it is the primary
// implementation; elsewhere in test mode it is reached via the explicit `fallback::` path.
#[cfg(any(test, miri, not(unix)))]
pub(crate) mod fallback;

#[cfg(any(miri, not(unix)))]
pub(crate) use fallback::*;
