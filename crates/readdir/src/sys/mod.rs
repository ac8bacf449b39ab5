//! Per-platform enumeration variants.
//!
//! Exactly one variant is compiled in; all of them expose the same
//! `SysHandle` surface (`open`, `next`, `path`) and produce identical
//! canonical entries, so the facade in the crate root never branches on the
//! platform at run time.

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::SysHandle;

#[cfg(target_os = "macos")]
mod darwin;
#[cfg(target_os = "macos")]
pub(crate) use self::darwin::SysHandle;

#[cfg(all(unix, not(target_os = "macos")))]
mod posix;
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) use self::posix::SysHandle;
