//! Shared attribute translation.
//!
//! Native attribute bits are not 1:1 with canonical permission semantics, so
//! every platform variant funnels through these helpers to produce the same
//! [`FileKind`] and mode encoding. The Windows attribute constants are
//! declared locally so the mapping stays a pure function that unit tests can
//! exercise on any host.

// Compiled on every platform even though only some variants call each helper,
// so the whole translation table stays testable on the build host.
#![allow(dead_code)]

use crate::entry::{FileKind, TimeSpec};

/// Mask selecting the file-type format bits of a canonical mode.
pub const FMT_MASK: u32 = 0o170000;
/// Format bits for a regular file.
pub const FMT_REGULAR: u32 = 0o100000;
/// Format bits for a directory.
pub const FMT_DIRECTORY: u32 = 0o040000;
/// Format bits for a symbolic link.
pub const FMT_SYMLINK: u32 = 0o120000;

/// Search (execute) permission for owner, group and other.
pub const SEARCH_ALL: u32 = 0o111;
/// Read permission for owner, group and other.
pub const READ_ALL: u32 = 0o444;
/// Read and write permission for owner, group and other.
pub const READ_WRITE_ALL: u32 = 0o666;

/// `FILE_ATTRIBUTE_READONLY`.
pub const WIN_ATTR_READONLY: u32 = 0x0000_0001;
/// `FILE_ATTRIBUTE_DIRECTORY`.
pub const WIN_ATTR_DIRECTORY: u32 = 0x0000_0010;
/// `FILE_ATTRIBUTE_REPARSE_POINT`.
pub const WIN_ATTR_REPARSE_POINT: u32 = 0x0000_0400;

/// Translates Windows file attributes into the canonical kind and mode.
///
/// A reparse point is classified [`FileKind::Symlink`] but its mode keeps the
/// regular-file format bits; the target is never resolved and no dedicated
/// symlink mode is reported yet. This reproduces the behavior the crawler was
/// built against and is asserted by tests as-is.
///
/// Directories gain the search bit for all three classes so canonical
/// permission checks treat them as traversable. The read-only attribute is
/// the only permission signal Windows reports per entry, so it widens to all
/// three classes.
#[must_use]
pub fn translate_win_attributes(attributes: u32) -> (FileKind, u32) {
    let (kind, mut mode) = if attributes & WIN_ATTR_REPARSE_POINT != 0 {
        (FileKind::Symlink, FMT_REGULAR)
    } else if attributes & WIN_ATTR_DIRECTORY != 0 {
        (FileKind::Directory, FMT_DIRECTORY | SEARCH_ALL)
    } else {
        (FileKind::RegularFile, FMT_REGULAR)
    };

    if attributes & WIN_ATTR_READONLY != 0 {
        mode |= READ_ALL;
    } else {
        mode |= READ_WRITE_ALL;
    }

    (kind, mode)
}

/// Classifies a canonical mode produced by a POSIX-style platform.
#[must_use]
pub fn kind_from_mode(mode: u32) -> FileKind {
    match mode & FMT_MASK {
        FMT_REGULAR => FileKind::RegularFile,
        FMT_DIRECTORY => FileKind::Directory,
        FMT_SYMLINK => FileKind::Symlink,
        _ => FileKind::Other,
    }
}

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch.
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;
/// FILETIME ticks per second (one tick is 100 ns).
const TICKS_PER_SEC: i64 = 10_000_000;
/// Nanoseconds per FILETIME tick.
const NANOS_PER_TICK: i64 = 100;

/// Converts a FILETIME value (100 ns ticks since 1601-01-01) to a Unix-epoch
/// [`TimeSpec`].
///
/// Timestamps before 1970 come out with negative seconds and a nanosecond
/// component still in `0..1_000_000_000`.
#[must_use]
pub fn filetime_to_timespec(ticks: i64) -> TimeSpec {
    let secs = ticks.div_euclid(TICKS_PER_SEC) - FILETIME_EPOCH_OFFSET_SECS;
    let nanos = ticks.rem_euclid(TICKS_PER_SEC) * NANOS_PER_TICK;
    TimeSpec {
        secs,
        nanos: nanos as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FILETIME value of 1970-01-01T00:00:00Z.
    const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

    #[test]
    fn directory_mode_includes_search_bits() {
        let (kind, mode) = translate_win_attributes(WIN_ATTR_DIRECTORY);
        assert_eq!(FileKind::Directory, kind);
        assert_eq!(FMT_DIRECTORY, mode & FMT_MASK);
        assert_eq!(SEARCH_ALL, mode & SEARCH_ALL);
        assert_eq!(READ_WRITE_ALL, mode & READ_WRITE_ALL);
    }

    #[test]
    fn readonly_excludes_write_for_all_classes() {
        let (kind, mode) = translate_win_attributes(WIN_ATTR_READONLY);
        assert_eq!(FileKind::RegularFile, kind);
        assert_eq!(FMT_REGULAR | READ_ALL, mode);
        assert_eq!(0, mode & 0o222);
    }

    #[test]
    fn writable_file_is_read_write_for_all_classes() {
        let (kind, mode) = translate_win_attributes(0);
        assert_eq!(FileKind::RegularFile, kind);
        assert_eq!(FMT_REGULAR | READ_WRITE_ALL, mode);
    }

    #[test]
    fn reparse_point_keeps_regular_file_mode() {
        // Current limitation: the kind says symlink, the mode does not.
        let (kind, mode) = translate_win_attributes(WIN_ATTR_REPARSE_POINT | WIN_ATTR_DIRECTORY);
        assert_eq!(FileKind::Symlink, kind);
        assert_eq!(FMT_REGULAR, mode & FMT_MASK);
    }

    #[test]
    fn readonly_reparse_point_is_read_only_regular() {
        let (kind, mode) = translate_win_attributes(WIN_ATTR_REPARSE_POINT | WIN_ATTR_READONLY);
        assert_eq!(FileKind::Symlink, kind);
        assert_eq!(FMT_REGULAR | READ_ALL, mode);
    }

    #[test]
    fn kind_from_mode_covers_known_formats() {
        assert_eq!(FileKind::RegularFile, kind_from_mode(FMT_REGULAR | 0o644));
        assert_eq!(FileKind::Directory, kind_from_mode(FMT_DIRECTORY | 0o755));
        assert_eq!(FileKind::Symlink, kind_from_mode(FMT_SYMLINK | 0o777));
        assert_eq!(FileKind::Other, kind_from_mode(0o010644));
    }

    #[test]
    fn filetime_unix_epoch_maps_to_zero() {
        assert_eq!(
            TimeSpec { secs: 0, nanos: 0 },
            filetime_to_timespec(UNIX_EPOCH_TICKS)
        );
    }

    #[test]
    fn filetime_sub_second_ticks_become_nanos() {
        assert_eq!(
            TimeSpec { secs: 0, nanos: 100 },
            filetime_to_timespec(UNIX_EPOCH_TICKS + 1)
        );
        assert_eq!(
            TimeSpec {
                secs: 1,
                nanos: 500_000_000
            },
            filetime_to_timespec(UNIX_EPOCH_TICKS + TICKS_PER_SEC + TICKS_PER_SEC / 2)
        );
    }

    #[test]
    fn filetime_origin_predates_unix_epoch() {
        assert_eq!(
            TimeSpec {
                secs: -11_644_473_600,
                nanos: 0
            },
            filetime_to_timespec(0)
        );
    }
}
