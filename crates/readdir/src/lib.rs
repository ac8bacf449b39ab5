#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `readdir` is the leaf enumeration primitive used by a filesystem crawler:
//! it opens one directory and lazily produces that directory's immediate
//! entries, each enriched with whatever metadata the platform's batched
//! listing call returns for free. The point of the crate is to make the
//! expensive part of crawling, turning one directory into its entries, cost
//! one native call per batch instead of one (or two) per entry, while giving
//! every platform the same canonical entry shape.
//!
//! # Design
//!
//! - [`DirHandle`] owns exactly one native directory resource together with
//!   its enumeration buffer and cursor. It is created by [`DirHandle::open`],
//!   advanced only by [`DirHandle::next`], and released by `Drop` on every
//!   exit path.
//! - One platform variant is selected at compile time: Windows drains
//!   `FILE_FULL_DIR_INFO` batches, macOS drains `getattrlistbulk(2)` batches,
//!   and the remaining POSIX systems use getdents-backed iteration. All
//!   variants funnel native attributes through the same internal translation
//!   helpers, so the crawler never sees platform-specific bits.
//! - [`DirHandle::next`] lends the entry: the returned [`DirEntry`] borrows
//!   storage owned by the handle that the following call overwrites. The
//!   borrow checker enforces what would otherwise be a documented aliasing
//!   convention, and it is also why a handle cannot be driven from two
//!   threads at once.
//!
//! # Invariants
//!
//! - When [`DirEntry::metadata`] is present it was captured by the same
//!   native call that listed the entry; the iterator never issues a follow-up
//!   per-entry stat.
//! - The produced sequence is exactly the set of real entries: `.` and `..`
//!   are filtered out, nothing else is skipped, and a name that fails UTF-8
//!   or UTF-16 decoding is an error rather than a silent omission.
//! - The sequence is finite and non-restartable: after the first `Ok(None)`
//!   every further call returns `Ok(None)`; re-enumeration requires a fresh
//!   handle.
//!
//! # Errors
//!
//! Every native failure surfaces immediately as a [`DirError`] naming the
//! faulting step (open, enumerate, decode) and the path; nothing is retried
//! or swallowed. The platform's "no more entries" signal is the one
//! exception: it terminates the sequence as `Ok(None)` instead of failing.
//!
//! # Examples
//!
//! ```
//! use readdir::DirHandle;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = tempfile::tempdir()?;
//! std::fs::write(temp.path().join("a.txt"), b"data")?;
//! std::fs::create_dir(temp.path().join("sub"))?;
//!
//! let mut handle = DirHandle::open(temp.path(), true)?;
//! let mut names = Vec::new();
//! while let Some(entry) = handle.next()? {
//!     names.push(entry.name().to_string());
//! }
//! names.sort();
//! assert_eq!(names, ["a.txt", "sub"]);
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

pub(crate) mod attr;
mod entry;
mod error;
mod sys;

#[cfg(test)]
mod tests;

use std::path::Path;

pub use entry::{DirEntry, EntryMetadata, FileKind, TimeSpec};
pub use error::DirError;

/// Longest entry name the iterator will decode, in bytes of UTF-8.
pub(crate) const NAME_MAX: usize = 4096;

/// An open directory plus its enumeration state.
///
/// A handle is bound to exactly one native directory resource, opened once
/// and never reopened. Handles are independent: any number may be driven
/// concurrently from different threads, against the same directory or
/// different ones, but a single handle is single-owner and advances only
/// through `&mut self`.
///
/// # Strict opens
///
/// `strict` controls two constraints on the path itself: the open refuses to
/// follow a symbolic link or reparse point at `path`, and it requires `path`
/// to resolve to a directory. With `strict == false` both are relaxed, which
/// on most platforms defers the not-a-directory failure to the first
/// enumeration call.
pub struct DirHandle {
    inner: sys::SysHandle,
}

impl DirHandle {
    /// Opens `path` for enumeration.
    ///
    /// Also derives the device identifier reported through [`Self::device`]:
    /// from one `fstat` on the freshly opened descriptor where the platform
    /// has real device numbers, or synthesized from the volume designator on
    /// Windows, where directory records carry none.
    ///
    /// # Errors
    ///
    /// Returns [`DirError::Open`] carrying the native error code when the
    /// platform open call fails; no partial handle is produced.
    pub fn open<P: AsRef<Path>>(path: P, strict: bool) -> Result<Self, DirError> {
        sys::SysHandle::open(path.as_ref(), strict).map(|inner| Self { inner })
    }

    /// Produces the next entry, or `None` exactly when the directory is
    /// exhausted.
    ///
    /// The returned entry borrows storage owned by this handle and is
    /// overwritten by the following call; copy out whatever must outlive the
    /// iteration step. When the in-memory batch is drained the call issues
    /// one batched native refill before decoding.
    ///
    /// # Errors
    ///
    /// [`DirError::Enumerate`] when a refill fails for any reason other than
    /// exhaustion, and [`DirError::DecodeName`] when a raw name cannot be
    /// decoded into canonical UTF-8. Any error ends the sequence: further
    /// calls return `Ok(None)` and the handle is only good for release.
    pub fn next(&mut self) -> Result<Option<&DirEntry>, DirError> {
        self.inner.next()
    }

    /// Returns the path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Returns the device identifier derived at open time.
    #[must_use]
    pub fn device(&self) -> u64 {
        self.inner.device()
    }
}

impl std::fmt::Debug for DirHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirHandle")
            .field("path", &self.path())
            .field("device", &self.device())
            .finish_non_exhaustive()
    }
}
