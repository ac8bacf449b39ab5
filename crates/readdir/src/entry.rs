use crate::attr;

/// Canonical classification of a directory entry, independent of which
/// platform variant produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    /// A regular file.
    RegularFile,
    /// A directory.
    Directory,
    /// A symbolic link or reparse point. The link target is not resolved.
    Symlink,
    /// Anything else (sockets, fifos, devices, unknown).
    Other,
}

/// A timestamp split into whole seconds and nanoseconds since the Unix epoch.
///
/// Seconds may be negative for timestamps that predate the epoch, which real
/// filesystems do produce (the FILETIME epoch starts in 1601).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSpec {
    /// Whole seconds since 1970-01-01T00:00:00Z.
    pub secs: i64,
    /// Sub-second component, always in `0..1_000_000_000`.
    pub nanos: u32,
}

/// Metadata captured inline by the native enumeration call.
///
/// Present on an entry only when the platform returned it together with the
/// listing itself; the iterator never issues a follow-up per-entry stat to
/// fill this in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryMetadata {
    /// Creation time.
    pub created: TimeSpec,
    /// Last access time.
    pub accessed: TimeSpec,
    /// Last modification time.
    pub modified: TimeSpec,
    /// Size in bytes.
    pub size: u64,
    /// File type and permission bits in canonical POSIX-style encoding.
    pub mode: u32,
    /// Device identifier of the containing volume.
    pub dev: u64,
}

impl EntryMetadata {
    /// Returns the permission bits without the file-type format bits.
    pub const fn permissions(&self) -> u32 {
        self.mode & !attr::FMT_MASK
    }

    /// Reports whether the mode carries the regular-file format bits.
    pub const fn is_regular_format(&self) -> bool {
        self.mode & attr::FMT_MASK == attr::FMT_REGULAR
    }
}

/// One directory entry produced by [`DirHandle::next`](crate::DirHandle::next).
///
/// The handle owns this storage and reuses it for every entry, so the borrow
/// returned by `next` is only valid until the following call.
#[derive(Debug)]
pub struct DirEntry {
    pub(crate) name: String,
    pub(crate) kind: FileKind,
    pub(crate) metadata: Option<EntryMetadata>,
}

impl DirEntry {
    pub(crate) fn empty() -> Self {
        Self {
            name: String::with_capacity(crate::NAME_MAX),
            kind: FileKind::Other,
            metadata: None,
        }
    }

    /// Returns the entry's base name as canonical UTF-8.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the canonical type classification for the entry.
    pub const fn kind(&self) -> FileKind {
        self.kind
    }

    /// Returns the metadata captured by the listing call, when the platform
    /// provides it for free.
    pub const fn metadata(&self) -> Option<&EntryMetadata> {
        self.metadata.as_ref()
    }
}
