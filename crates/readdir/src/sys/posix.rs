//! POSIX variant.
//!
//! Opens the directory with `open(2)` and drains it through
//! [`rustix::fs::Dir`], whose internal buffer is filled one getdents-style
//! batch at a time where the kernel supports it. Directory records on this
//! family carry only the name and `d_type`, so entries are produced with
//! `metadata: None`; filling it in would take a follow-up stat, which the
//! contract forbids.

use std::io;
use std::path::{Path, PathBuf};

use rustix::fs::{Dir, FileType, Mode, OFlags};

use crate::entry::{DirEntry, FileKind};
use crate::error::DirError;

pub(crate) struct SysHandle {
    dir: Dir,
    path: PathBuf,
    exhausted: bool,
    entry: DirEntry,
    /// Captured from one fstat on the open descriptor, never per entry.
    dev: u64,
}

impl SysHandle {
    pub(crate) fn open(path: &Path, strict: bool) -> Result<Self, DirError> {
        let mut flags = OFlags::RDONLY | OFlags::CLOEXEC;
        if strict {
            flags |= OFlags::NOFOLLOW | OFlags::DIRECTORY;
        }

        let fd = rustix::fs::open(path, flags, Mode::empty())
            .map_err(|errno| DirError::open(path, io::Error::from(errno)))?;
        let stat = rustix::fs::fstat(&fd)
            .map_err(|errno| DirError::open(path, io::Error::from(errno)))?;
        let dir = Dir::new(fd).map_err(|errno| DirError::open(path, io::Error::from(errno)))?;

        tracing::trace!(path = %path.display(), strict, "opened directory handle");

        Ok(Self {
            dir,
            path: path.to_path_buf(),
            exhausted: false,
            entry: DirEntry::empty(),
            dev: stat.st_dev as u64,
        })
    }

    pub(crate) fn next(&mut self) -> Result<Option<&DirEntry>, DirError> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            let Some(raw) = self.dir.next() else {
                self.exhausted = true;
                return Ok(None);
            };
            let raw = match raw {
                Ok(raw) => raw,
                // A failed handle is only good for release; latch so the
                // sequence cannot resume past the fault.
                Err(errno) => {
                    self.exhausted = true;
                    return Err(DirError::enumerate(&self.path, io::Error::from(errno)));
                }
            };

            let bytes = raw.file_name().to_bytes();
            if bytes == b"." || bytes == b".." {
                continue;
            }
            if bytes.len() > crate::NAME_MAX {
                self.exhausted = true;
                return Err(DirError::decode_name(
                    &self.path,
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        "entry name exceeds the supported maximum length",
                    ),
                ));
            }
            let name = match std::str::from_utf8(bytes) {
                Ok(name) => name,
                Err(err) => {
                    self.exhausted = true;
                    return Err(DirError::decode_name(
                        &self.path,
                        io::Error::new(io::ErrorKind::InvalidData, err),
                    ));
                }
            };

            self.entry.name.clear();
            self.entry.name.push_str(name);
            self.entry.kind = match raw.file_type() {
                FileType::RegularFile => FileKind::RegularFile,
                FileType::Directory => FileKind::Directory,
                FileType::Symlink => FileKind::Symlink,
                _ => FileKind::Other,
            };
            self.entry.metadata = None;

            return Ok(Some(&self.entry));
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn device(&self) -> u64 {
        self.dev
    }
}
