use std::io;
use std::path::{Path, PathBuf};

/// Error raised while opening or enumerating a directory.
///
/// Every native failure is translated 1:1 and surfaced immediately; the only
/// native signal that is not an error is "no more entries", which
/// [`DirHandle::next`](crate::DirHandle::next) maps to `Ok(None)`. Each
/// variant carries the path being operated on and the underlying
/// [`io::Error`], so callers can recover the native error code via
/// [`DirError::raw_os_error`].
#[derive(Debug, thiserror::Error)]
pub enum DirError {
    /// The native open call for the directory failed.
    #[error("failed to open directory '{}': {source}", path.display())]
    Open {
        /// Directory that could not be opened.
        path: PathBuf,
        /// Underlying error emitted by the operating system.
        source: io::Error,
    },
    /// A batched enumeration call failed for a reason other than exhaustion.
    #[error("failed to enumerate directory '{}': {source}", path.display())]
    Enumerate {
        /// Directory being enumerated.
        path: PathBuf,
        /// Underlying error emitted by the operating system.
        source: io::Error,
    },
    /// A raw entry name could not be decoded into canonical UTF-8.
    #[error("failed to decode entry name in '{}': {source}", path.display())]
    DecodeName {
        /// Directory containing the malformed name.
        path: PathBuf,
        /// Description of the malformed byte or code-unit sequence.
        source: io::Error,
    },
}

impl DirError {
    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn enumerate(path: &Path, source: io::Error) -> Self {
        Self::Enumerate {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode_name(path: &Path, source: io::Error) -> Self {
        Self::DecodeName {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the filesystem path associated with the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. } | Self::Enumerate { path, .. } | Self::DecodeName { path, .. } => {
                path
            }
        }
    }

    /// Returns the underlying I/O error.
    #[must_use]
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::Open { source, .. }
            | Self::Enumerate { source, .. }
            | Self::DecodeName { source, .. } => source,
        }
    }

    /// Returns the native error code reported by the operating system, when
    /// the failure originated in a native call.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().raw_os_error()
    }
}
