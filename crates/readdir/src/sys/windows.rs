//! Windows variant.
//!
//! Opens the directory object with `CreateFileW` and drains it with
//! `GetFileInformationByHandleEx(FileFullDirectoryInfo)`, which fills a
//! caller-supplied buffer with a packed batch of variable-length
//! `FILE_FULL_DIR_INFO` records. Each record carries timestamps, size and
//! attributes inline, so no per-entry stat is ever issued. The cursor walks
//! records by their self-declared `NextEntryOffset` until the zero marker,
//! then one more native call refills the batch.

use std::io;
use std::mem::offset_of;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::path::{Path, PathBuf};

use windows::Win32::Foundation::{ERROR_DIRECTORY, ERROR_NO_MORE_FILES, GENERIC_READ, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_BASIC_INFO, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT,
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, FileBasicInfo, FileFullDirectoryInfo,
    GetFileInformationByHandleEx, OPEN_EXISTING,
};
use windows::core::PCWSTR;

use crate::attr;
use crate::entry::{DirEntry, EntryMetadata};
use crate::error::DirError;

/// One batch worth of packed `FILE_FULL_DIR_INFO` records.
const DIR_BUF_SIZE: usize = 64 * 1024;

/// `FILE_FULL_DIR_INFO`, declared locally because only the fixed-length
/// header is read through this type; the trailing name is sliced out of the
/// batch buffer directly.
#[repr(C)]
struct FileFullDirInfo {
    next_entry_offset: u32,
    file_index: u32,
    creation_time: i64,
    last_access_time: i64,
    last_write_time: i64,
    change_time: i64,
    end_of_file: i64,
    allocation_size: i64,
    file_attributes: u32,
    file_name_length: u32,
    ea_size: u32,
    file_name: [u16; 1],
}

/// Offset of the inline UTF-16 name within a record.
const NAME_OFFSET: usize = offset_of!(FileFullDirInfo, file_name);

/// The enumeration API requires an 8-byte-aligned buffer.
#[repr(C, align(8))]
struct AlignedBuf([u8; DIR_BUF_SIZE]);

pub(crate) struct SysHandle {
    handle: OwnedHandle,
    path: PathBuf,
    buf: Box<AlignedBuf>,
    /// Byte offset of the next record in the current batch. `None` means the
    /// batch is drained and the next call must refill.
    cursor: Option<usize>,
    exhausted: bool,
    entry: DirEntry,
    dev: u64,
}

impl SysHandle {
    pub(crate) fn open(path: &Path, strict: bool) -> Result<Self, DirError> {
        let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        wide.push(0);

        // FILE_FLAG_OPEN_REPARSE_POINT is the O_NOFOLLOW equivalent and
        // FILE_FLAG_BACKUP_SEMANTICS is required to open a directory object.
        let mut flags = FILE_FLAG_BACKUP_SEMANTICS;
        if strict {
            flags |= FILE_FLAG_OPEN_REPARSE_POINT;
        }

        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let raw = unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                GENERIC_READ.0,
                FILE_SHARE_DELETE | FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                flags,
                None,
            )
        }
        .map_err(|err| DirError::open(path, io::Error::from(err)))?;

        // SAFETY: `raw` is a freshly opened handle we own; OwnedHandle closes
        // it on every exit path from here on, including the strict check
        // below failing.
        let handle = unsafe { OwnedHandle::from_raw_handle(raw.0) };

        if strict {
            // Backup semantics permit directories but do not require one, so
            // the must-be-directory half of strict needs an explicit check.
            let mut info = FILE_BASIC_INFO::default();
            // SAFETY: `info` is a properly sized out-parameter for this
            // information class.
            unsafe {
                GetFileInformationByHandleEx(
                    HANDLE(handle.as_raw_handle()),
                    FileBasicInfo,
                    std::ptr::from_mut(&mut info).cast(),
                    size_of::<FILE_BASIC_INFO>() as u32,
                )
            }
            .map_err(|err| DirError::open(path, io::Error::from(err)))?;
            if info.FileAttributes & attr::WIN_ATTR_DIRECTORY == 0 {
                return Err(DirError::open(
                    path,
                    io::Error::from_raw_os_error(ERROR_DIRECTORY.0 as i32),
                ));
            }
        }

        tracing::trace!(path = %path.display(), strict, "opened directory handle");

        Ok(Self {
            handle,
            dev: volume_dev(path),
            path: path.to_path_buf(),
            buf: Box::new(AlignedBuf([0; DIR_BUF_SIZE])),
            cursor: None,
            exhausted: false,
            entry: DirEntry::empty(),
        })
    }

    pub(crate) fn next(&mut self) -> Result<Option<&DirEntry>, DirError> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            let Some(offset) = self.cursor else {
                match self.refill() {
                    Ok(true) => continue,
                    Ok(false) => {
                        self.exhausted = true;
                        return Ok(None);
                    }
                    Err(err) => {
                        self.exhausted = true;
                        return Err(err);
                    }
                }
            };
            match self.decode_at(offset) {
                Ok(true) => return Ok(Some(&self.entry)),
                Ok(false) => {}
                // A failed handle is only good for release; latch so the
                // sequence cannot resume past the fault.
                Err(err) => {
                    self.exhausted = true;
                    return Err(err);
                }
            }
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn device(&self) -> u64 {
        self.dev
    }

    /// Issues one batched native call. Returns `false` on the "no more
    /// files" signal, which is sequence termination rather than an error.
    fn refill(&mut self) -> Result<bool, DirError> {
        // SAFETY: the buffer is owned by the handle, properly aligned, and
        // its real size is passed to the call.
        let result = unsafe {
            GetFileInformationByHandleEx(
                HANDLE(self.handle.as_raw_handle()),
                FileFullDirectoryInfo,
                self.buf.0.as_mut_ptr().cast(),
                DIR_BUF_SIZE as u32,
            )
        };
        match result {
            Ok(()) => {
                tracing::trace!(path = %self.path.display(), "refilled enumeration batch");
                self.cursor = Some(0);
                Ok(true)
            }
            Err(err) if err.code() == ERROR_NO_MORE_FILES.to_hresult() => Ok(false),
            Err(err) => Err(DirError::enumerate(&self.path, io::Error::from(err))),
        }
    }

    /// Decodes the record at `offset` into the reused entry storage and
    /// advances the cursor. Returns `false` for the `.` and `..` records,
    /// which are filtered out of the produced sequence.
    fn decode_at(&mut self, offset: usize) -> Result<bool, DirError> {
        if offset + size_of::<FileFullDirInfo>() > DIR_BUF_SIZE {
            return Err(DirError::enumerate(
                &self.path,
                io::Error::new(io::ErrorKind::InvalidData, "directory record out of bounds"),
            ));
        }

        // SAFETY: the header lies within the buffer per the check above;
        // read_unaligned places no alignment requirement on the source.
        let info = unsafe {
            self.buf
                .0
                .as_ptr()
                .add(offset)
                .cast::<FileFullDirInfo>()
                .read_unaligned()
        };

        let name_offset = offset + NAME_OFFSET;
        let name_len = info.file_name_length as usize;
        if name_len % 2 != 0 || name_offset + name_len > DIR_BUF_SIZE {
            return Err(DirError::enumerate(
                &self.path,
                io::Error::new(io::ErrorKind::InvalidData, "directory record out of bounds"),
            ));
        }

        // Advance before decoding so a decode failure cannot replay the
        // faulting record.
        self.cursor = if info.next_entry_offset == 0 {
            None
        } else {
            Some(offset + info.next_entry_offset as usize)
        };

        // SAFETY: bounds were checked above; records are 8-aligned within an
        // 8-aligned buffer and the name field sits at an even offset, which
        // satisfies u16 alignment.
        let wide = unsafe {
            std::slice::from_raw_parts(
                self.buf.0.as_ptr().add(name_offset).cast::<u16>(),
                name_len / 2,
            )
        };

        self.entry.name.clear();
        for unit in char::decode_utf16(wide.iter().copied()) {
            let ch = unit.map_err(|err| {
                DirError::decode_name(
                    &self.path,
                    io::Error::new(io::ErrorKind::InvalidData, err),
                )
            })?;
            self.entry.name.push(ch);
        }
        if self.entry.name.len() > crate::NAME_MAX {
            return Err(DirError::decode_name(
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "entry name exceeds the supported maximum length",
                ),
            ));
        }

        if self.entry.name == "." || self.entry.name == ".." {
            return Ok(false);
        }

        let (kind, mode) = attr::translate_win_attributes(info.file_attributes);
        self.entry.kind = kind;
        self.entry.metadata = Some(EntryMetadata {
            created: attr::filetime_to_timespec(info.creation_time),
            accessed: attr::filetime_to_timespec(info.last_access_time),
            modified: attr::filetime_to_timespec(info.last_write_time),
            size: info.end_of_file as u64,
            mode,
            dev: self.dev,
        });

        Ok(true)
    }
}

/// Synthesizes a device identifier from the volume designator so numeric
/// device comparisons stay meaningful even though directory records carry no
/// native device number.
fn volume_dev(path: &Path) -> u64 {
    let text = path.as_os_str().to_string_lossy();
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            u64::from(drive.to_ascii_lowercase() as u8 - b'a')
        }
        _ => 0,
    }
}
