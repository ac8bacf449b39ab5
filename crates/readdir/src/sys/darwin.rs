//! macOS variant.
//!
//! Uses `getattrlistbulk(2)`, which returns a batch of variable-length
//! records per call, each carrying the attributes requested at open time:
//! name, device, object type, timestamps, access mask and data length. That
//! makes full inline metadata available without any per-entry stat, the same
//! guarantee the Windows variant gets from its directory-information batch.
//! Unlike readdir, the call never reports `.` or `..`.
//!
//! Records are parsed out of the batch buffer through a bounds-checked
//! cursor: a leading `u32` length frames each record, then an
//! `attribute_set_t` states which of the requested attributes are actually
//! present, then the present attribute values follow in bitmap order, packed
//! on 4-byte boundaries.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use rustix::fs::{Mode, OFlags};

use crate::attr;
use crate::entry::{DirEntry, EntryMetadata, FileKind, TimeSpec};
use crate::error::DirError;

/// One batch worth of packed attribute records.
const DIR_BUF_SIZE: usize = 64 * 1024;

// Attribute bitmap constants from <sys/attr.h>; libc does not expose them.
const ATTR_BIT_MAP_COUNT: u16 = 5;
const ATTR_CMN_NAME: u32 = 0x0000_0001;
const ATTR_CMN_DEVID: u32 = 0x0000_0002;
const ATTR_CMN_OBJTYPE: u32 = 0x0000_0008;
const ATTR_CMN_CRTIME: u32 = 0x0000_0200;
const ATTR_CMN_MODTIME: u32 = 0x0000_0400;
const ATTR_CMN_ACCTIME: u32 = 0x0000_1000;
const ATTR_CMN_ACCESSMASK: u32 = 0x0002_0000;
const ATTR_CMN_RETURNED_ATTRS: u32 = 0x8000_0000;
const ATTR_FILE_DATALENGTH: u32 = 0x0000_0200;

// fsobj_type_t values from <sys/vnode.h>.
const VREG: u32 = 1;
const VDIR: u32 = 2;
const VLNK: u32 = 5;

/// `struct attrlist` request descriptor from <sys/attr.h>.
#[repr(C)]
struct AttrListReq {
    bitmapcount: u16,
    reserved: u16,
    commonattr: u32,
    volattr: u32,
    dirattr: u32,
    fileattr: u32,
    forkattr: u32,
}

/// `attribute_set_t`: which attributes a record actually carries.
#[derive(Clone, Copy)]
#[repr(C)]
struct AttributeSet {
    commonattr: u32,
    volattr: u32,
    dirattr: u32,
    fileattr: u32,
    forkattr: u32,
}

/// `attrreference_t`: out-of-line data such as the name, addressed relative
/// to the reference's own position.
#[repr(C)]
struct AttrReference {
    dataoffset: i32,
    length: u32,
}

pub(crate) struct SysHandle {
    fd: OwnedFd,
    path: PathBuf,
    buf: Box<[u8; DIR_BUF_SIZE]>,
    /// Byte offset of the next record in the current batch.
    pos: usize,
    /// Records left unparsed in the current batch.
    remaining: u32,
    exhausted: bool,
    entry: DirEntry,
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

        tracing::trace!(path = %path.display(), strict, "opened directory handle");

        Ok(Self {
            fd,
            path: path.to_path_buf(),
            buf: Box::new([0; DIR_BUF_SIZE]),
            pos: 0,
            remaining: 0,
            exhausted: false,
            entry: DirEntry::empty(),
            dev: stat.st_dev as u64,
        })
    }

    pub(crate) fn next(&mut self) -> Result<Option<&DirEntry>, DirError> {
        if self.exhausted {
            return Ok(None);
        }
        if self.remaining == 0 {
            match self.refill() {
                Ok(true) => {}
                Ok(false) => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Err(err);
                }
            }
        }
        // A failed handle is only good for release; latch so the sequence
        // cannot resume past the fault.
        if let Err(err) = self.decode_current() {
            self.exhausted = true;
            return Err(err);
        }
        Ok(Some(&self.entry))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn device(&self) -> u64 {
        self.dev
    }

    /// Issues one batched native call. A zero return means the directory is
    /// fully drained; that is sequence termination, not an error.
    fn refill(&mut self) -> Result<bool, DirError> {
        let mut request = AttrListReq {
            bitmapcount: ATTR_BIT_MAP_COUNT,
            reserved: 0,
            commonattr: ATTR_CMN_RETURNED_ATTRS
                | ATTR_CMN_NAME
                | ATTR_CMN_DEVID
                | ATTR_CMN_OBJTYPE
                | ATTR_CMN_CRTIME
                | ATTR_CMN_MODTIME
                | ATTR_CMN_ACCTIME
                | ATTR_CMN_ACCESSMASK,
            volattr: 0,
            dirattr: 0,
            fileattr: ATTR_FILE_DATALENGTH,
            forkattr: 0,
        };

        // SAFETY: the request struct matches the <sys/attr.h> layout and the
        // buffer is owned by the handle with its real size passed alongside.
        let count = unsafe {
            libc::getattrlistbulk(
                self.fd.as_raw_fd(),
                std::ptr::from_mut(&mut request).cast(),
                self.buf.as_mut_ptr().cast(),
                DIR_BUF_SIZE,
                0,
            )
        };
        if count < 0 {
            return Err(DirError::enumerate(&self.path, io::Error::last_os_error()));
        }
        if count == 0 {
            return Ok(false);
        }

        tracing::trace!(path = %self.path.display(), records = count, "refilled enumeration batch");
        self.pos = 0;
        self.remaining = count as u32;
        Ok(true)
    }

    /// Parses the record at the cursor into the reused entry storage and
    /// advances to the next record.
    fn decode_current(&mut self) -> Result<(), DirError> {
        let mut cursor = RecordCursor::new(&self.buf[..], self.pos);
        let record_len = cursor.read_u32().map_err(|err| self.bounds(err))?;
        let record_end = self.pos + record_len as usize;

        // The record length frames everything that follows; step over it
        // up front so a malformed record cannot be replayed.
        self.pos = record_end;
        self.remaining -= 1;

        let returned: AttributeSet = cursor.read().map_err(|err| self.bounds(err))?;

        let mut name: Option<(usize, usize)> = None;
        if returned.commonattr & ATTR_CMN_NAME != 0 {
            name = Some(cursor.read_attrref(record_end).map_err(|err| self.bounds(err))?);
        }

        let mut dev = self.dev;
        if returned.commonattr & ATTR_CMN_DEVID != 0 {
            dev = u64::from(cursor.read_u32().map_err(|err| self.bounds(err))?);
        }

        let mut kind = FileKind::Other;
        let mut fmt = 0;
        if returned.commonattr & ATTR_CMN_OBJTYPE != 0 {
            let objtype = cursor.read_u32().map_err(|err| self.bounds(err))?;
            (kind, fmt) = match objtype {
                VREG => (FileKind::RegularFile, attr::FMT_REGULAR),
                VDIR => (FileKind::Directory, attr::FMT_DIRECTORY),
                // Same limitation as the Windows variant: the kind says
                // symlink, the mode keeps the regular-file format.
                VLNK => (FileKind::Symlink, attr::FMT_REGULAR),
                _ => (FileKind::Other, 0),
            };
        }

        let mut created = TimeSpec::default();
        let mut modified = TimeSpec::default();
        let mut accessed = TimeSpec::default();
        if returned.commonattr & ATTR_CMN_CRTIME != 0 {
            created = cursor.read_timespec().map_err(|err| self.bounds(err))?;
        }
        if returned.commonattr & ATTR_CMN_MODTIME != 0 {
            modified = cursor.read_timespec().map_err(|err| self.bounds(err))?;
        }
        if returned.commonattr & ATTR_CMN_ACCTIME != 0 {
            accessed = cursor.read_timespec().map_err(|err| self.bounds(err))?;
        }

        let mut perms = 0;
        if returned.commonattr & ATTR_CMN_ACCESSMASK != 0 {
            perms = cursor.read_u32().map_err(|err| self.bounds(err))? & 0o7777;
        }

        let mut size = 0;
        if returned.fileattr & ATTR_FILE_DATALENGTH != 0 {
            size = cursor.read_u64().map_err(|err| self.bounds(err))?;
        }

        let (name_pos, name_len) = name.ok_or_else(|| {
            self.bounds(io::Error::new(
                io::ErrorKind::InvalidData,
                "record carries no name attribute",
            ))
        })?;
        if name_len > crate::NAME_MAX {
            return Err(DirError::decode_name(
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "entry name exceeds the supported maximum length",
                ),
            ));
        }
        let name = std::str::from_utf8(&self.buf[name_pos..name_pos + name_len]).map_err(|err| {
            DirError::decode_name(&self.path, io::Error::new(io::ErrorKind::InvalidData, err))
        })?;

        self.entry.name.clear();
        self.entry.name.push_str(name);
        self.entry.kind = kind;
        self.entry.metadata = Some(EntryMetadata {
            created,
            accessed,
            modified,
            size,
            mode: fmt | perms,
            dev,
        });
        Ok(())
    }

    fn bounds(&self, err: io::Error) -> DirError {
        DirError::enumerate(&self.path, err)
    }
}

/// Bounds-checked reader over one attribute record. All attribute values are
/// packed on 4-byte boundaries, so every read goes through unaligned copies.
struct RecordCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, len: usize) -> io::Result<usize> {
        let start = self.pos;
        let end = start.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                self.pos = end;
                Ok(start)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "attribute record out of bounds",
            )),
        }
    }

    fn read<T: Copy>(&mut self) -> io::Result<T> {
        let start = self.take(size_of::<T>())?;
        // SAFETY: `take` guarantees `size_of::<T>()` readable bytes at
        // `start`; the read is unaligned by construction.
        Ok(unsafe { self.data.as_ptr().add(start).cast::<T>().read_unaligned() })
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        self.read::<u32>()
    }

    fn read_u64(&mut self) -> io::Result<u64> {
        self.read::<u64>()
    }

    /// Reads an `attrreference_t` and resolves it to an absolute byte range,
    /// rejecting references that escape the record.
    fn read_attrref(&mut self, record_end: usize) -> io::Result<(usize, usize)> {
        let ref_pos = self.pos;
        let reference: AttrReference = self.read()?;
        let data_pos = ref_pos
            .checked_add_signed(reference.dataoffset as isize)
            .ok_or_else(bad_reference)?;
        // The reported length includes the trailing NUL.
        let data_len = (reference.length as usize)
            .checked_sub(1)
            .ok_or_else(bad_reference)?;
        if data_pos + data_len > record_end.min(self.data.len()) {
            return Err(bad_reference());
        }
        Ok((data_pos, data_len))
    }

    fn read_timespec(&mut self) -> io::Result<TimeSpec> {
        let secs = self.read::<i64>()?;
        let nanos = self.read::<i64>()?;
        Ok(TimeSpec {
            secs,
            nanos: nanos as u32,
        })
    }
}

fn bad_reference() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        "attribute reference out of bounds",
    )
}
