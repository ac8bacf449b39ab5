use std::fs;
use std::path::Path;

use crate::{DirError, DirHandle, FileKind};

fn collect_names(path: &Path) -> Vec<String> {
    let mut handle = DirHandle::open(path, true).expect("open directory");
    let mut names = Vec::new();
    while let Some(entry) = handle.next().expect("next entry") {
        names.push(entry.name().to_string());
    }
    names.sort();
    names
}

#[test]
fn yields_exact_entry_set_then_none() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("a.txt"), b"0123456789").expect("write a.txt");
    fs::create_dir(temp.path().join("sub")).expect("create sub");
    fs::write(temp.path().join(".hidden"), b"").expect("write .hidden");

    let names = collect_names(temp.path());
    assert_eq!(names, [".hidden", "a.txt", "sub"]);
}

#[test]
fn dot_entries_are_filtered() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("only"), b"x").expect("write");

    let names = collect_names(temp.path());
    assert_eq!(names, ["only"]);
}

#[test]
fn empty_directory_yields_none_immediately() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut handle = DirHandle::open(temp.path(), true).expect("open");
    assert!(handle.next().expect("next").is_none());
}

#[test]
fn exhaustion_is_sticky() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("one"), b"x").expect("write");

    let mut handle = DirHandle::open(temp.path(), true).expect("open");
    assert!(handle.next().expect("first").is_some());
    assert!(handle.next().expect("end").is_none());
    // A drained handle never restarts, even when asked again.
    assert!(handle.next().expect("still end").is_none());
    assert!(handle.next().expect("still end").is_none());
}

#[test]
fn reopening_unmutated_directory_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    for name in ["x", "y", "z"] {
        fs::write(temp.path().join(name), b"data").expect("write");
    }

    let first = collect_names(temp.path());
    let second = collect_names(temp.path());
    assert_eq!(first, second);
    assert_eq!(first, ["x", "y", "z"]);
}

#[test]
fn multi_batch_directory_yields_each_entry_exactly_once() {
    // Enough entries that draining them takes several native batches; every
    // name must survive the batch boundaries without duplication or loss.
    let temp = tempfile::tempdir().expect("tempdir");
    let count = 3000;
    for index in 0..count {
        let name = format!("entry-{index:05}-padding-to-make-records-wider");
        fs::write(temp.path().join(name), b"").expect("write");
    }

    let names = collect_names(temp.path());
    assert_eq!(names.len(), count);
    for (index, name) in names.iter().enumerate() {
        assert_eq!(
            name,
            &format!("entry-{index:05}-padding-to-make-records-wider")
        );
    }
}

#[test]
fn kinds_classify_files_and_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("file"), b"data").expect("write");
    fs::create_dir(temp.path().join("dir")).expect("create dir");

    let mut handle = DirHandle::open(temp.path(), true).expect("open");
    let mut seen = Vec::new();
    while let Some(entry) = handle.next().expect("next") {
        seen.push((entry.name().to_string(), entry.kind()));
    }
    seen.sort();
    assert_eq!(
        seen,
        [
            ("dir".to_string(), FileKind::Directory),
            ("file".to_string(), FileKind::RegularFile),
        ]
    );
}

#[test]
fn opening_missing_path_fails_with_open_context() {
    let missing = Path::new("/definitely/not/a/real/directory");
    let error = match DirHandle::open(missing, true) {
        Ok(_) => panic!("missing path must not open"),
        Err(error) => error,
    };
    assert!(matches!(error, DirError::Open { .. }));
    assert_eq!(missing, error.path());
    assert!(error.to_string().contains("open directory"));
    assert!(error.raw_os_error().is_some());
}

#[test]
fn strict_open_of_regular_file_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = temp.path().join("plain.txt");
    fs::write(&file, b"not a directory").expect("write");

    let error = match DirHandle::open(&file, true) {
        Ok(_) => panic!("strict open of a file must fail"),
        Err(error) => error,
    };
    assert!(matches!(error, DirError::Open { .. }));
    assert_eq!(file, error.path());
}

#[test]
fn device_identifier_is_stable_across_handles() {
    let temp = tempfile::tempdir().expect("tempdir");
    let first = DirHandle::open(temp.path(), true).expect("open");
    let second = DirHandle::open(temp.path(), true).expect("open again");
    assert_eq!(first.device(), second.device());
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn symlink_entry_is_classified_symlink() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("target"), b"data").expect("write target");
        symlink(temp.path().join("target"), temp.path().join("link")).expect("symlink");

        let mut handle = DirHandle::open(temp.path(), true).expect("open");
        let mut kinds = Vec::new();
        while let Some(entry) = handle.next().expect("next") {
            kinds.push((entry.name().to_string(), entry.kind()));
        }
        kinds.sort();
        assert_eq!(
            kinds,
            [
                ("link".to_string(), FileKind::Symlink),
                ("target".to_string(), FileKind::RegularFile),
            ]
        );
    }

    // Filesystems on the other unix targets normalize or reject non-UTF-8
    // names at creation, so the fixture can only be produced on Linux.
    #[cfg(target_os = "linux")]
    #[test]
    fn undecodable_name_fails_and_latches_exhaustion() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let raw = OsStr::from_bytes(b"raw-\xff\xfe-name");
        fs::write(temp.path().join(raw), b"").expect("write raw name");

        let mut handle = DirHandle::open(temp.path(), true).expect("open");
        let error = loop {
            match handle.next() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("undecodable name must surface as an error"),
                Err(error) => break error,
            }
        };
        assert!(matches!(error, DirError::DecodeName { .. }));
        assert_eq!(temp.path(), error.path());

        // The failure ends the sequence; the handle is only good for release.
        assert!(handle.next().expect("after failure").is_none());
        assert!(handle.next().expect("still ended").is_none());
    }

    #[test]
    fn strict_open_does_not_follow_directory_symlink() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("real");
        fs::create_dir(&target).expect("create real");
        fs::write(target.join("inner"), b"data").expect("write inner");
        let link = temp.path().join("alias");
        symlink(&target, &link).expect("symlink");

        let error = match DirHandle::open(&link, true) {
            Ok(_) => panic!("strict open must not follow the link"),
            Err(error) => error,
        };
        assert!(matches!(error, DirError::Open { .. }));

        // Relaxed mode follows the link and enumerates the target.
        let names = {
            let mut handle = DirHandle::open(&link, false).expect("relaxed open");
            let mut names = Vec::new();
            while let Some(entry) = handle.next().expect("next") {
                names.push(entry.name().to_string());
            }
            names
        };
        assert_eq!(names, ["inner"]);
    }
}

// Permission bits and timestamps are only captured where the listing call
// returns them inline, so these assertions only apply on those platforms.
#[cfg(any(windows, target_os = "macos"))]
mod inline_metadata {
    use super::*;
    use crate::attr;

    #[test]
    fn metadata_is_captured_with_the_listing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.txt"), b"0123456789").expect("write");
        fs::create_dir(temp.path().join("sub")).expect("create dir");

        let mut handle = DirHandle::open(temp.path(), true).expect("open");
        while let Some(entry) = handle.next().expect("next") {
            let metadata = entry.metadata().expect("inline metadata");
            match entry.name() {
                "a.txt" => {
                    assert_eq!(10, metadata.size);
                    assert!(metadata.is_regular_format());
                    assert_eq!(
                        attr::READ_WRITE_ALL,
                        metadata.permissions() & attr::READ_WRITE_ALL
                    );
                }
                "sub" => {
                    assert_eq!(
                        attr::SEARCH_ALL,
                        metadata.permissions() & attr::SEARCH_ALL,
                        "directories carry the search bit for all classes"
                    );
                }
                other => panic!("unexpected entry {other}"),
            }
            assert!(metadata.modified.secs > 0);
        }
    }

    #[cfg(windows)]
    #[test]
    fn readonly_entry_excludes_write_for_all_classes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("frozen");
        fs::write(&file, b"").expect("write");
        let mut permissions = fs::metadata(&file).expect("stat").permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).expect("set readonly");

        let mut handle = DirHandle::open(temp.path(), true).expect("open");
        let entry = handle.next().expect("next").expect("one entry");
        let metadata = entry.metadata().expect("inline metadata");
        assert_eq!(attr::READ_ALL, metadata.permissions());
    }
}
