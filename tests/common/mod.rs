//! Shared fixtures for the integration suite
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use snaplink::{FailMask, OpMode, Options};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Options for a copy-mode run with default gating
pub fn copy_options(source: &Path, destination: &Path, reference: &Path) -> Options {
    Options {
        mode: OpMode::Copy {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            reference: reference.to_path_buf(),
        },
        no_xattr: false,
        verbose: false,
        fail_mask: FailMask::default(),
    }
}

/// Options for a static-mode run with default gating
pub fn static_options(directory: &Path, reference: &Path) -> Options {
    Options {
        mode: OpMode::Static {
            directory: directory.to_path_buf(),
            reference: reference.to_path_buf(),
        },
        no_xattr: false,
        verbose: false,
        fail_mask: FailMask::default(),
    }
}

/// Inode number of a path
pub fn ino(path: &Path) -> u64 {
    fs::metadata(path).unwrap().ino()
}

/// Hard-link count of a path
pub fn nlink(path: &Path) -> u64 {
    fs::metadata(path).unwrap().nlink()
}

/// Permission bits of a path
pub fn mode_bits(path: &Path) -> u32 {
    fs::metadata(path).unwrap().mode() & 0o7777
}

/// Whether the filesystem under `dir` accepts user xattrs
///
/// CI filesystems vary; tests that need xattrs skip themselves when the
/// probe fails.
pub fn xattr_supported(dir: &Path) -> bool {
    let probe = dir.join(".xattr-probe");
    fs::write(&probe, "").unwrap();
    let ok = xattr::set(&probe, "user.snaplink.probe", b"1").is_ok();
    fs::remove_file(&probe).unwrap();
    ok
}
