//! Stat oracle: entry metadata without following symlinks
//!
//! The walker decides everything from one `fstatat` per side, taken with
//! `AT_SYMLINK_NOFOLLOW` (a symlink is an entry of its own, never its
//! target) and `AT_NO_AUTOMOUNT` (statting must not trigger automounts).

use crate::dirfd::{anchor, errno_to_io, DirFd};
use nix::fcntl::AtFlags;
use nix::sys::stat::fstatat;
use std::ffi::OsStr;
use std::io;

/// Metadata of one directory entry, as observed by the equality oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// File mode: type and permission bits
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
    /// Device containing the entry
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// Device number for device nodes, 0 otherwise
    pub rdev: u64,
}

impl FileMeta {
    /// Whether this entry is a regular file
    #[must_use]
    pub fn is_regular(&self) -> bool {
        (self.mode & libc::S_IFMT as u32) == libc::S_IFREG as u32
    }

    /// Whether this entry is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        (self.mode & libc::S_IFMT as u32) == libc::S_IFDIR as u32
    }

    /// Whether this entry is a symbolic link
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        (self.mode & libc::S_IFMT as u32) == libc::S_IFLNK as u32
    }

    /// Permission bits (low 12: rwx triples plus setuid/setgid/sticky)
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Whether two entries name the same underlying file
    #[must_use]
    pub fn same_inode(&self, other: &Self) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }
}

/// Stat an entry through an optional parent handle
///
/// A missing entry is an ordinary `Err` with `ENOENT`; the caller decides
/// whether absence matters.
pub fn stat_at(dir: Option<&DirFd>, name: &OsStr) -> io::Result<FileMeta> {
    let st = fstatat(
        anchor(dir),
        name,
        AtFlags::AT_SYMLINK_NOFOLLOW | AtFlags::AT_NO_AUTOMOUNT,
    )
    .map_err(errno_to_io)?;
    Ok(FileMeta {
        uid: st.st_uid,
        gid: st.st_gid,
        mode: st.st_mode as u32,
        size: st.st_size as u64,
        dev: st.st_dev as u64,
        ino: st.st_ino as u64,
        rdev: st.st_rdev as u64,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn stat_regular_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f"), "abc").unwrap();
        fs::set_permissions(tmp.path().join("f"), fs::Permissions::from_mode(0o640)).unwrap();
        let root = DirFd::open_root(tmp.path()).unwrap();
        let meta = stat_at(Some(&root), OsStr::new("f")).unwrap();
        assert!(meta.is_regular());
        assert!(!meta.is_dir());
        assert_eq!(meta.size, 3);
        assert_eq!(meta.permissions(), 0o640);
        assert_eq!(meta.rdev, 0);
    }

    #[test]
    fn stat_does_not_follow_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("target"), "abc").unwrap();
        std::os::unix::fs::symlink("target", tmp.path().join("lnk")).unwrap();
        let root = DirFd::open_root(tmp.path()).unwrap();
        let meta = stat_at(Some(&root), OsStr::new("lnk")).unwrap();
        assert!(meta.is_symlink());
        assert!(!meta.is_regular());
    }

    #[test]
    fn stat_missing_entry_is_enoent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = DirFd::open_root(tmp.path()).unwrap();
        let err = stat_at(Some(&root), OsStr::new("absent")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn same_inode_tracks_dev_and_ino() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a"), "x").unwrap();
        fs::hard_link(tmp.path().join("a"), tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("c"), "x").unwrap();
        let root = DirFd::open_root(tmp.path()).unwrap();
        let a = stat_at(Some(&root), OsStr::new("a")).unwrap();
        let b = stat_at(Some(&root), OsStr::new("b")).unwrap();
        let c = stat_at(Some(&root), OsStr::new("c")).unwrap();
        assert!(a.same_inode(&b));
        assert!(!a.same_inode(&c));
    }
}
