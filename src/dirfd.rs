//! Directory handles for `*at`-based traversal
//!
//! Every syscall in the replicator that needs a path goes through a
//! (parent handle, leaf name) pair; absolute paths are never rebuilt.
//! This keeps the walk correct under concurrent renames above the roots
//! and avoids TOCTOU races between stat and open. An absent parent
//! handle anchors the operation at the process working directory.

use nix::errno::Errno;
use nix::fcntl::OFlag;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Convert a nix errno into the crate's `io::Error` currency
pub(crate) fn errno_to_io(err: Errno) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

/// Resolve the `*at` anchor for an optional parent handle
///
/// `None` maps to the process working directory (`AT_FDCWD`).
pub(crate) fn anchor(dir: Option<&DirFd>) -> Option<RawFd> {
    dir.map(DirFd::as_raw_fd)
}

/// Raw `openat` with the anchor convention of [`anchor`]
fn openat_fd(dirfd: RawFd, name: &OsStr, oflag: OFlag, mode: u32) -> io::Result<OwnedFd> {
    let cname = CString::new(name.as_bytes())
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    // SAFETY: cname is NUL-terminated and live across the call; mode is
    // only read for O_CREAT.
    let fd = unsafe {
        libc::openat(
            dirfd,
            cname.as_ptr(),
            (oflag | OFlag::O_CLOEXEC).bits(),
            mode as libc::c_uint,
        )
    };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: openat returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// An owned, open directory descriptor
#[derive(Debug)]
pub struct DirFd {
    fd: OwnedFd,
}

impl DirFd {
    /// Open an absolute or CWD-relative path as a directory
    pub fn open_root(path: &Path) -> io::Result<Self> {
        let fd = openat_fd(
            libc::AT_FDCWD,
            path.as_os_str(),
            OFlag::O_RDONLY | OFlag::O_DIRECTORY,
            0,
        )?;
        Ok(Self { fd })
    }

    /// Open a child directory through this handle
    pub fn open_child(&self, name: &OsStr) -> io::Result<Self> {
        let fd = openat_fd(
            self.as_raw_fd(),
            name,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_NOFOLLOW,
            0,
        )?;
        Ok(Self { fd })
    }

    /// Raw descriptor for `*at` syscalls
    #[must_use]
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Open an entry stream over this directory
    ///
    /// The stream iterates a separately opened descriptor for the same
    /// directory, so this handle stays usable as a `*at` anchor while
    /// entries are being read.
    pub fn stream(&self) -> io::Result<DirStream> {
        let fd = openat_fd(
            self.as_raw_fd(),
            OsStr::new("."),
            OFlag::O_RDONLY | OFlag::O_DIRECTORY,
            0,
        )?;
        // SAFETY: fdopendir takes ownership of the descriptor on success;
        // into_raw_fd relinquishes ours first.
        let raw = std::os::fd::IntoRawFd::into_raw_fd(fd);
        let dirp = unsafe { libc::fdopendir(raw) };
        if dirp.is_null() {
            let err = io::Error::last_os_error();
            // fdopendir leaves the descriptor with us on failure
            // SAFETY: raw is the descriptor opened above, still ours.
            unsafe { libc::close(raw) };
            return Err(err);
        }
        Ok(DirStream { dirp })
    }
}

impl AsFd for DirFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Open a file relative to an optional directory handle
pub fn open_at(dir: Option<&DirFd>, name: &OsStr, oflag: OFlag, mode: u32) -> io::Result<File> {
    let dirfd = anchor(dir).unwrap_or(libc::AT_FDCWD);
    Ok(File::from(openat_fd(dirfd, name, oflag, mode)?))
}

/// Iterator over the entries of one directory, self/parent skipped
#[derive(Debug)]
pub struct DirStream {
    dirp: *mut libc::DIR,
}

impl DirStream {
    /// Next entry name, `Ok(None)` at end of stream
    ///
    /// A readdir error (anything but end-of-stream) is returned as `Err`;
    /// the walker treats it as fatal.
    pub fn next_entry(&mut self) -> io::Result<Option<OsString>> {
        loop {
            // readdir signals errors only through errno
            Errno::clear();
            // SAFETY: dirp is the live stream owned by self.
            let ent = unsafe { libc::readdir(self.dirp) };
            if ent.is_null() {
                let err = io::Error::last_os_error();
                return match err.raw_os_error() {
                    None | Some(0) => Ok(None),
                    Some(_) => Err(err),
                };
            }
            // SAFETY: readdir returned a valid dirent whose d_name is
            // NUL-terminated.
            let name = unsafe { CStr::from_ptr((*ent).d_name.as_ptr()) };
            let bytes = name.to_bytes();
            if bytes == b"." || bytes == b".." {
                continue;
            }
            return Ok(Some(OsStr::from_bytes(bytes).to_os_string()));
        }
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        // SAFETY: dirp is live and owned; closedir releases it and its fd.
        unsafe {
            libc::closedir(self.dirp);
        }
    }
}
