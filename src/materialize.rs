//! Materialization primitives: everything that creates entries at the
//! destination or transfers metadata onto them
//!
//! Each primitive reports its own failures through the sink and returns a
//! sentinel (`false` / 0 bytes) when the failure class is gated as a
//! warning, so the walker can move on to the next entry. Structural
//! failures (mkdir, symlink creation, unlink) are MUST class and unwind.

use crate::compare::map_for_read;
use crate::dirfd::{anchor, errno_to_io, open_at, DirFd};
use crate::error::Result;
use crate::gate::{Diag, FailClass, Side};
use crate::metadata::FileMeta;
use crate::xattrs;
use nix::errno::Errno;
use nix::fcntl::{readlinkat, AtFlags, OFlag};
use nix::sys::stat::{fchmodat, mkdirat, FchmodatFlags, Mode};
use nix::unistd::{fchownat, Gid, Uid};
use std::ffi::{CString, OsStr};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;

fn cstring(name: &OsStr) -> io::Result<CString> {
    CString::new(name.as_bytes()).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

/// Copy one regular file, returning the bytes written
///
/// The destination is created with the source's permission bits, the
/// source is mapped read-only, and the map is written out through a loop
/// that tolerates short writes. A zero-size source yields an empty
/// destination with the right mode and no map.
pub fn copy_file(
    src: &DirFd,
    dst: &DirFd,
    name: &OsStr,
    size: u64,
    mode: u32,
    diag: &Diag,
) -> Result<u64> {
    let leaf = name.to_string_lossy();
    let mut dst_file = match open_at(
        Some(dst),
        name,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        mode & 0o7777,
    ) {
        Ok(file) => file,
        Err(err) => {
            diag.fail(FailClass::Creat, Side::Dest, "creat", &leaf, err)?;
            return Ok(0);
        }
    };
    if size == 0 {
        return Ok(0);
    }
    let src_file = match open_at(Some(src), name, OFlag::O_RDONLY, 0) {
        Ok(file) => file,
        Err(err) => {
            diag.fail(FailClass::Copy, Side::Source, "open", &leaf, err)?;
            return Ok(0);
        }
    };
    let map = match map_for_read(&src_file, size) {
        Ok(map) => map,
        Err(err) => {
            diag.fail(FailClass::Mmap, Side::Source, "mmap", &leaf, err)?;
            return Ok(0);
        }
    };
    if let Err(err) = dst_file.write_all(&map) {
        diag.fail(FailClass::Copy, Side::Dest, "write", &leaf, err)?;
        return Ok(0);
    }
    Ok(size)
}

/// Recreate a symbolic link with an identical target
///
/// Returns whether the link was created. An unreadable source link is
/// skipped per the readlink class; a failed creation is structural.
pub fn recreate_symlink(src: &DirFd, dst: &DirFd, name: &OsStr, diag: &Diag) -> Result<bool> {
    let leaf = name.to_string_lossy();
    let target = match readlinkat(Some(src.as_raw_fd()), name) {
        Ok(target) => target,
        Err(err) => {
            diag.fail(
                FailClass::Readlink,
                Side::Source,
                "readlink",
                &leaf,
                errno_to_io(err),
            )?;
            return Ok(false);
        }
    };
    let (target_c, name_c) = match (cstring(target.as_os_str()), cstring(name)) {
        (Ok(target_c), Ok(name_c)) => (target_c, name_c),
        (Err(err), _) | (_, Err(err)) => {
            return diag.must_fail(Side::Dest, "symlink", &leaf, err)
        }
    };
    // SAFETY: both strings are NUL-terminated and live across the call.
    let res = unsafe { libc::symlinkat(target_c.as_ptr(), dst.as_raw_fd(), name_c.as_ptr()) };
    if res == -1 {
        return diag.must_fail(Side::Dest, "symlink", &leaf, io::Error::last_os_error());
    }
    Ok(true)
}

/// Recreate a device node, FIFO, or socket with the source's mode and rdev
pub fn recreate_node(dst: &DirFd, name: &OsStr, meta: &FileMeta, diag: &Diag) -> Result<bool> {
    let leaf = name.to_string_lossy();
    let cname = match cstring(name) {
        Ok(cname) => cname,
        Err(err) => {
            diag.fail(FailClass::Mknod, Side::Dest, "mknod", &leaf, err)?;
            return Ok(false);
        }
    };
    // SAFETY: cname is NUL-terminated and outlives the call; the fd is a
    // live directory descriptor.
    let res = unsafe {
        libc::mknodat(
            dst.as_raw_fd(),
            cname.as_ptr(),
            meta.mode as libc::mode_t,
            meta.rdev as libc::dev_t,
        )
    };
    if res == -1 {
        diag.fail(
            FailClass::Mknod,
            Side::Dest,
            "mknod",
            &leaf,
            io::Error::last_os_error(),
        )?;
        return Ok(false);
    }
    Ok(true)
}

/// Idempotent directory creation: an existing directory is not an error,
/// anything else is structural
pub fn ensure_dir(
    dst: Option<&DirFd>,
    name: &OsStr,
    mode: u32,
    side: Side,
    diag: &Diag,
) -> Result<()> {
    match mkdirat(
        anchor(dst),
        name,
        Mode::from_bits_truncate((mode & 0o7777) as libc::mode_t),
    ) {
        Ok(()) | Err(Errno::EEXIST) => Ok(()),
        Err(err) => diag.must_fail(side, "mkdir", &name.to_string_lossy(), errno_to_io(err)),
    }
}

/// Create a hard link `to/name` pointing at the file named `from/name`
///
/// Returns whether the link was created.
pub fn hard_link(from: &DirFd, to: &DirFd, name: &OsStr, side: Side, diag: &Diag) -> Result<bool> {
    let leaf = name.to_string_lossy();
    let cname = match cstring(name) {
        Ok(cname) => cname,
        Err(err) => {
            diag.fail(FailClass::Hardlink, side, "link", &leaf, err)?;
            return Ok(false);
        }
    };
    // SAFETY: both descriptors are live directory handles and cname is
    // NUL-terminated for the duration of the call.
    let res = unsafe {
        libc::linkat(
            from.as_raw_fd(),
            cname.as_ptr(),
            to.as_raw_fd(),
            cname.as_ptr(),
            0,
        )
    };
    if res == -1 {
        diag.fail(
            FailClass::Hardlink,
            side,
            "link",
            &leaf,
            io::Error::last_os_error(),
        )?;
        return Ok(false);
    }
    Ok(true)
}

/// Unlink an entry prior to replacing it with a hard link (static mode);
/// structural, since a lost unlink would orphan the replacement
pub fn remove_entry(dir: &DirFd, name: &OsStr, diag: &Diag) -> Result<()> {
    let leaf = name.to_string_lossy();
    let cname = match cstring(name) {
        Ok(cname) => cname,
        Err(err) => return diag.must_fail(Side::Source, "unlink", &leaf, err),
    };
    // SAFETY: cname is NUL-terminated and live; the fd is a live
    // directory descriptor.
    let res = unsafe { libc::unlinkat(dir.as_raw_fd(), cname.as_ptr(), 0) };
    if res == -1 {
        return diag.must_fail(Side::Source, "unlink", &leaf, io::Error::last_os_error());
    }
    Ok(())
}

/// Apply the source's permission bits; suppressed for symlink entries
pub fn transfer_mode(
    meta: &FileMeta,
    dir: Option<&DirFd>,
    name: &OsStr,
    side: Side,
    diag: &Diag,
) -> Result<()> {
    if meta.is_symlink() {
        return Ok(());
    }
    if let Err(err) = fchmodat(
        anchor(dir),
        name,
        Mode::from_bits_truncate(meta.permissions() as libc::mode_t),
        FchmodatFlags::FollowSymlink,
    ) {
        diag.fail(
            FailClass::Chmod,
            side,
            "chmod",
            &name.to_string_lossy(),
            errno_to_io(err),
        )?;
    }
    Ok(())
}

/// Apply the source's uid/gid without following symlinks
pub fn transfer_owner(
    meta: &FileMeta,
    dir: Option<&DirFd>,
    name: &OsStr,
    side: Side,
    diag: &Diag,
) -> Result<()> {
    if let Err(err) = fchownat(
        anchor(dir),
        name,
        Some(Uid::from_raw(meta.uid)),
        Some(Gid::from_raw(meta.gid)),
        AtFlags::AT_SYMLINK_NOFOLLOW,
    ) {
        diag.fail(
            FailClass::Chown,
            side,
            "chown",
            &name.to_string_lossy(),
            errno_to_io(err),
        )?;
    }
    Ok(())
}

/// Copy all extended attributes from one entry to another
///
/// Both entries are opened read-only through their parent handles; an
/// entry that cannot be opened is reported and the transfer skipped.
pub fn transfer_xattrs(
    src_dir: Option<&DirFd>,
    dst_dir: Option<&DirFd>,
    src_name: &OsStr,
    dst_name: &OsStr,
    diag: &Diag,
) -> Result<()> {
    let src_leaf = src_name.to_string_lossy();
    let dst_leaf = dst_name.to_string_lossy();
    let src_file = match open_at(src_dir, src_name, OFlag::O_RDONLY, 0) {
        Ok(file) => file,
        Err(err) => {
            diag.warn(Side::Source, "open", &src_leaf, &err);
            return Ok(());
        }
    };
    let dst_file = match open_at(dst_dir, dst_name, OFlag::O_RDONLY, 0) {
        Ok(file) => file,
        Err(err) => {
            diag.warn(Side::Dest, "open", &dst_leaf, &err);
            return Ok(());
        }
    };
    xattrs::transfer(&src_file, &dst_file, &src_leaf, &dst_leaf, diag)
}
