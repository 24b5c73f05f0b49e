//! Extended attribute staging: list, compare, transfer
//!
//! All operations work on already-open files so the attribute reads and
//! the content compare observe the same object. Name sets are compared in
//! sorted order; the kernel's listing order is not part of the contract.
//! Listing and fetch failures degrade per the failure mask: a side that
//! cannot be listed counts as having no attributes, a value that cannot
//! be fetched is skipped.

use crate::error::Result;
use crate::gate::{Diag, FailClass, Side};
use std::ffi::OsString;
use std::fs::File;
use std::io;
use xattr::FileExt;

/// List attribute names of an open file, sorted lexicographically
pub fn list_sorted(file: &File) -> io::Result<Vec<OsString>> {
    let mut names: Vec<OsString> = file.list_xattr()?.collect();
    names.sort();
    Ok(names)
}

/// Compare attribute values of two files over one name set
///
/// Returns `Ok(false)` as soon as a value's length or bytes differ. A
/// value that cannot be fetched from either side is reported through the
/// sink and skipped, as is an attribute that vanished since listing.
pub fn values_equal(
    src: &File,
    reference: &File,
    names: &[OsString],
    diag: &Diag,
) -> Result<bool> {
    for name in names {
        let leaf = name.to_string_lossy();
        let src_value = match fetch(src, name) {
            Ok(v) => v,
            Err(err) => {
                diag.fail(FailClass::Xattr, Side::Source, "getxattr", &leaf, err)?;
                continue;
            }
        };
        let ref_value = match fetch(reference, name) {
            Ok(v) => v,
            Err(err) => {
                diag.fail(FailClass::Xattr, Side::Reference, "getxattr", &leaf, err)?;
                continue;
            }
        };
        if src_value != ref_value {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Copy every attribute of `src` onto `dst`
///
/// Per-name failures are reported and do not abort the transfer (unless
/// the xattr class is gated fatal).
pub fn transfer(
    src: &File,
    dst: &File,
    src_leaf: &str,
    dst_leaf: &str,
    diag: &Diag,
) -> Result<()> {
    let names = match list_sorted(src) {
        Ok(names) => names,
        Err(err) => {
            diag.fail(FailClass::Xattr, Side::Source, "listxattr", src_leaf, err)?;
            return Ok(());
        }
    };
    for name in names {
        let value = match fetch(src, &name) {
            Ok(v) => v,
            Err(err) => {
                diag.fail(FailClass::Xattr, Side::Source, "fgetxattr", src_leaf, err)?;
                continue;
            }
        };
        if let Err(err) = dst.set_xattr(&name, &value) {
            diag.fail(FailClass::Xattr, Side::Dest, "fsetxattr", dst_leaf, err)?;
        }
    }
    Ok(())
}

/// Fetch one attribute value; an attribute missing since listing is
/// surfaced as `ENODATA` so callers treat it like any other fetch failure
fn fetch(file: &File, name: &std::ffi::OsStr) -> io::Result<Vec<u8>> {
    file.get_xattr(name)?
        .ok_or_else(|| io::Error::from_raw_os_error(libc::ENODATA))
}
