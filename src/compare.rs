//! The equality oracle: may a source file be replaced by a hard link to
//! its reference counterpart?
//!
//! The verdict is a pure function of both sides' stat metadata, content
//! bytes, and attribute bytes at read time. The prefilter is ordered
//! cheapest-first and exits early; the full byte compare only runs for
//! regular files whose metadata already matches. Any attribute that can
//! be named but not read classifies the pair as different, so the safe
//! outcome (copy) is chosen.

use crate::dirfd::{open_at, DirFd};
use crate::error::Result;
use crate::gate::{Diag, FailClass, Side};
use crate::metadata::FileMeta;
use crate::xattrs;
use memmap2::MmapOptions;
use nix::fcntl::OFlag;
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;

/// Diagnostic bitset produced by the content-and-xattr compare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffReport(u8);

impl DiffReport {
    /// Content bytes differ
    pub const CONTENT: u8 = 1;
    /// Attribute name sets differ
    pub const XATTR_NAMES: u8 = 2;
    /// An attribute value differs
    pub const XATTR_VALUES: u8 = 4;
    /// An I/O or map failure occurred on this path
    pub const IO_ERROR: u8 = 8;

    fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }

    /// Raw bits
    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// No difference and no failure observed
    #[must_use]
    pub fn is_clean(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("clean");
        }
        let mut sep = "";
        for (bit, label) in [
            (Self::CONTENT, "content"),
            (Self::XATTR_NAMES, "xattr-names"),
            (Self::XATTR_VALUES, "xattr-values"),
            (Self::IO_ERROR, "io-error"),
        ] {
            if self.0 & bit != 0 {
                write!(f, "{sep}{label}")?;
                sep = ",";
            }
        }
        Ok(())
    }
}

/// Why the prefilter (or the byte compare) classified a pair as different
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difference {
    /// Source entry is not a regular file
    Kind,
    /// No reference counterpart exists
    Missing,
    /// Owner user ids differ
    Uid,
    /// Owner group ids differ
    Gid,
    /// Modes differ (type or permission bits)
    Mode,
    /// Sizes differ
    Size,
    /// Content or attribute bytes differ (or could not be read)
    Content(DiffReport),
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind => f.write_str("non-regular"),
            Self::Missing => f.write_str("no-reference"),
            Self::Uid => f.write_str("uid"),
            Self::Gid => f.write_str("gid"),
            Self::Mode => f.write_str("mode"),
            Self::Size => f.write_str("size"),
            Self::Content(report) => write!(f, "{report}"),
        }
    }
}

/// Outcome of the equality oracle for one shared name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both entries already reference one underlying file
    SameInode,
    /// Distinct inodes, every observable attribute matches
    Equal,
    /// Some observable attribute differs
    Different(Difference),
}

/// Decide LINK vs COPY for one source entry
pub fn judge(
    src_dir: &DirFd,
    reference: Option<&DirFd>,
    name: &OsStr,
    src_meta: &FileMeta,
    ref_meta: Option<&FileMeta>,
    no_xattr: bool,
    diag: &Diag,
) -> Result<Verdict> {
    if !src_meta.is_regular() {
        return Ok(Verdict::Different(Difference::Kind));
    }
    let (ref_dir, ref_meta) = match (reference, ref_meta) {
        (Some(dir), Some(meta)) => (dir, meta),
        _ => return Ok(Verdict::Different(Difference::Missing)),
    };
    if src_meta.uid != ref_meta.uid {
        return Ok(Verdict::Different(Difference::Uid));
    }
    if src_meta.gid != ref_meta.gid {
        return Ok(Verdict::Different(Difference::Gid));
    }
    if src_meta.mode != ref_meta.mode {
        return Ok(Verdict::Different(Difference::Mode));
    }
    if src_meta.size != ref_meta.size {
        return Ok(Verdict::Different(Difference::Size));
    }
    if src_meta.same_inode(ref_meta) {
        return Ok(Verdict::SameInode);
    }
    let report = diff_content(src_dir, ref_dir, name, src_meta.size, no_xattr, diag)?;
    if report.is_clean() {
        Ok(Verdict::Equal)
    } else {
        Ok(Verdict::Different(Difference::Content(report)))
    }
}

/// Byte-compare two same-named regular files of equal declared size,
/// then their attribute sets
///
/// Zero-size files skip the maps and are content-equal. An open failure
/// aborts the compare with the I/O bit; a map failure records the I/O bit
/// but still lets the attribute compare run.
fn diff_content(
    src_dir: &DirFd,
    ref_dir: &DirFd,
    name: &OsStr,
    size: u64,
    no_xattr: bool,
    diag: &Diag,
) -> Result<DiffReport> {
    let mut report = DiffReport::default();
    let leaf = name.to_string_lossy();

    let src_file = match open_at(Some(src_dir), name, OFlag::O_RDONLY, 0) {
        Ok(file) => file,
        Err(err) => {
            diag.fail(FailClass::Diff, Side::Source, "open", &leaf, err)?;
            report.set(DiffReport::IO_ERROR);
            return Ok(report);
        }
    };
    let ref_file = match open_at(Some(ref_dir), name, OFlag::O_RDONLY, 0) {
        Ok(file) => file,
        Err(err) => {
            diag.fail(FailClass::Diff, Side::Reference, "open", &leaf, err)?;
            report.set(DiffReport::IO_ERROR);
            return Ok(report);
        }
    };

    if size > 0 {
        match map_for_read(&src_file, size) {
            Err(err) => {
                diag.fail(FailClass::Mmap, Side::Source, "mmap", &leaf, err)?;
                report.set(DiffReport::IO_ERROR);
            }
            Ok(src_map) => match map_for_read(&ref_file, size) {
                Err(err) => {
                    diag.fail(FailClass::Mmap, Side::Reference, "mmap", &leaf, err)?;
                    report.set(DiffReport::IO_ERROR);
                }
                Ok(ref_map) => {
                    if src_map[..] != ref_map[..] {
                        report.set(DiffReport::CONTENT);
                    }
                }
            },
        }
    }

    if !no_xattr {
        let src_names = listed_or_empty(&src_file, Side::Source, &leaf, diag)?;
        let ref_names = listed_or_empty(&ref_file, Side::Reference, &leaf, diag)?;
        if src_names != ref_names {
            report.set(DiffReport::XATTR_NAMES);
        } else if !xattrs::values_equal(&src_file, &ref_file, &src_names, diag)? {
            report.set(DiffReport::XATTR_VALUES);
        }
    }

    Ok(report)
}

/// Read-only map of the first `size` bytes of an open file
pub(crate) fn map_for_read(file: &File, size: u64) -> std::io::Result<memmap2::Mmap> {
    // SAFETY: the map is read-only and compared/written before the file
    // is closed; concurrent truncation of the underlying file is outside
    // the tool's contract, as for any reader.
    unsafe { MmapOptions::new().len(size as usize).map(file) }
}

fn listed_or_empty(
    file: &File,
    side: Side,
    leaf: &str,
    diag: &Diag,
) -> Result<Vec<std::ffi::OsString>> {
    match xattrs::list_sorted(file) {
        Ok(names) => Ok(names),
        Err(err) => {
            diag.fail(FailClass::Xattr, side, "listxattr", leaf, err)?;
            Ok(Vec::new())
        }
    }
}
