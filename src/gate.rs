//! Error gating: failure classes, failure mask, and the single failure sink
//!
//! Every failing syscall in the replicator flows through [`Diag::fail`],
//! which writes one `ERROR:` diagnostic and then consults the failure
//! mask: a masked class aborts the run, an unmasked one lets the caller
//! continue with a sentinel. The MUST class covers operations whose
//! failure invalidates structural invariants (root opendir, destination
//! mkdir, symlink creation, static-mode unlink, readdir stream errors)
//! and is fatal regardless of the mask.

use crate::error::{LinkError, Result};
use crate::trail::PathTrail;
use std::io;

/// Failure class of an operation, selecting a bit in the failure mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailClass {
    /// Mode transfer (fchmodat)
    Chmod,
    /// Ownership transfer (fchownat)
    Chown,
    /// Destination file creation
    Creat,
    /// Content-compare file open
    Diff,
    /// Hard-link creation
    Hardlink,
    /// Device / special node creation
    Mknod,
    /// Memory map establishment
    Mmap,
    /// Directory open
    Opendir,
    /// Symlink target read
    Readlink,
    /// Copy write loop
    Copy,
    /// Extended attribute list / get / set
    Xattr,
    /// Structural operations; always fatal, not selectable by the mask
    Must,
}

impl FailClass {
    /// Mask bit for this class (0 for MUST, which the mask cannot gate)
    #[must_use]
    pub const fn bit(self) -> u32 {
        match self {
            Self::Chmod => 1,
            Self::Chown => 2,
            Self::Creat => 4,
            Self::Diff => 8,
            Self::Hardlink => 16,
            Self::Mknod => 32,
            Self::Mmap => 64,
            Self::Opendir => 128,
            Self::Readlink => 256,
            Self::Copy => 512,
            Self::Xattr => 1024,
            Self::Must => 0,
        }
    }
}

/// Bitset selecting which failure classes terminate the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailMask(u32);

impl FailMask {
    /// Build a mask from raw bits (as given to `--fail`)
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits of the mask
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether a failure of the given class must abort the run
    #[must_use]
    pub fn is_fatal(self, class: FailClass) -> bool {
        matches!(class, FailClass::Must) || self.0 & class.bit() != 0
    }
}

/// Which tree a diagnostic prefix names
#[derive(Debug, Clone, Copy)]
pub enum Side {
    /// The source tree
    Source,
    /// The destination tree (copy mode)
    Dest,
    /// The reference tree
    Reference,
    /// Root-level operations before any tree prefix applies
    Root,
}

/// Diagnostic context threaded down the recursion: failure mask, path
/// trail, and the root prefixes used in `ERROR:` lines
#[derive(Debug)]
pub struct Diag {
    mask: FailMask,
    /// Current relative position of the walk, for diagnostics only
    pub trail: PathTrail,
    src_prefix: String,
    dst_prefix: String,
    ref_prefix: String,
}

impl Diag {
    /// Create a diagnostic context for the given roots
    #[must_use]
    pub fn new(mask: FailMask, src: String, dst: String, reference: String) -> Self {
        Self {
            mask,
            trail: PathTrail::new(),
            src_prefix: src,
            dst_prefix: dst,
            ref_prefix: reference,
        }
    }

    fn prefix(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.src_prefix,
            Side::Dest => &self.dst_prefix,
            Side::Reference => &self.ref_prefix,
            Side::Root => "",
        }
    }

    /// Report a failing operation and decide warn-vs-abort
    ///
    /// Writes the `ERROR: <prefix><trail>/<leaf>: <op>: <errstr>` line,
    /// then returns `Err` when the class is gated fatal so the caller can
    /// unwind with `?`. On `Ok(())` the caller proceeds with its sentinel.
    pub fn fail(
        &self,
        class: FailClass,
        side: Side,
        op: &'static str,
        leaf: &str,
        err: io::Error,
    ) -> Result<()> {
        let path = format!("{}{}/{}", self.prefix(side), self.trail, leaf);
        eprintln!("ERROR: {path}: {op}: {err}");
        if self.mask.is_fatal(class) {
            Err(LinkError::Fatal {
                op,
                path,
                source: err,
            })
        } else {
            Ok(())
        }
    }

    /// Report a structural (MUST) failure; always aborts
    ///
    /// Generic over the return type so call sites can use it directly in
    /// positions expecting a value that will never be produced.
    pub fn must_fail<T>(
        &self,
        side: Side,
        op: &'static str,
        leaf: &str,
        err: io::Error,
    ) -> Result<T> {
        let path = format!("{}{}/{}", self.prefix(side), self.trail, leaf);
        eprintln!("ERROR: {path}: {op}: {err}");
        Err(LinkError::Fatal {
            op,
            path,
            source: err,
        })
    }

    /// Report a failure that never aborts, whatever the mask says
    pub fn warn(&self, side: Side, op: &str, leaf: &str, err: &io::Error) {
        eprintln!("ERROR: {}{}/{leaf}: {op}: {err}", self.prefix(side), self.trail);
    }

    /// Report a directory stream error; always fatal
    #[must_use]
    pub fn readdir_failure(&self, err: io::Error) -> LinkError {
        let path = format!("{}{}", self.src_prefix, self.trail);
        eprintln!("ERROR: READDIR: {path}: {err}");
        LinkError::Readdir { path, source: err }
    }
}
