//! Tri-directory walk and dedup decision engine
//!
//! The walker descends source, optional destination, and optional
//! reference in lockstep. Per source entry it consults the equality
//! oracle: an *equal* regular file becomes a hard link into the reference
//! tree, anything else is materialized from the source (copy mode) or
//! left in place (static mode). Directories always recurse; each
//! recursion frame owns its child handles and drops them on return.

use crate::compare::{judge, Verdict};
use crate::dirfd::DirFd;
use crate::error::{LinkError, Result};
use crate::gate::{Diag, FailClass, FailMask, Side};
use crate::materialize;
use crate::metadata::{stat_at, FileMeta};
use crate::stats::RunStats;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a run is rooted
#[derive(Debug, Clone)]
pub enum OpMode {
    /// Three-way copy: materialize `destination` from `source`, linking
    /// into `reference` where the oracle allows
    Copy {
        /// Tree to replicate
        source: PathBuf,
        /// Tree to create; must not exist
        destination: PathBuf,
        /// Candidate link targets; missing tree means everything copies
        reference: PathBuf,
    },
    /// In-place dedup: rewrite `directory`, replacing files duplicated in
    /// `reference` with hard links
    Static {
        /// Tree rewritten in place
        directory: PathBuf,
        /// Candidate link targets
        reference: PathBuf,
    },
}

/// Core options record, produced by the CLI layer
#[derive(Debug, Clone)]
pub struct Options {
    /// Operating mode and root paths
    pub mode: OpMode,
    /// Skip all xattr listing, comparison, and transfer
    pub no_xattr: bool,
    /// Emit COPY/KEEP lines
    pub verbose: bool,
    /// Failure classes that abort the run
    pub fail_mask: FailMask,
}

/// Run a replication according to the options record
pub fn replicate(opts: &Options) -> Result<RunStats> {
    match &opts.mode {
        OpMode::Copy {
            source,
            destination,
            reference,
        } => run_copy(opts, source, destination, reference),
        OpMode::Static {
            directory,
            reference,
        } => run_static(opts, directory, reference),
    }
}

fn run_copy(
    opts: &Options,
    source: &Path,
    destination: &Path,
    reference: &Path,
) -> Result<RunStats> {
    if stat_at(None, destination.as_os_str()).is_ok() {
        return Err(LinkError::DestinationExists(destination.to_path_buf()));
    }
    let src_meta = stat_at(None, source.as_os_str())
        .map_err(|_| LinkError::SourceMissing(source.to_path_buf()))?;

    let diag = Diag::new(
        opts.fail_mask,
        source.display().to_string(),
        destination.display().to_string(),
        reference.display().to_string(),
    );

    // Destination root bootstrap: created with the source root's mode,
    // then owner, mode, and xattrs, before any children exist.
    materialize::ensure_dir(
        None,
        destination.as_os_str(),
        src_meta.permissions(),
        Side::Root,
        &diag,
    )?;
    materialize::transfer_owner(&src_meta, None, destination.as_os_str(), Side::Root, &diag)?;
    materialize::transfer_mode(&src_meta, None, destination.as_os_str(), Side::Root, &diag)?;
    if !opts.no_xattr {
        materialize::transfer_xattrs(
            None,
            None,
            source.as_os_str(),
            destination.as_os_str(),
            &diag,
        )?;
    }

    let src_root = open_root_must(source, &diag)?;
    let dst_root = open_root_must(destination, &diag)?;
    let ref_root = DirFd::open_root(reference).ok();

    let mut walker = Walker {
        opts,
        diag,
        stats: RunStats::default(),
    };
    walker.stats.directories_created += 1;
    walker.dive(&src_root, Some(&dst_root), ref_root.as_ref())?;
    Ok(walker.stats)
}

fn run_static(opts: &Options, directory: &Path, reference: &Path) -> Result<RunStats> {
    let diag = Diag::new(
        opts.fail_mask,
        directory.display().to_string(),
        String::new(),
        reference.display().to_string(),
    );
    let src_root = open_root_must(directory, &diag)?;
    let ref_root = DirFd::open_root(reference).ok();

    let mut walker = Walker {
        opts,
        diag,
        stats: RunStats::default(),
    };
    walker.dive(&src_root, None, ref_root.as_ref())?;
    Ok(walker.stats)
}

/// Open a root directory; failure here invalidates the whole run
fn open_root_must(path: &Path, diag: &Diag) -> Result<DirFd> {
    DirFd::open_root(path)
        .or_else(|err| diag.must_fail(Side::Root, "opendir", &path.to_string_lossy(), err))
}

struct Walker<'a> {
    opts: &'a Options,
    diag: Diag,
    stats: RunStats,
}

impl Walker<'_> {
    /// Process every entry of one directory level
    fn dive(&mut self, src: &DirFd, dst: Option<&DirFd>, reference: Option<&DirFd>) -> Result<()> {
        let mut stream = match src.stream() {
            Ok(stream) => stream,
            Err(err) => return Err(self.diag.readdir_failure(err)),
        };
        loop {
            let name = match stream.next_entry() {
                Ok(Some(name)) => name,
                Ok(None) => break,
                Err(err) => return Err(self.diag.readdir_failure(err)),
            };
            self.process_entry(src, dst, reference, &name)?;
        }
        Ok(())
    }

    fn process_entry(
        &mut self,
        src: &DirFd,
        dst: Option<&DirFd>,
        reference: Option<&DirFd>,
        name: &OsStr,
    ) -> Result<()> {
        // An entry whose stat fails is silently skipped.
        let src_meta = match stat_at(Some(src), name) {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };
        let ref_meta = reference.and_then(|r| stat_at(Some(r), name).ok());

        let verdict = judge(
            src,
            reference,
            name,
            &src_meta,
            ref_meta.as_ref(),
            self.opts.no_xattr,
            &self.diag,
        )?;
        debug!(
            entry = %format!("{}/{}", self.diag.trail, name.to_string_lossy()),
            src = %brief(Some(&src_meta)),
            reference = %brief(ref_meta.as_ref()),
            decision = %decision_token(verdict),
        );

        match (verdict, dst) {
            (Verdict::Different(_), Some(dst_dir)) => {
                self.materialize_entry(src, dst_dir, reference, name, &src_meta)
            }
            (Verdict::Different(_), None) => {
                self.keep_or_descend(src, reference, name, &src_meta)
            }
            (Verdict::Equal | Verdict::SameInode, Some(dst_dir)) => {
                if let Some(ref_dir) = reference {
                    if materialize::hard_link(ref_dir, dst_dir, name, Side::Dest, &self.diag)? {
                        self.stats.files_linked += 1;
                    }
                }
                Ok(())
            }
            (Verdict::Equal, None) => {
                if let Some(ref_dir) = reference {
                    materialize::remove_entry(src, name, &self.diag)?;
                    if materialize::hard_link(ref_dir, src, name, Side::Source, &self.diag)? {
                        self.stats.files_replaced += 1;
                    }
                }
                Ok(())
            }
            // Static mode, already one inode: nothing to do.
            (Verdict::SameInode, None) => Ok(()),
        }
    }

    /// Copy mode, entry differs: materialize from source, then transfer
    /// mode, ownership, and (for files and directories) xattrs
    fn materialize_entry(
        &mut self,
        src: &DirFd,
        dst: &DirFd,
        reference: Option<&DirFd>,
        name: &OsStr,
        meta: &FileMeta,
    ) -> Result<()> {
        if meta.is_regular() {
            if self.opts.verbose {
                eprintln!("COPY {}/{}", self.diag.trail, name.to_string_lossy());
            }
            let written = materialize::copy_file(src, dst, name, meta.size, meta.mode, &self.diag)?;
            self.stats.files_copied += 1;
            self.stats.bytes_copied += written;
        } else if meta.is_symlink() {
            if materialize::recreate_symlink(src, dst, name, &self.diag)? {
                self.stats.symlinks_recreated += 1;
            }
        } else if meta.is_dir() {
            materialize::ensure_dir(Some(dst), name, meta.permissions(), Side::Dest, &self.diag)?;
            self.stats.directories_created += 1;
            self.recurse_copy(src, dst, reference, name)?;
        } else if materialize::recreate_node(dst, name, meta, &self.diag)? {
            self.stats.nodes_recreated += 1;
        }

        materialize::transfer_mode(meta, Some(dst), name, Side::Dest, &self.diag)?;
        materialize::transfer_owner(meta, Some(dst), name, Side::Dest, &self.diag)?;
        if !self.opts.no_xattr && (meta.is_regular() || meta.is_dir()) {
            materialize::transfer_xattrs(Some(src), Some(dst), name, name, &self.diag)?;
        }
        Ok(())
    }

    /// Descend into a copy-mode subdirectory with fresh handles
    fn recurse_copy(
        &mut self,
        src: &DirFd,
        dst: &DirFd,
        reference: Option<&DirFd>,
        name: &OsStr,
    ) -> Result<()> {
        let leaf = name.to_string_lossy();
        let next_src = match src.open_child(name) {
            Ok(dir) => dir,
            Err(err) => {
                self.diag
                    .fail(FailClass::Opendir, Side::Source, "opendir", &leaf, err)?;
                return Ok(());
            }
        };
        let next_dst = match dst.open_child(name) {
            Ok(dir) => dir,
            Err(err) => {
                self.diag
                    .fail(FailClass::Opendir, Side::Dest, "opendir", &leaf, err)?;
                return Ok(());
            }
        };
        // A reference child that cannot be opened (absent, not a
        // directory) just means no reference below this point.
        let next_ref = reference.and_then(|r| r.open_child(name).ok());

        let frame = self.diag.trail.push(name);
        let result = self.dive(&next_src, Some(&next_dst), next_ref.as_ref());
        self.diag.trail.pop(frame);
        result
    }

    /// Static mode, entry differs: directories drive recursion, regular
    /// files are kept as-is, everything else is left alone
    fn keep_or_descend(
        &mut self,
        src: &DirFd,
        reference: Option<&DirFd>,
        name: &OsStr,
        meta: &FileMeta,
    ) -> Result<()> {
        if meta.is_dir() {
            let next_src = match src.open_child(name) {
                Ok(dir) => dir,
                Err(err) => {
                    self.diag.fail(
                        FailClass::Opendir,
                        Side::Source,
                        "opendir",
                        &name.to_string_lossy(),
                        err,
                    )?;
                    return Ok(());
                }
            };
            let next_ref = reference.and_then(|r| r.open_child(name).ok());
            let frame = self.diag.trail.push(name);
            let result = self.dive(&next_src, None, next_ref.as_ref());
            self.diag.trail.pop(frame);
            result
        } else {
            if meta.is_regular() {
                if self.opts.verbose {
                    println!("KEEP {}/{}", self.diag.trail, name.to_string_lossy());
                }
                self.stats.files_kept += 1;
            }
            Ok(())
        }
    }
}

fn brief(meta: Option<&FileMeta>) -> String {
    match meta {
        Some(m) => format!("uid={} gid={} mode={:o}", m.uid, m.gid, m.mode),
        None => "absent".to_string(),
    }
}

fn decision_token(verdict: Verdict) -> String {
    match verdict {
        Verdict::SameInode => "same-inode".to_string(),
        Verdict::Equal => "equal".to_string(),
        Verdict::Different(diff) => diff.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::fs;
    use std::os::unix::fs::MetadataExt;

    fn options(mode: OpMode) -> Options {
        Options {
            mode,
            no_xattr: true,
            verbose: false,
            fail_mask: FailMask::default(),
        }
    }

    #[test]
    fn copy_mode_links_identical_and_copies_divergent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::create_dir(tmp.path().join("ref")).unwrap();
        fs::write(tmp.path().join("src/same"), "hello").unwrap();
        fs::write(tmp.path().join("ref/same"), "hello").unwrap();
        fs::write(tmp.path().join("src/changed"), "new").unwrap();
        fs::write(tmp.path().join("ref/changed"), "old").unwrap();

        let stats = replicate(&options(OpMode::Copy {
            source: tmp.path().join("src"),
            destination: tmp.path().join("dst"),
            reference: tmp.path().join("ref"),
        }))
        .unwrap();

        assert_eq!(stats.files_linked, 1);
        assert_eq!(stats.files_copied, 1);
        let linked = fs::metadata(tmp.path().join("dst/same")).unwrap().ino();
        let reference = fs::metadata(tmp.path().join("ref/same")).unwrap().ino();
        assert_eq!(linked, reference);
        assert_eq!(
            fs::read(tmp.path().join("dst/changed")).unwrap(),
            b"new"
        );
    }

    #[test]
    fn copy_mode_refuses_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::create_dir(tmp.path().join("dst")).unwrap();
        let err = replicate(&options(OpMode::Copy {
            source: tmp.path().join("src"),
            destination: tmp.path().join("dst"),
            reference: tmp.path().join("ref"),
        }))
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn static_mode_replaces_duplicates_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("work")).unwrap();
        fs::create_dir(tmp.path().join("ref")).unwrap();
        fs::write(tmp.path().join("work/a"), "same").unwrap();
        fs::write(tmp.path().join("ref/a"), "same").unwrap();

        let stats = replicate(&options(OpMode::Static {
            directory: tmp.path().join("work"),
            reference: tmp.path().join("ref"),
        }))
        .unwrap();

        assert_eq!(stats.files_replaced, 1);
        let a = fs::metadata(tmp.path().join("work/a")).unwrap().ino();
        let b = fs::metadata(tmp.path().join("ref/a")).unwrap().ino();
        assert_eq!(a, b);
    }
}
