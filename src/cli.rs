//! Command-line interface definitions
//!
//! The CLI layer owns argument parsing and validation only; everything
//! downstream consumes the [`Options`] record produced by
//! [`Args::to_options`].

use crate::gate::FailMask;
use crate::walker::{OpMode, Options};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Deduplicating file-tree replicator
///
/// Copies SOURCE to DESTINATION, hard-linking every regular file that is
/// byte-for-byte and metadata-identical to its counterpart in REFERENCE
/// instead of storing an independent copy. With `--static`, SOURCE is
/// rewritten in place: duplicated files become hard links into REFERENCE.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Source, destination, and reference paths
    #[command(flatten)]
    pub paths: PathConfig,

    /// Replication behavior
    #[command(flatten)]
    pub behavior: BehaviorConfig,

    /// Output and logging configuration
    #[command(flatten)]
    pub output: OutputConfig,
}

/// Positional paths
///
/// Copy mode takes three paths; static mode takes two (the directory to
/// rewrite and the reference tree).
#[derive(clap::Args, Debug, Clone)]
pub struct PathConfig {
    /// Source tree (or, with --static, the directory rewritten in place)
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination tree (or, with --static, the reference tree)
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Reference tree holding candidate hard-link targets (copy mode)
    #[arg(value_name = "REFERENCE")]
    pub reference: Option<PathBuf>,
}

/// Replication behavior flags
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Replication Options")]
pub struct BehaviorConfig {
    /// Rewrite SOURCE in place, replacing files duplicated in the
    /// reference tree with hard links
    #[arg(long = "static")]
    pub static_mode: bool,

    /// Disable all extended-attribute listing, comparison, and transfer
    #[arg(long)]
    pub noxattr: bool,

    /// Failure classes that abort the run, as a bitmask (decimal or
    /// 0x-prefixed hex): 1 chmod, 2 chown, 4 creat, 8 diff, 16 hardlink,
    /// 32 mknod, 64 mmap, 128 opendir, 256 readlink, 512 copy, 1024 xattr
    #[arg(long, value_name = "MASK", default_value = "0", value_parser = parse_fail_mask)]
    pub fail: FailMask,
}

/// Output and logging configuration
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Output Options")]
pub struct OutputConfig {
    /// Emit COPY/KEEP lines for regular-file decisions
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit a per-entry decision trace to stderr
    #[arg(long)]
    pub debug: bool,
}

/// Parse a failure mask given in decimal or 0x-prefixed hex
fn parse_fail_mask(s: &str) -> std::result::Result<FailMask, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };
    parsed
        .map(FailMask::from_bits)
        .map_err(|_| format!("invalid failure mask: {s}"))
}

impl Args {
    /// Validate the argument combination
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - copy mode is missing its REFERENCE path
    /// - static mode is given a third path
    pub fn validate(&self) -> Result<()> {
        if self.behavior.static_mode {
            if self.paths.reference.is_some() {
                anyhow::bail!("static mode takes exactly two paths: <DIRECTORY> <REFERENCE>");
            }
        } else if self.paths.reference.is_none() {
            anyhow::bail!("copy mode takes three paths: <SOURCE> <DESTINATION> <REFERENCE>");
        }
        Ok(())
    }

    /// Convert to the core options record
    #[must_use]
    pub fn to_options(&self) -> Options {
        let mode = if self.behavior.static_mode {
            OpMode::Static {
                directory: self.paths.source.clone(),
                reference: self.paths.destination.clone(),
            }
        } else {
            OpMode::Copy {
                source: self.paths.source.clone(),
                destination: self.paths.destination.clone(),
                // validate() guarantees presence; an empty fallback path
                // degrades to "no reference tree"
                reference: self.paths.reference.clone().unwrap_or_default(),
            }
        };
        Options {
            mode,
            no_xattr: self.behavior.noxattr,
            verbose: self.output.verbose,
            fail_mask: self.behavior.fail,
        }
    }
}
