//! Error types for snaplink operations
//!
//! Failures that unwind to the binary edge are represented by [`LinkError`].
//! Per-operation failures that the failure mask gates as non-fatal never
//! become a `LinkError`; they are reported at the failure sink and the
//! caller proceeds with a sentinel (skipped entry, empty xattr set,
//! forced-copy verdict).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for snaplink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors that terminate a replication run
#[derive(Debug, Error)]
pub enum LinkError {
    /// An operation failed and its failure class is gated as fatal.
    ///
    /// The diagnostic line has already been written to stderr by the
    /// failure sink; this variant only carries the unwind.
    #[error("{op} failed for {path}: {source}")]
    Fatal {
        /// The failing operation (e.g. "open", "link", "chmod")
        op: &'static str,
        /// Diagnostic path of the failing entry
        path: String,
        /// Underlying system error
        #[source]
        source: io::Error,
    },

    /// The source directory stream returned an error mid-iteration
    #[error("directory stream failed at {path}: {source}")]
    Readdir {
        /// Diagnostic path of the directory being read
        path: String,
        /// Underlying system error
        #[source]
        source: io::Error,
    },

    /// Copy mode: the destination path already exists
    #[error("{} already exists", .0.display())]
    DestinationExists(PathBuf),

    /// Copy mode: the source path cannot be stat'd
    #[error("{} does not exist", .0.display())]
    SourceMissing(PathBuf),
}

impl LinkError {
    /// Process exit code for this error
    ///
    /// Precondition failures (destination present, source absent) exit 3;
    /// everything else exits 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DestinationExists(_) | Self::SourceMissing(_) => 3,
            Self::Fatal { .. } | Self::Readdir { .. } => 1,
        }
    }

    /// Whether a diagnostic for this error was already written at the
    /// failure site (the binary edge must not print it again)
    #[must_use]
    pub fn already_reported(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Readdir { .. })
    }
}
