//! Statistics for one replication run
//!
//! The walk is single-threaded, so plain counters suffice; they are
//! threaded through the walker and summarized once at the end.

use tracing::info;

/// Counters accumulated over one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Regular files materialized as full copies
    pub files_copied: u64,
    /// Regular files materialized as hard links into the reference tree
    pub files_linked: u64,
    /// Static mode: files left as-is because they differ from reference
    pub files_kept: u64,
    /// Static mode: files unlinked and replaced with a hard link
    pub files_replaced: u64,
    /// Directories created at the destination
    pub directories_created: u64,
    /// Symbolic links recreated
    pub symlinks_recreated: u64,
    /// Device nodes / FIFOs / sockets recreated
    pub nodes_recreated: u64,
    /// Bytes written by full copies
    pub bytes_copied: u64,
}

impl RunStats {
    /// Emit the run summary at INFO level
    pub fn log_summary(&self) {
        info!(
            files_copied = self.files_copied,
            files_linked = self.files_linked,
            files_kept = self.files_kept,
            files_replaced = self.files_replaced,
            directories_created = self.directories_created,
            symlinks_recreated = self.symlinks_recreated,
            nodes_recreated = self.nodes_recreated,
            bytes_copied = self.bytes_copied,
            "replication complete"
        );
    }
}
